//! Server state - shared handles for all components

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clients::{DestinationApi, DestinationClient, SourceApi, SourceClient};
use crate::core::config::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::db::DbService;
use crate::sync::{
    RetrySettings, RetrySweep, RetryWorker, StatusSettings, StatusSync, StatusSyncWorker,
    SyncExecutor,
};
use crate::utils::AppError;

/// Shared server state
///
/// Holds the database service, the external API handles and the sweep
/// services. `Clone` is shallow: everything inside is reference-counted.
///
/// Either API handle may be `None` when its credentials are not
/// configured; the engine then records configuration failures per order
/// instead of refusing to start, so nothing is lost while an operator
/// fixes the environment.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub db: DbService,
    pub source: Option<Arc<dyn SourceApi>>,
    pub destination: Option<Arc<dyn DestinationApi>>,
    pub executor: Arc<SyncExecutor>,
    pub retry_sweep: Arc<RetrySweep>,
    pub status_sync: Arc<StatusSync>,
    started_at: Instant,
}

impl ServerState {
    /// Initialize all services from configuration.
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        let db = DbService::new(&config.database_path).await?;

        let timeout = Duration::from_secs(config.http_timeout_secs);
        let source = build_source_client(config, timeout)?;
        let destination = build_destination_client(config, timeout)?;

        let executor = Arc::new(SyncExecutor::new(source.clone(), destination.clone()));
        let retry_sweep = Arc::new(RetrySweep::new(
            db.pool.clone(),
            executor.clone(),
            RetrySettings::from_config(config),
        ));
        let status_sync = Arc::new(StatusSync::new(
            db.pool.clone(),
            source.clone(),
            destination.clone(),
            StatusSettings::from_config(config),
        ));

        Ok(Self {
            config: Arc::new(config.clone()),
            db,
            source,
            destination,
            executor,
            retry_sweep,
            status_sync,
            started_at: Instant::now(),
        })
    }

    /// Register the periodic sweep workers.
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let retry_worker = RetryWorker::new(
            self.retry_sweep.clone(),
            Duration::from_secs(self.config.retry_interval_secs),
            tasks.shutdown_token(),
        );
        tasks.spawn("retry_worker", TaskKind::Periodic, async move {
            retry_worker.run().await;
        });

        let status_worker = StatusSyncWorker::new(
            self.status_sync.clone(),
            Duration::from_secs(self.config.status_from_dest_interval_secs),
            Duration::from_secs(self.config.status_to_dest_interval_secs),
            tasks.shutdown_token(),
        );
        tasks.spawn("status_sync_worker", TaskKind::Periodic, async move {
            status_worker.run().await;
        });
    }

    /// Seconds since the server started.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

fn build_source_client(
    config: &Config,
    timeout: Duration,
) -> Result<Option<Arc<dyn SourceApi>>, AppError> {
    match (
        &config.source_api_url,
        &config.source_consumer_key,
        &config.source_consumer_secret,
    ) {
        (Some(url), Some(key), Some(secret)) => {
            let client =
                SourceClient::new(url.clone(), key.clone(), secret.clone(), timeout)?;
            Ok(Some(Arc::new(client)))
        }
        _ => {
            tracing::warn!(
                "Source API credentials not configured; forward syncs will be recorded as configuration failures"
            );
            Ok(None)
        }
    }
}

fn build_destination_client(
    config: &Config,
    timeout: Duration,
) -> Result<Option<Arc<dyn DestinationApi>>, AppError> {
    match (&config.destination_api_url, &config.destination_token) {
        (Some(url), Some(token)) => {
            let client = DestinationClient::new(url.clone(), token.clone(), timeout)?;
            Ok(Some(Arc::new(client)))
        }
        _ => {
            tracing::warn!(
                "Destination API credentials not configured; forward syncs will be recorded as configuration failures"
            );
            Ok(None)
        }
    }
}
