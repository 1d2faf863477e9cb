//! Retry Scheduler — periodic sweep over the pending queue
//!
//! Each sweep selects a bounded batch of eligible rows (oldest attempt
//! first, outside the cool-down window), re-runs the executor for each,
//! and escalates orders that exhausted their retry budget to the
//! dead-letter store. One bad order never blocks the batch: per-item
//! failures are recorded and the sweep moves on. Only a store-level
//! failure aborts the sweep; the next scheduled run picks up where it
//! left off.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use super::executor::{SyncExecutor, SyncFailure};
use super::SweepSummary;
use crate::core::Config;
use crate::db::models::PendingSyncRow;
use crate::db::repository::{RepoResult, dead_letter, pending};

/// Retry pipeline tunables
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Failed attempts recorded before an order is dead-lettered
    pub max_retries: u32,
    /// Pending rows selected per sweep
    pub batch_size: u32,
    /// Exhausted rows selected per escalation pass
    pub dead_letter_batch_size: u32,
    /// Minimum age of the last attempt before re-selection (ms)
    pub cooldown_ms: i64,
}

impl RetrySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            batch_size: config.retry_batch_size,
            dead_letter_batch_size: config.dead_letter_batch_size,
            cooldown_ms: config.retry_cooldown_ms(),
        }
    }
}

/// One retry sweep over the pending queue
pub struct RetrySweep {
    pool: SqlitePool,
    executor: Arc<SyncExecutor>,
    settings: RetrySettings,
}

impl RetrySweep {
    pub fn new(pool: SqlitePool, executor: Arc<SyncExecutor>, settings: RetrySettings) -> Self {
        Self {
            pool,
            executor,
            settings,
        }
    }

    /// Run one sweep: retry eligible rows, then escalate exhausted ones.
    pub async fn run_sweep(&self) -> RepoResult<SweepSummary> {
        let mut summary = SweepSummary::default();

        let rows = pending::select_eligible_for_retry(
            &self.pool,
            self.settings.max_retries,
            self.settings.cooldown_ms,
            self.settings.batch_size,
        )
        .await?;

        if !rows.is_empty() {
            tracing::info!(count = rows.len(), "Retrying pending orders");
        }

        // Rows handled in this sweep; the escalation pass below must not
        // double-handle an order whose final failure was just recorded.
        let mut processed: HashSet<i64> = HashSet::new();

        for row in rows {
            summary.selected += 1;
            processed.insert(row.id);
            self.retry_row(row, &mut summary).await?;
        }

        // Escalate rows that were already out of budget before this sweep
        let exhausted = pending::select_exhausted(
            &self.pool,
            self.settings.max_retries,
            self.settings.dead_letter_batch_size,
        )
        .await?;

        for row in exhausted {
            if processed.contains(&row.id) {
                continue;
            }
            self.escalate_row(&row, &row.error_message, &mut summary).await;
        }

        Ok(summary)
    }

    /// Retry a single pending row. Store errors propagate; executor
    /// failures are recorded on the row.
    async fn retry_row(&self, row: PendingSyncRow, summary: &mut SweepSummary) -> RepoResult<()> {
        let order_id = row.order_id;

        // A payload that no longer parses cannot heal by waiting
        let payload: serde_json::Value = match serde_json::from_str(&row.payload) {
            Ok(v) => v,
            Err(e) => {
                let failure = SyncFailure::Payload(e.to_string());
                tracing::error!(order_id, error = %failure, "Stored payload unreadable, escalating");
                self.escalate_row(&row, &failure.to_string(), summary).await;
                return Ok(());
            }
        };

        tracing::info!(order_id, attempt = row.retry_count + 1, "Retrying order sync");

        // Orders already created downstream only re-attempt the link-back
        let result = match row.destination_ref() {
            Some(destination) => self.executor.relink_order(order_id, destination).await,
            None => self.executor.sync_order(order_id, &payload).await,
        };

        match result {
            Ok(_) => {
                pending::remove(&self.pool, order_id).await?;
                summary.succeeded += 1;
                tracing::info!(order_id, "Order retried successfully, removed from pending queue");
            }
            Err(failure) => {
                tracing::warn!(order_id, kind = failure.kind(), error = %failure, "Retry attempt failed");
                pending::record_failure(
                    &self.pool,
                    order_id,
                    &row.payload,
                    &failure.to_string(),
                    failure.link_target(),
                )
                .await?;
                summary.failed += 1;
            }
        }
        Ok(())
    }

    /// Move a row to the dead-letter store. On failure the row stays
    /// pending and the next sweep reconsiders it.
    async fn escalate_row(&self, row: &PendingSyncRow, final_error: &str, summary: &mut SweepSummary) {
        tracing::warn!(
            order_id = row.order_id,
            pending_id = row.id,
            retry_count = row.retry_count,
            "Retry budget exhausted, moving order to dead-letter store"
        );
        match dead_letter::escalate(&self.pool, row, final_error).await {
            Ok(()) => {
                summary.escalated += 1;
                tracing::info!(order_id = row.order_id, "Order moved to dead-letter store");
            }
            Err(e) => {
                tracing::error!(
                    order_id = row.order_id,
                    pending_id = row.id,
                    error = %e,
                    "Failed to escalate order; it remains pending for the next sweep"
                );
            }
        }
    }
}

/// Background worker driving [`RetrySweep`] on a fixed interval
pub struct RetryWorker {
    sweep: Arc<RetrySweep>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl RetryWorker {
    pub fn new(sweep: Arc<RetrySweep>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            sweep,
            interval,
            shutdown,
        }
    }

    /// Run the worker until shutdown.
    ///
    /// Sweeps immediately on startup to drain anything left over from a
    /// previous run, then on every interval tick.
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "RetryWorker started");

        self.sweep_and_log().await;

        let mut interval = tokio::time::interval(self.interval);
        interval.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("RetryWorker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.sweep_and_log().await;
                }
            }
        }

        tracing::info!("RetryWorker stopped");
    }

    async fn sweep_and_log(&self) {
        match self.sweep.run_sweep().await {
            Ok(summary) if summary.is_empty() => {
                tracing::debug!("Retry sweep found no pending orders");
            }
            Ok(summary) => {
                tracing::info!(
                    selected = summary.selected,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    escalated = summary.escalated,
                    "Retry sweep finished"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Retry sweep aborted");
            }
        }
    }
}
