//! Status Reconciler — bidirectional status propagation
//!
//! Two independent sweeps on independent schedules keep order statuses
//! aligned across the systems, translating names through the operator
//! mapping table:
//!
//! - destination → source: recently-updated destination orders drive
//!   source status updates (linked via the external reference)
//! - source → destination: recently-updated source orders drive
//!   destination state updates (linked via metadata, state resolved
//!   through the destination status catalog)
//!
//! Each sweep applies at most one status write per order and reloads the
//! mapping table, so operator edits take effect at the next sweep.
//! Neither sweep reads the counterpart's current status first; redundant
//! identical writes are possible and harmless since status-set is
//! idempotent on both APIs.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use super::SweepSummary;
use super::status_map::StatusMap;
use crate::clients::{DestinationApi, SourceApi};
use crate::core::Config;
use crate::db::repository::RepoResult;

/// Status reconciliation tunables
#[derive(Debug, Clone)]
pub struct StatusSettings {
    /// Orders fetched per sweep
    pub page_size: u32,
    /// Recently-changed window (ms)
    pub lookback_ms: i64,
}

impl StatusSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.status_page_size,
            lookback_ms: config.status_lookback_ms(),
        }
    }
}

/// The two status propagation sweeps
pub struct StatusSync {
    pool: SqlitePool,
    source: Option<Arc<dyn SourceApi>>,
    destination: Option<Arc<dyn DestinationApi>>,
    settings: StatusSettings,
}

impl StatusSync {
    pub fn new(
        pool: SqlitePool,
        source: Option<Arc<dyn SourceApi>>,
        destination: Option<Arc<dyn DestinationApi>>,
        settings: StatusSettings,
    ) -> Self {
        Self {
            pool,
            source,
            destination,
            settings,
        }
    }

    /// Propagate destination status changes to the source system.
    pub async fn sync_from_destination(&self) -> RepoResult<SweepSummary> {
        let mut summary = SweepSummary::default();

        let (Some(source), Some(destination)) = (&self.source, &self.destination) else {
            tracing::warn!("API credentials not configured, skipping status sweep");
            return Ok(summary);
        };

        let map = StatusMap::load(&self.pool).await?;
        if map.is_empty() {
            tracing::warn!("Status mapping table is empty, skipping destination→source sweep");
            return Ok(summary);
        }

        let since = shared::util::now_millis() - self.settings.lookback_ms;
        let orders = match destination
            .list_recently_changed(since, self.settings.page_size)
            .await
        {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list recently changed destination orders");
                return Ok(summary);
            }
        };

        for order in orders {
            summary.selected += 1;

            let Some(source_id) = order.source_order_id() else {
                tracing::debug!(destination_id = %order.id, "Destination order has no source linkage, skipping");
                summary.skipped += 1;
                continue;
            };
            let Some(status_name) = order.status_name() else {
                summary.skipped += 1;
                continue;
            };
            let Some(mapped) = map.source_status_for(status_name) else {
                tracing::debug!(
                    destination_id = %order.id,
                    status = status_name,
                    "Destination status has no mapping entry, skipping"
                );
                summary.skipped += 1;
                continue;
            };

            tracing::info!(
                order_id = source_id,
                destination_id = %order.id,
                from = status_name,
                to = mapped,
                "Propagating destination status to source order"
            );
            match source.update_order_status(source_id, mapped).await {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    tracing::error!(
                        order_id = source_id,
                        destination_id = %order.id,
                        error = %e,
                        "Failed to update source order status"
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            selected = summary.selected,
            updated = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Destination→source status sweep finished"
        );
        Ok(summary)
    }

    /// Propagate source status changes to the destination system.
    pub async fn sync_to_destination(&self) -> RepoResult<SweepSummary> {
        let mut summary = SweepSummary::default();

        let (Some(source), Some(destination)) = (&self.source, &self.destination) else {
            tracing::warn!("API credentials not configured, skipping status sweep");
            return Ok(summary);
        };

        let map = StatusMap::load(&self.pool).await?;
        if map.is_empty() {
            tracing::warn!("Status mapping table is empty, skipping source→destination sweep");
            return Ok(summary);
        }

        let since = shared::util::now_millis() - self.settings.lookback_ms;
        let orders = match source
            .list_recently_changed(since, self.settings.page_size)
            .await
        {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list recently changed source orders");
                return Ok(summary);
            }
        };

        // Destination states are written by catalog href; one catalog
        // fetch serves the whole sweep
        let mut catalog: Option<Vec<shared::order::StatusCatalogEntry>> = None;

        for order in orders {
            summary.selected += 1;

            let Some(destination_id) = order.destination_id().map(String::from) else {
                tracing::debug!(order_id = order.id, "Source order not linked yet, skipping");
                summary.skipped += 1;
                continue;
            };
            let Some(status) = order.status.as_deref() else {
                summary.skipped += 1;
                continue;
            };
            let Some(mapped) = map.destination_status_for(status) else {
                tracing::debug!(
                    order_id = order.id,
                    status = status,
                    "Source status has no mapping entry, skipping"
                );
                summary.skipped += 1;
                continue;
            };

            if catalog.is_none() {
                match destination.get_status_catalog().await {
                    Ok(states) => catalog = Some(states),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to fetch destination status catalog");
                        return Ok(summary);
                    }
                }
            }
            let href = catalog
                .as_ref()
                .and_then(|states| states.iter().find(|s| s.name == mapped))
                .and_then(|s| s.meta.href.as_deref());
            let Some(href) = href else {
                tracing::error!(
                    order_id = order.id,
                    status = mapped,
                    "Mapped status not present in destination catalog"
                );
                summary.failed += 1;
                continue;
            };

            tracing::info!(
                order_id = order.id,
                destination_id = %destination_id,
                from = status,
                to = mapped,
                "Propagating source status to destination order"
            );
            match destination.update_order_status(&destination_id, href).await {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    tracing::error!(
                        order_id = order.id,
                        destination_id = %destination_id,
                        error = %e,
                        "Failed to update destination order status"
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            selected = summary.selected,
            updated = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Source→destination status sweep finished"
        );
        Ok(summary)
    }
}

/// Background worker driving both status sweeps on their own schedules
pub struct StatusSyncWorker {
    sync: Arc<StatusSync>,
    from_destination_interval: Duration,
    to_destination_interval: Duration,
    shutdown: CancellationToken,
}

impl StatusSyncWorker {
    pub fn new(
        sync: Arc<StatusSync>,
        from_destination_interval: Duration,
        to_destination_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sync,
            from_destination_interval,
            to_destination_interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(
            from_destination_secs = self.from_destination_interval.as_secs(),
            to_destination_secs = self.to_destination_interval.as_secs(),
            "StatusSyncWorker started"
        );

        let mut from_interval = tokio::time::interval(self.from_destination_interval);
        let mut to_interval = tokio::time::interval(self.to_destination_interval);
        // Skip the immediate ticks; first sweeps run one period in
        from_interval.tick().await;
        to_interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("StatusSyncWorker shutting down");
                    break;
                }
                _ = from_interval.tick() => {
                    if let Err(e) = self.sync.sync_from_destination().await {
                        tracing::error!(error = %e, "Destination→source status sweep aborted");
                    }
                }
                _ = to_interval.tick() => {
                    if let Err(e) = self.sync.sync_to_destination().await {
                        tracing::error!(error = %e, "Source→destination status sweep aborted");
                    }
                }
            }
        }

        tracing::info!("StatusSyncWorker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::status_mapping;
    use crate::sync::testing::{MockDestinationApi, MockSourceApi, destination_order, source_order};

    struct Harness {
        pool: SqlitePool,
        source: Arc<MockSourceApi>,
        destination: Arc<MockDestinationApi>,
        sync: StatusSync,
    }

    async fn harness() -> Harness {
        let pool = DbService::new_in_memory().await.unwrap().pool;
        let source = Arc::new(MockSourceApi::default());
        let destination = Arc::new(MockDestinationApi::default());
        let sync = StatusSync::new(
            pool.clone(),
            Some(source.clone() as Arc<dyn SourceApi>),
            Some(destination.clone() as Arc<dyn DestinationApi>),
            StatusSettings {
                page_size: 50,
                lookback_ms: 3_600_000,
            },
        );
        Harness {
            pool,
            source,
            destination,
            sync,
        }
    }

    #[tokio::test]
    async fn test_mapped_destination_status_updates_source_once() {
        let h = harness().await;
        status_mapping::insert(&h.pool, Some("completed"), Some("Shipped"))
            .await
            .unwrap();
        h.destination
            .push_order(destination_order("uuid-1", Some("42"), Some("Shipped")));

        let summary = h.sync.sync_from_destination().await.unwrap();
        assert_eq!(summary.selected, 1);
        assert_eq!(summary.succeeded, 1);

        let updates = h.source.status_updates.lock().unwrap();
        assert_eq!(updates.as_slice(), &[(42, "completed".to_string())]);
    }

    #[tokio::test]
    async fn test_unmapped_destination_status_issues_no_update() {
        let h = harness().await;
        status_mapping::insert(&h.pool, Some("completed"), Some("Shipped"))
            .await
            .unwrap();
        h.destination
            .push_order(destination_order("uuid-1", Some("42"), Some("Packed")));

        let summary = h.sync.sync_from_destination().await.unwrap();
        assert_eq!(summary.selected, 1);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped, 1);
        assert!(h.source.status_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_update_failure_does_not_block_other_orders() {
        let h = harness().await;
        status_mapping::insert(&h.pool, Some("completed"), Some("Shipped"))
            .await
            .unwrap();
        h.destination
            .push_order(destination_order("uuid-1", Some("41"), Some("Shipped")));
        h.destination
            .push_order(destination_order("uuid-2", Some("42"), Some("Shipped")));
        h.source.fail_status_updates();

        let summary = h.sync.sync_from_destination().await.unwrap();
        assert_eq!(summary.selected, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 0);
    }

    #[tokio::test]
    async fn test_unlinked_destination_order_is_skipped() {
        let h = harness().await;
        status_mapping::insert(&h.pool, Some("completed"), Some("Shipped"))
            .await
            .unwrap();
        h.destination
            .push_order(destination_order("uuid-1", None, Some("Shipped")));
        h.destination
            .push_order(destination_order("uuid-2", Some("not-numeric"), Some("Shipped")));

        let summary = h.sync.sync_from_destination().await.unwrap();
        assert_eq!(summary.skipped, 2);
        assert!(h.source.status_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_mapping_skips_sweep_entirely() {
        let h = harness().await;
        h.destination
            .push_order(destination_order("uuid-1", Some("42"), Some("Shipped")));

        let summary = h.sync.sync_from_destination().await.unwrap();
        assert_eq!(summary.selected, 0);
        assert!(h.source.status_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_destination_listing_failure_aborts_quietly() {
        let h = harness().await;
        status_mapping::insert(&h.pool, Some("completed"), Some("Shipped"))
            .await
            .unwrap();
        h.destination.fail_listing();

        let summary = h.sync.sync_from_destination().await.unwrap();
        assert_eq!(summary.selected, 0);
        assert!(h.source.status_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_status_propagates_via_catalog() {
        let h = harness().await;
        status_mapping::insert(&h.pool, Some("cancelled"), Some("Cancelled"))
            .await
            .unwrap();
        h.destination
            .set_catalog(&[("Cancelled", "https://dest/states/cancelled")]);
        h.source.push_order(source_order(42, "cancelled", Some("uuid-9")));

        let summary = h.sync.sync_to_destination().await.unwrap();
        assert_eq!(summary.succeeded, 1);

        let updates = h.destination.status_updates.lock().unwrap();
        assert_eq!(
            updates.as_slice(),
            &[("uuid-9".to_string(), "https://dest/states/cancelled".to_string())]
        );
    }

    #[tokio::test]
    async fn test_source_order_without_linkage_is_skipped() {
        let h = harness().await;
        status_mapping::insert(&h.pool, Some("cancelled"), Some("Cancelled"))
            .await
            .unwrap();
        h.source.push_order(source_order(42, "cancelled", None));

        let summary = h.sync.sync_to_destination().await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(h.destination.status_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mapped_status_missing_from_catalog_is_a_failure() {
        let h = harness().await;
        status_mapping::insert(&h.pool, Some("cancelled"), Some("Cancelled"))
            .await
            .unwrap();
        // Catalog knows nothing about "Cancelled"
        h.destination.set_catalog(&[("Shipped", "https://dest/states/shipped")]);
        h.source.push_order(source_order(42, "cancelled", Some("uuid-9")));

        let summary = h.sync.sync_to_destination().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert!(h.destination.status_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_both_sweeps() {
        let pool = DbService::new_in_memory().await.unwrap().pool;
        let sync = StatusSync::new(
            pool,
            None,
            None,
            StatusSettings {
                page_size: 50,
                lookback_ms: 3_600_000,
            },
        );
        assert_eq!(sync.sync_from_destination().await.unwrap().selected, 0);
        assert_eq!(sync.sync_to_destination().await.unwrap().selected, 0);
    }
}
