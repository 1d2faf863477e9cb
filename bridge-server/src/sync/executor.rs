//! Sync Executor — idempotent single-order forward sync
//!
//! Submits one order to the destination system, validates the response
//! envelope, and writes the assigned identifiers back onto the source
//! order ("link-back"). Every remote failure is converted into the
//! [`SyncFailure`] taxonomy here; nothing escapes this boundary as a raw
//! transport error.
//!
//! # Retry scope
//!
//! A link-back failure means the order already exists downstream. Such
//! orders must not be re-submitted (that would create a duplicate);
//! [`SyncExecutor::relink_order`] re-attempts only the link-back step,
//! which is idempotent on the source side.

use std::sync::Arc;

use serde::Serialize;
use shared::order::{DestinationRef, SourceOrderPatch};
use thiserror::Error;

use crate::clients::{ApiError, DestinationApi, SourceApi};

/// Result of a successful forward sync
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    /// Identifiers assigned by the destination system
    pub destination: DestinationRef,
}

/// Failure taxonomy of a forward-sync attempt
#[derive(Debug, Error)]
pub enum SyncFailure {
    /// API credentials are missing; retrying cannot succeed until an
    /// operator fixes the configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection, DNS or timeout failure
    #[error("Network error: {0}")]
    Network(String),

    /// The destination answered with an error status. 5xx may heal on
    /// retry; 4xx means the payload itself is defective
    #[error("HTTP {status} from destination: {body}")]
    Server { status: u16, body: String },

    /// Success response missing a required field of the creation envelope
    #[error("Invalid destination response: {0}")]
    InvalidResponse(String),

    /// Order created downstream, but writing the linkage back to the
    /// source failed
    #[error("Order created as {} but link-back failed: {message}", .destination.number)]
    LinkBack {
        destination: DestinationRef,
        message: String,
    },

    /// Stored payload no longer deserializes; waiting cannot fix it
    #[error("Stored payload is unreadable: {0}")]
    Payload(String),
}

impl SyncFailure {
    /// Whether an automatic retry can ever succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncFailure::Configuration(_) | SyncFailure::Payload(_) => false,
            SyncFailure::Server { status, .. } => *status >= 500,
            SyncFailure::Network(_)
            | SyncFailure::InvalidResponse(_)
            | SyncFailure::LinkBack { .. } => true,
        }
    }

    /// Short machine-readable kind, for API responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncFailure::Configuration(_) => "configuration",
            SyncFailure::Network(_) => "network",
            SyncFailure::Server { .. } => "server",
            SyncFailure::InvalidResponse(_) => "invalid_response",
            SyncFailure::LinkBack { .. } => "link_back",
            SyncFailure::Payload(_) => "payload",
        }
    }

    /// Destination identifiers to persist alongside the failure, so a
    /// retry re-attempts only the link-back step.
    pub fn link_target(&self) -> Option<&DestinationRef> {
        match self {
            SyncFailure::LinkBack { destination, .. } => Some(destination),
            _ => None,
        }
    }

    /// Classify a destination create-order transport error.
    fn from_create(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => SyncFailure::Network(msg),
            ApiError::Status { status, body } => SyncFailure::Server { status, body },
            // A body we cannot decode is the same class of problem as a
            // decoded body missing its required fields
            ApiError::Decode(msg) => SyncFailure::InvalidResponse(msg),
        }
    }
}

/// Forward-sync executor
///
/// Holds handles to both external systems. Either handle may be absent
/// when the corresponding credentials are not configured; attempts then
/// classify as [`SyncFailure::Configuration`] instead of failing at
/// startup, so the pending queue keeps recording orders for later.
pub struct SyncExecutor {
    source: Option<Arc<dyn SourceApi>>,
    destination: Option<Arc<dyn DestinationApi>>,
}

impl SyncExecutor {
    pub fn new(
        source: Option<Arc<dyn SourceApi>>,
        destination: Option<Arc<dyn DestinationApi>>,
    ) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Submit an order to the destination and link it back to the source.
    ///
    /// At most one destination-side order is created per successful call.
    /// The link-back metadata write is idempotent and safe to repeat.
    pub async fn sync_order(
        &self,
        order_id: i64,
        payload: &serde_json::Value,
    ) -> Result<SyncOutcome, SyncFailure> {
        let source = self.source_handle()?;
        let destination = self
            .destination
            .as_ref()
            .ok_or_else(|| {
                SyncFailure::Configuration("Destination API credentials are not configured".into())
            })?;

        tracing::info!(order_id, "Submitting order to destination");
        let created = destination
            .create_order(payload)
            .await
            .map_err(SyncFailure::from_create)?;

        let destination_ref = created.into_ref().map_err(SyncFailure::InvalidResponse)?;

        self.link_back(source, order_id, destination_ref).await
    }

    /// Re-attempt only the link-back step for an order that was already
    /// created downstream.
    pub async fn relink_order(
        &self,
        order_id: i64,
        destination: DestinationRef,
    ) -> Result<SyncOutcome, SyncFailure> {
        let source = self.source_handle()?;
        tracing::info!(
            order_id,
            destination_id = %destination.id,
            "Re-attempting link-back for already-created order"
        );
        self.link_back(source, order_id, destination).await
    }

    fn source_handle(&self) -> Result<&Arc<dyn SourceApi>, SyncFailure> {
        self.source.as_ref().ok_or_else(|| {
            SyncFailure::Configuration("Source API credentials are not configured".into())
        })
    }

    async fn link_back(
        &self,
        source: &Arc<dyn SourceApi>,
        order_id: i64,
        destination: DestinationRef,
    ) -> Result<SyncOutcome, SyncFailure> {
        let patch = SourceOrderPatch::link(&destination);
        match source.update_order(order_id, &patch).await {
            Ok(()) => {
                tracing::info!(
                    order_id,
                    destination_id = %destination.id,
                    destination_number = %destination.number,
                    "Order synced and linked"
                );
                Ok(SyncOutcome { destination })
            }
            Err(e) => Err(SyncFailure::LinkBack {
                destination,
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{MockDestinationApi, MockSourceApi};
    use serde_json::json;
    use shared::order::{DESTINATION_ID_KEY, DESTINATION_NUMBER_KEY};

    fn executor(
        source: &Arc<MockSourceApi>,
        destination: &Arc<MockDestinationApi>,
    ) -> SyncExecutor {
        SyncExecutor::new(
            Some(source.clone() as Arc<dyn SourceApi>),
            Some(destination.clone() as Arc<dyn DestinationApi>),
        )
    }

    #[tokio::test]
    async fn test_success_propagates_linkage_to_source() {
        let source = Arc::new(MockSourceApi::default());
        let destination = Arc::new(MockDestinationApi::default());
        destination.script_created("uuid-1", "B-100");

        let outcome = executor(&source, &destination)
            .sync_order(42, &json!({"total": 10}))
            .await
            .unwrap();

        assert_eq!(outcome.destination.id, "uuid-1");
        assert_eq!(outcome.destination.number, "B-100");

        let patches = source.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        let (order_id, patch) = &patches[0];
        assert_eq!(*order_id, 42);
        assert_eq!(patch.number.as_deref(), Some("B-100"));
        assert!(patch.meta_data.iter().any(|e| e.key == DESTINATION_ID_KEY && e.value == "uuid-1"));
        assert!(
            patch
                .meta_data
                .iter()
                .any(|e| e.key == DESTINATION_NUMBER_KEY && e.value == "B-100")
        );
    }

    #[tokio::test]
    async fn test_missing_meta_href_is_invalid_response() {
        let source = Arc::new(MockSourceApi::default());
        let destination = Arc::new(MockDestinationApi::default());
        destination.script_created_without_href("uuid-1", "B-100");

        let err = executor(&source, &destination)
            .sync_order(42, &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncFailure::InvalidResponse(_)));
        assert!(err.is_retryable());
        // No link-back was attempted
        assert!(source.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_failures_split_on_status_class() {
        let source = Arc::new(MockSourceApi::default());
        let destination = Arc::new(MockDestinationApi::default());
        destination.script_create_status(503, "unavailable");
        destination.script_create_status(400, "bad payload");

        let exec = executor(&source, &destination);

        let err = exec.sync_order(1, &json!({})).await.unwrap_err();
        assert!(matches!(err, SyncFailure::Server { status: 503, .. }));
        assert!(err.is_retryable());

        let err = exec.sync_order(1, &json!({})).await.unwrap_err();
        assert!(matches!(err, SyncFailure::Server { status: 400, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_network_failure_is_retryable() {
        let source = Arc::new(MockSourceApi::default());
        let destination = Arc::new(MockDestinationApi::default());
        destination.script_create_network_error("connection refused");

        let err = executor(&source, &destination)
            .sync_order(1, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncFailure::Network(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_credentials_is_configuration_failure() {
        let exec = SyncExecutor::new(None, None);
        let err = exec.sync_order(1, &json!({})).await.unwrap_err();
        assert!(matches!(err, SyncFailure::Configuration(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_link_back_failure_carries_destination_ref() {
        let source = Arc::new(MockSourceApi::default());
        source.fail_updates();
        let destination = Arc::new(MockDestinationApi::default());
        destination.script_created("uuid-9", "B-9");

        let err = executor(&source, &destination)
            .sync_order(7, &json!({}))
            .await
            .unwrap_err();

        let target = err.link_target().cloned().unwrap();
        assert_eq!(target.id, "uuid-9");
        assert_eq!(target.number, "B-9");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_relink_does_not_resubmit_to_destination() {
        let source = Arc::new(MockSourceApi::default());
        let destination = Arc::new(MockDestinationApi::default());

        let outcome = executor(&source, &destination)
            .relink_order(
                7,
                DestinationRef {
                    id: "uuid-9".into(),
                    number: "B-9".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.destination.id, "uuid-9");
        assert_eq!(destination.create_calls(), 0);
        assert_eq!(source.patches.lock().unwrap().len(), 1);
    }
}
