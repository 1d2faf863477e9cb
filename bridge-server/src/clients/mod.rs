//! HTTP clients for the two external order systems
//!
//! The sweeps only ever talk to the [`SourceApi`] and [`DestinationApi`]
//! traits; [`SourceClient`] and [`DestinationClient`] are the reqwest
//! implementations. Tests substitute in-memory fakes.

pub mod destination;
pub mod source;

pub use destination::DestinationClient;
pub use source::SourceClient;

use async_trait::async_trait;
use shared::order::{
    DestinationOrder, DestinationOrderCreated, SourceOrder, SourceOrderPatch, StatusCatalogEntry,
};
use thiserror::Error;

/// Transport-level failure of an external API call
///
/// Classification into the sync failure taxonomy (retryable or not)
/// happens at the executor boundary, not here.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, DNS or timeout failure; the request may never have
    /// reached the remote system
    #[error("Network error: {0}")]
    Network(String),

    /// The remote system answered with an error status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded as the expected shape
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a reqwest transport error.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Storefront (source) order API
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Fetch a single order.
    async fn get_order(&self, order_id: i64) -> Result<SourceOrder, ApiError>;

    /// Apply a partial update (order number, metadata entries).
    /// Idempotent on the source side; safe to repeat.
    async fn update_order(&self, order_id: i64, patch: &SourceOrderPatch) -> Result<(), ApiError>;

    /// Set the order status.
    async fn update_order_status(&self, order_id: i64, status: &str) -> Result<(), ApiError>;

    /// Orders modified since `since_ms`, most recent first, bounded.
    async fn list_recently_changed(
        &self,
        since_ms: i64,
        page_size: u32,
    ) -> Result<Vec<SourceOrder>, ApiError>;
}

/// Fulfillment backend (destination) order API
#[async_trait]
pub trait DestinationApi: Send + Sync {
    /// Create an order from an opaque payload. At most one destination
    /// order is created per successful call.
    async fn create_order(
        &self,
        payload: &serde_json::Value,
    ) -> Result<DestinationOrderCreated, ApiError>;

    /// Set an order's state by catalog href.
    async fn update_order_status(
        &self,
        destination_id: &str,
        state_href: &str,
    ) -> Result<(), ApiError>;

    /// Orders updated since `since_ms`, most recently updated first,
    /// bounded, with their state expanded.
    async fn list_recently_changed(
        &self,
        since_ms: i64,
        page_size: u32,
    ) -> Result<Vec<DestinationOrder>, ApiError>;

    /// The status catalog (name → href) of the order entity.
    async fn get_status_catalog(&self) -> Result<Vec<StatusCatalogEntry>, ApiError>;
}

/// Turn a reqwest response into `ApiError::Status` unless it succeeded.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}
