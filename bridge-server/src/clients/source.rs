//! SourceClient — HTTP client for the storefront order API
//!
//! Basic-auth REST API. Orders carry arbitrary key/value metadata, which
//! is where the destination linkage lives.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use shared::order::{SourceOrder, SourceOrderPatch};
use std::time::Duration;

use super::{ApiError, SourceApi, ensure_success};
use crate::utils::AppError;

pub struct SourceClient {
    client: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl SourceClient {
    /// Create a new storefront client.
    ///
    /// `base_url` is the REST root (e.g. `https://shop.example.com/api/v3`).
    pub fn new(
        base_url: String,
        consumer_key: String,
        consumer_secret: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            consumer_key,
            consumer_secret,
        })
    }

    fn order_url(&self, order_id: i64) -> String {
        format!("{}/orders/{order_id}", self.base_url)
    }
}

#[async_trait]
impl SourceApi for SourceClient {
    async fn get_order(&self, order_id: i64) -> Result<SourceOrder, ApiError> {
        let response = self
            .client
            .get(self.order_url(order_id))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        ensure_success(response)
            .await?
            .json::<SourceOrder>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn update_order(&self, order_id: i64, patch: &SourceOrderPatch) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.order_url(order_id))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .json(patch)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn update_order_status(&self, order_id: i64, status: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.order_url(order_id))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .json(&json!({ "status": status }))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn list_recently_changed(
        &self,
        since_ms: i64,
        page_size: u32,
    ) -> Result<Vec<SourceOrder>, ApiError> {
        let response = self
            .client
            .get(format!("{}/orders", self.base_url))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .query(&[
                ("modified_after", shared::util::millis_to_rfc3339(since_ms)),
                ("per_page", page_size.to_string()),
                ("orderby", "modified".into()),
                ("order", "desc".into()),
            ])
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        ensure_success(response)
            .await?
            .json::<Vec<SourceOrder>>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}
