//! DestinationClient — HTTP client for the fulfillment backend API
//!
//! Bearer-token JSON API. Entity listings come wrapped in a `rows`
//! envelope; order states are referenced by catalog href rather than by
//! name, so status writes go through the entity metadata catalog.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use shared::order::{DestinationOrder, DestinationOrderCreated, StatusCatalogEntry};
use std::time::Duration;

use super::{ApiError, DestinationApi, ensure_success};
use crate::utils::AppError;

pub struct DestinationClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Listing envelope used by the destination API
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    rows: Vec<T>,
}

/// Entity metadata envelope carrying the status catalog
#[derive(Debug, Deserialize)]
struct OrderMetadata {
    #[serde(default = "Vec::new")]
    states: Vec<StatusCatalogEntry>,
}

impl DestinationClient {
    /// Create a new fulfillment backend client.
    ///
    /// `base_url` is the entity API root (e.g.
    /// `https://erp.example.com/api/v2`).
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl DestinationApi for DestinationClient {
    async fn create_order(
        &self,
        payload: &serde_json::Value,
    ) -> Result<DestinationOrderCreated, ApiError> {
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        ensure_success(response)
            .await?
            .json::<DestinationOrderCreated>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn update_order_status(
        &self,
        destination_id: &str,
        state_href: &str,
    ) -> Result<(), ApiError> {
        let body = json!({
            "state": {
                "meta": {
                    "href": state_href,
                    "type": "state",
                }
            }
        });

        let response = self
            .client
            .put(format!("{}/orders/{destination_id}", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
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
    ) -> Result<Vec<DestinationOrder>, ApiError> {
        let response = self
            .client
            .get(format!("{}/orders", self.base_url))
            .bearer_auth(&self.token)
            .query(&[
                ("updated_from", shared::util::millis_to_rfc3339(since_ms)),
                ("limit", page_size.to_string()),
                ("expand", "state".into()),
                ("order", "updated,desc".into()),
            ])
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let list = ensure_success(response)
            .await?
            .json::<ListResponse<DestinationOrder>>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(list.rows)
    }

    async fn get_status_catalog(&self) -> Result<Vec<StatusCatalogEntry>, ApiError> {
        let response = self
            .client
            .get(format!("{}/orders/metadata", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let metadata = ensure_success(response)
            .await?
            .json::<OrderMetadata>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(metadata.states)
    }
}
