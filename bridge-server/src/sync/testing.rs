//! In-memory fakes of the external order APIs for engine tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use shared::order::{
    DestinationOrder, DestinationOrderCreated, MetaDataEntry, Meta, SourceOrder, SourceOrderPatch,
    StateRef, StatusCatalogEntry,
};

use crate::clients::{ApiError, DestinationApi, SourceApi};

/// Fake storefront API recording every write it receives
#[derive(Default)]
pub struct MockSourceApi {
    pub orders: Mutex<Vec<SourceOrder>>,
    pub patches: Mutex<Vec<(i64, SourceOrderPatch)>>,
    pub status_updates: Mutex<Vec<(i64, String)>>,
    fail_update: AtomicBool,
    fail_status_update: AtomicBool,
}

impl MockSourceApi {
    /// Make every subsequent `update_order` call fail.
    pub fn fail_updates(&self) {
        self.fail_update.store(true, Ordering::SeqCst);
    }

    /// Stop failing `update_order` calls.
    pub fn recover_updates(&self) {
        self.fail_update.store(false, Ordering::SeqCst);
    }

    /// Make every subsequent `update_order_status` call fail.
    pub fn fail_status_updates(&self) {
        self.fail_status_update.store(true, Ordering::SeqCst);
    }

    pub fn push_order(&self, order: SourceOrder) {
        self.orders.lock().unwrap().push(order);
    }
}

#[async_trait]
impl SourceApi for MockSourceApi {
    async fn get_order(&self, order_id: i64) -> Result<SourceOrder, ApiError> {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                body: "order not found".into(),
            })
    }

    async fn update_order(&self, order_id: i64, patch: &SourceOrderPatch) -> Result<(), ApiError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(ApiError::Network("source unreachable".into()));
        }
        self.patches.lock().unwrap().push((order_id, patch.clone()));
        Ok(())
    }

    async fn update_order_status(&self, order_id: i64, status: &str) -> Result<(), ApiError> {
        if self.fail_status_update.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 500,
                body: "source error".into(),
            });
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((order_id, status.to_string()));
        Ok(())
    }

    async fn list_recently_changed(
        &self,
        _since_ms: i64,
        page_size: u32,
    ) -> Result<Vec<SourceOrder>, ApiError> {
        let orders = self.orders.lock().unwrap();
        Ok(orders.iter().take(page_size as usize).cloned().collect())
    }
}

/// Fake fulfillment backend with scripted create-order outcomes
#[derive(Default)]
pub struct MockDestinationApi {
    create_results: Mutex<VecDeque<Result<DestinationOrderCreated, ApiError>>>,
    create_count: AtomicUsize,
    auto_id: AtomicUsize,
    pub orders: Mutex<Vec<DestinationOrder>>,
    pub status_updates: Mutex<Vec<(String, String)>>,
    pub catalog: Mutex<Vec<StatusCatalogEntry>>,
    fail_list: AtomicBool,
}

impl MockDestinationApi {
    /// Script a successful creation with a complete envelope.
    pub fn script_created(&self, id: &str, number: &str) {
        self.create_results
            .lock()
            .unwrap()
            .push_back(Ok(DestinationOrderCreated {
                id: Some(id.to_string()),
                name: Some(number.to_string()),
                meta: Some(Meta {
                    href: Some(format!("https://dest/orders/{id}")),
                }),
            }));
    }

    /// Script a structurally incomplete success response.
    pub fn script_created_without_href(&self, id: &str, number: &str) {
        self.create_results
            .lock()
            .unwrap()
            .push_back(Ok(DestinationOrderCreated {
                id: Some(id.to_string()),
                name: Some(number.to_string()),
                meta: None,
            }));
    }

    /// Script an HTTP error status.
    pub fn script_create_status(&self, status: u16, body: &str) {
        self.create_results
            .lock()
            .unwrap()
            .push_back(Err(ApiError::Status {
                status,
                body: body.to_string(),
            }));
    }

    /// Script a transport-level failure.
    pub fn script_create_network_error(&self, message: &str) {
        self.create_results
            .lock()
            .unwrap()
            .push_back(Err(ApiError::Network(message.to_string())));
    }

    /// Number of create-order calls observed.
    pub fn create_calls(&self) -> usize {
        self.create_count.load(Ordering::SeqCst)
    }

    pub fn push_order(&self, order: DestinationOrder) {
        self.orders.lock().unwrap().push(order);
    }

    pub fn set_catalog(&self, entries: &[(&str, &str)]) {
        *self.catalog.lock().unwrap() = entries
            .iter()
            .map(|(name, href)| StatusCatalogEntry {
                name: name.to_string(),
                meta: Meta {
                    href: Some(href.to_string()),
                },
            })
            .collect();
    }

    /// Make `list_recently_changed` fail.
    pub fn fail_listing(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DestinationApi for MockDestinationApi {
    async fn create_order(
        &self,
        _payload: &serde_json::Value,
    ) -> Result<DestinationOrderCreated, ApiError> {
        self.create_count.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.create_results.lock().unwrap().pop_front() {
            return result;
        }
        // No scripted outcome: succeed with generated identifiers
        let n = self.auto_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DestinationOrderCreated {
            id: Some(format!("uuid-auto-{n}")),
            name: Some(format!("B-auto-{n}")),
            meta: Some(Meta {
                href: Some(format!("https://dest/orders/uuid-auto-{n}")),
            }),
        })
    }

    async fn update_order_status(
        &self,
        destination_id: &str,
        state_href: &str,
    ) -> Result<(), ApiError> {
        self.status_updates
            .lock()
            .unwrap()
            .push((destination_id.to_string(), state_href.to_string()));
        Ok(())
    }

    async fn list_recently_changed(
        &self,
        _since_ms: i64,
        page_size: u32,
    ) -> Result<Vec<DestinationOrder>, ApiError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ApiError::Network("destination unreachable".into()));
        }
        let orders = self.orders.lock().unwrap();
        Ok(orders.iter().take(page_size as usize).cloned().collect())
    }

    async fn get_status_catalog(&self) -> Result<Vec<StatusCatalogEntry>, ApiError> {
        Ok(self.catalog.lock().unwrap().clone())
    }
}

/// Build a source order with linkage metadata.
pub fn source_order(id: i64, status: &str, destination_id: Option<&str>) -> SourceOrder {
    let mut meta_data = Vec::new();
    if let Some(dest_id) = destination_id {
        meta_data.push(MetaDataEntry {
            key: shared::order::DESTINATION_ID_KEY.into(),
            value: dest_id.to_string(),
        });
    }
    SourceOrder {
        id,
        status: Some(status.to_string()),
        meta_data,
    }
}

/// Build a destination order with an expanded state.
pub fn destination_order(id: &str, external_code: Option<&str>, status: Option<&str>) -> DestinationOrder {
    DestinationOrder {
        id: id.to_string(),
        name: Some(format!("B-{id}")),
        external_code: external_code.map(String::from),
        state: status.map(|name| StateRef {
            name: Some(name.to_string()),
        }),
    }
}
