//! Sync API module
//!
//! # Routes
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/sync/orders | POST | Submit a new order for forward sync |
//! | /api/sync/orders/{id} | GET | Linkage state of one order |
//! | /api/sync/status | GET | Pending / dead-letter counts |
//! | /api/sync/pending | GET | Recently queued orders |
//! | /api/sync/dead-letter | GET | Recently dead-lettered orders |
//! | /api/sync/retry | POST | Trigger a retry sweep now |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/sync", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/orders", post(handler::submit_order))
        .route("/orders/{order_id}", get(handler::get_order_link))
        .route("/status", get(handler::get_sync_status))
        .route("/pending", get(handler::list_pending))
        .route("/dead-letter", get(handler::list_dead_letter))
        .route("/retry", post(handler::trigger_retry))
}
