//! API routing module
//!
//! # Structure
//!
//! - [`health`] - health checks
//! - [`sync`] - sync trigger and operational surface of the
//!   reconciliation engine

pub mod health;
pub mod sync;

use axum::Router;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// Compose all API routers.
pub fn router() -> Router<ServerState> {
    Router::new().merge(health::router()).merge(sync::router())
}
