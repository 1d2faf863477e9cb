//! Bridge Server - order reconciliation between a storefront and a
//! fulfillment backend
//!
//! # Architecture overview
//!
//! Two systems of record hold the same orders and only talk through
//! rate-limited, occasionally-failing HTTP APIs. This service keeps them
//! agreeing:
//!
//! - **Forward sync** (`sync::executor`): new source orders are created
//!   in the destination exactly-effectively-once, and the assigned
//!   identifiers are written back as source metadata
//! - **Retry pipeline** (`sync::retry` + `db`): failed syncs land in a
//!   durable pending queue and are retried on a schedule; orders that
//!   exhaust their budget move to a dead-letter store for operators
//! - **Status reconciliation** (`sync::status`): two periodic sweeps
//!   propagate status changes in both directions through an
//!   operator-managed mapping table
//!
//! # Module structure
//!
//! ```text
//! bridge-server/src/
//! ├── core/          # Configuration, state, server, background tasks
//! ├── api/           # HTTP routes and handlers
//! ├── clients/       # HTTP clients for the two external systems
//! ├── sync/          # Reconciliation engine
//! ├── db/            # SQLite store (pending, dead-letter, mapping)
//! └── utils/         # Errors, logging
//! ```

pub mod api;
pub mod clients;
pub mod core;
pub mod db;
pub mod sync;
pub mod utils;

// Re-export public types
pub use crate::core::{Config, Server, ServerState};
pub use crate::sync::{SweepSummary, SyncExecutor, SyncFailure, SyncOutcome};
pub use crate::utils::{AppError, AppResult};

/// Prepare the process environment: .env file and logging.
pub fn setup_environment() {
    dotenv::dotenv().ok();
    utils::logger::init_logger();
}
