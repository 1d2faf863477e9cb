//! Shared types for the order bridge
//!
//! Wire types for the two external order systems (storefront source and
//! fulfillment destination) plus small utilities used across crates.

pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
