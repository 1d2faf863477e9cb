//! Row types for the bridge's own tables

use serde::Serialize;
use shared::order::DestinationRef;

/// A row of the `pending_sync` queue
///
/// `payload` holds the JSON document exactly as last submitted to the
/// destination; `retry_count` is the number of failed attempts recorded
/// so far and only ever grows while the row exists.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PendingSyncRow {
    pub id: i64,
    pub order_id: i64,
    pub payload: String,
    pub retry_count: i64,
    pub last_attempt_at: i64,
    pub error_message: String,
    pub created_at: i64,
    pub destination_id: Option<String>,
    pub destination_number: Option<String>,
}

impl PendingSyncRow {
    /// Destination identifiers recorded by a failed link-back, if any.
    ///
    /// When present, the order was already created downstream and retries
    /// must only re-attempt the link-back step.
    pub fn destination_ref(&self) -> Option<DestinationRef> {
        match (&self.destination_id, &self.destination_number) {
            (Some(id), Some(number)) => Some(DestinationRef {
                id: id.clone(),
                number: number.clone(),
            }),
            _ => None,
        }
    }
}

/// A row of the `dead_letter_sync` terminal store
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeadLetterRow {
    pub id: i64,
    pub original_pending_id: i64,
    pub order_id: i64,
    pub payload: String,
    pub final_error_message: String,
    pub failed_at: i64,
}

/// A row of the operator-managed `status_mapping` table
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusMappingRow {
    pub id: i64,
    pub source_status: Option<String>,
    pub destination_status: Option<String>,
}
