//! Bidirectional status mapping
//!
//! Built fresh from the `status_mapping` table at the start of every
//! sweep, so operator edits apply without any cache invalidation. The
//! table is assumed one-to-one both ways; on duplicate keys the
//! last-read row wins.

use std::collections::HashMap;

use crate::db::models::StatusMappingRow;
use crate::db::repository::{RepoResult, status_mapping};
use sqlx::SqlitePool;

/// In-memory view of the status mapping table
#[derive(Debug, Default)]
pub struct StatusMap {
    /// destination status name → source status name
    to_source: HashMap<String, String>,
    /// source status name → destination status name
    to_destination: HashMap<String, String>,
}

impl StatusMap {
    /// Load the mapping table and build both direction maps.
    pub async fn load(pool: &SqlitePool) -> RepoResult<Self> {
        let rows = status_mapping::load_all(pool).await?;
        Ok(Self::from_rows(&rows))
    }

    /// Build from raw rows. Rows missing either side are ignored; they
    /// cannot participate in a bidirectional mapping.
    pub fn from_rows(rows: &[StatusMappingRow]) -> Self {
        let mut map = Self::default();
        for row in rows {
            let (Some(source), Some(destination)) = (
                row.source_status.as_deref().filter(|s| !s.is_empty()),
                row.destination_status.as_deref().filter(|s| !s.is_empty()),
            ) else {
                continue;
            };
            map.to_source.insert(destination.to_string(), source.to_string());
            map.to_destination.insert(source.to_string(), destination.to_string());
        }
        map
    }

    /// Source-side status a destination status maps to.
    pub fn source_status_for(&self, destination_status: &str) -> Option<&str> {
        self.to_source.get(destination_status).map(String::as_str)
    }

    /// Destination-side status a source status maps to.
    pub fn destination_status_for(&self, source_status: &str) -> Option<&str> {
        self.to_destination.get(source_status).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.to_source.is_empty() && self.to_destination.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, source: Option<&str>, destination: Option<&str>) -> StatusMappingRow {
        StatusMappingRow {
            id,
            source_status: source.map(String::from),
            destination_status: destination.map(String::from),
        }
    }

    #[test]
    fn test_bidirectional_lookup() {
        let map = StatusMap::from_rows(&[
            row(1, Some("completed"), Some("Shipped")),
            row(2, Some("cancelled"), Some("Cancelled")),
        ]);

        assert_eq!(map.source_status_for("Shipped"), Some("completed"));
        assert_eq!(map.destination_status_for("completed"), Some("Shipped"));
        assert_eq!(map.source_status_for("Packed"), None);
        assert!(!map.is_empty());
    }

    #[test]
    fn test_last_read_wins_on_collision() {
        let map = StatusMap::from_rows(&[
            row(1, Some("processing"), Some("Confirmed")),
            row(2, Some("on-hold"), Some("Confirmed")),
        ]);

        // Later row wins the destination→source direction
        assert_eq!(map.source_status_for("Confirmed"), Some("on-hold"));
        // Both source statuses still map forward
        assert_eq!(map.destination_status_for("processing"), Some("Confirmed"));
        assert_eq!(map.destination_status_for("on-hold"), Some("Confirmed"));
    }

    #[test]
    fn test_incomplete_rows_are_ignored() {
        let map = StatusMap::from_rows(&[
            row(1, None, Some("Packed")),
            row(2, Some("pending"), None),
            row(3, Some(""), Some("New")),
        ]);
        assert!(map.is_empty());
    }
}
