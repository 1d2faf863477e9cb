//! Status Mapping Repository
//!
//! The `status_mapping` table is operator-managed; the engine only reads
//! it. Each sweep loads the full table and builds its lookup maps fresh,
//! so operator edits take effect at the next sweep without invalidation.

use super::RepoResult;
use crate::db::models::StatusMappingRow;
use sqlx::SqlitePool;

/// Load every mapping row, in table order.
pub async fn load_all(pool: &SqlitePool) -> RepoResult<Vec<StatusMappingRow>> {
    let rows = sqlx::query_as::<_, StatusMappingRow>(
        "SELECT id, source_status, destination_status FROM status_mapping ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
pub async fn insert(
    pool: &SqlitePool,
    source_status: Option<&str>,
    destination_status: Option<&str>,
) -> RepoResult<()> {
    sqlx::query("INSERT INTO status_mapping (source_status, destination_status) VALUES (?1, ?2)")
        .bind(source_status)
        .bind(destination_status)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    #[tokio::test]
    async fn test_load_all_preserves_table_order() {
        let pool = DbService::new_in_memory().await.unwrap().pool;
        insert(&pool, Some("completed"), Some("Shipped")).await.unwrap();
        insert(&pool, Some("cancelled"), Some("Cancelled")).await.unwrap();
        insert(&pool, None, Some("Packed")).await.unwrap();

        let rows = load_all(&pool).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].source_status.as_deref(), Some("completed"));
        assert_eq!(rows[2].source_status, None);
        assert_eq!(rows[2].destination_status.as_deref(), Some("Packed"));
    }
}
