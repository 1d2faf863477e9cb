//! Dead Letter Repository
//!
//! Terminal store for orders that exhausted their retry budget. Rows are
//! written once by the escalation pass and only ever read by operators.

use super::RepoResult;
use crate::db::models::{DeadLetterRow, PendingSyncRow};
use sqlx::SqlitePool;

/// Move a pending row into the dead-letter store.
///
/// Insert and delete run in one transaction: if either side fails the
/// pending row survives and the next sweep reconsiders it. An order is
/// never silently dropped; the worst case is a duplicate dead-letter row
/// from a partially visible escalation, which a human-reviewed terminal
/// store tolerates.
pub async fn escalate(
    pool: &SqlitePool,
    row: &PendingSyncRow,
    final_error: &str,
) -> RepoResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO dead_letter_sync
            (original_pending_id, order_id, payload, final_error_message, failed_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(row.id)
    .bind(row.order_id)
    .bind(&row.payload)
    .bind(final_error)
    .bind(shared::util::now_millis())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM pending_sync WHERE id = ?1")
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Number of dead-lettered orders.
pub async fn count(pool: &SqlitePool) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM dead_letter_sync")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Most recently failed orders, for the operator API.
pub async fn list_recent(pool: &SqlitePool, limit: u32) -> RepoResult<Vec<DeadLetterRow>> {
    let rows = sqlx::query_as::<_, DeadLetterRow>(
        r#"
        SELECT id, original_pending_id, order_id, payload, final_error_message, failed_at
        FROM dead_letter_sync
        ORDER BY failed_at DESC, id DESC
        LIMIT ?1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::pending;

    #[tokio::test]
    async fn test_escalate_moves_row_atomically() {
        let pool = DbService::new_in_memory().await.unwrap().pool;
        pending::record_failure(&pool, 7, r#"{"v":1}"#, "last error", None)
            .await
            .unwrap();
        let row = pending::get(&pool, 7).await.unwrap().unwrap();

        escalate(&pool, &row, &row.error_message).await.unwrap();

        assert!(pending::get(&pool, 7).await.unwrap().is_none());
        assert_eq!(count(&pool).await.unwrap(), 1);

        let dead = list_recent(&pool, 10).await.unwrap();
        assert_eq!(dead[0].order_id, 7);
        assert_eq!(dead[0].original_pending_id, row.id);
        assert_eq!(dead[0].payload, r#"{"v":1}"#);
        assert_eq!(dead[0].final_error_message, "last error");
    }

    #[tokio::test]
    async fn test_escalate_with_override_error() {
        let pool = DbService::new_in_memory().await.unwrap().pool;
        pending::record_failure(&pool, 9, "not json", "HTTP 500", None)
            .await
            .unwrap();
        let row = pending::get(&pool, 9).await.unwrap().unwrap();

        // Malformed payloads escalate with the decode error, not the last
        // HTTP error
        escalate(&pool, &row, "payload decode failed: expected value")
            .await
            .unwrap();

        let dead = list_recent(&pool, 10).await.unwrap();
        assert_eq!(dead[0].final_error_message, "payload decode failed: expected value");
    }

    #[tokio::test]
    async fn test_list_recent_is_bounded() {
        let pool = DbService::new_in_memory().await.unwrap().pool;
        for id in 1..=5 {
            pending::record_failure(&pool, id, "{}", "e", None).await.unwrap();
            let row = pending::get(&pool, id).await.unwrap().unwrap();
            escalate(&pool, &row, "e").await.unwrap();
        }
        assert_eq!(count(&pool).await.unwrap(), 5);
        assert_eq!(list_recent(&pool, 3).await.unwrap().len(), 3);
    }
}
