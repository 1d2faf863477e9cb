//! Pending Sync Repository
//!
//! The durable queue of orders awaiting a successful forward-sync. One
//! active row per `order_id` (UNIQUE constraint): recording a failure for
//! an order already present updates the row and bumps `retry_count` in
//! the same statement, so concurrent writers can never lose an increment.

use super::RepoResult;
use crate::db::models::PendingSyncRow;
use shared::order::DestinationRef;
use sqlx::SqlitePool;

const SELECT_COLUMNS: &str = "id, order_id, payload, retry_count, last_attempt_at, \
     error_message, created_at, destination_id, destination_number";

/// Record a failed sync attempt for an order.
///
/// Inserts a new row with `retry_count = 1`. If the order is already
/// pending, overwrites payload and error, bumps `retry_count` and stamps
/// `last_attempt_at`. `destination` carries the identifiers of an order
/// that was created downstream but could not be linked back; it survives
/// later failures (COALESCE) so the narrower link-back retry scope is
/// never widened by accident.
pub async fn record_failure(
    pool: &SqlitePool,
    order_id: i64,
    payload: &str,
    error_message: &str,
    destination: Option<&DestinationRef>,
) -> RepoResult<()> {
    let now = shared::util::now_millis();
    sqlx::query(
        r#"
        INSERT INTO pending_sync
            (order_id, payload, retry_count, last_attempt_at, error_message, created_at,
             destination_id, destination_number)
        VALUES (?1, ?2, 1, ?3, ?4, ?3, ?5, ?6)
        ON CONFLICT(order_id) DO UPDATE SET
            payload            = excluded.payload,
            error_message      = excluded.error_message,
            last_attempt_at    = excluded.last_attempt_at,
            retry_count        = pending_sync.retry_count + 1,
            destination_id     = COALESCE(excluded.destination_id, pending_sync.destination_id),
            destination_number = COALESCE(excluded.destination_number, pending_sync.destination_number)
        "#,
    )
    .bind(order_id)
    .bind(payload)
    .bind(now)
    .bind(error_message)
    .bind(destination.map(|d| d.id.as_str()))
    .bind(destination.map(|d| d.number.as_str()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove an order from the queue; no-op when absent.
///
/// Returns whether a row was actually deleted.
pub async fn remove(pool: &SqlitePool, order_id: i64) -> RepoResult<bool> {
    let result = sqlx::query("DELETE FROM pending_sync WHERE order_id = ?1")
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Fetch one pending row by source order id.
pub async fn get(pool: &SqlitePool, order_id: i64) -> RepoResult<Option<PendingSyncRow>> {
    let row = sqlx::query_as::<_, PendingSyncRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM pending_sync WHERE order_id = ?1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Rows still within the retry budget whose last attempt is older than
/// the cool-down window.
///
/// Oldest `last_attempt_at` first, ties broken by `created_at`, so
/// long-pending orders cannot be starved by fresh failures. The cool-down
/// keeps the sweep from re-selecting an order whose first attempt may
/// still be in flight.
pub async fn select_eligible_for_retry(
    pool: &SqlitePool,
    max_retries: u32,
    cooldown_ms: i64,
    batch_size: u32,
) -> RepoResult<Vec<PendingSyncRow>> {
    let threshold = shared::util::now_millis() - cooldown_ms;
    let rows = sqlx::query_as::<_, PendingSyncRow>(&format!(
        r#"
        SELECT {SELECT_COLUMNS} FROM pending_sync
        WHERE retry_count < ?1 AND last_attempt_at <= ?2
        ORDER BY last_attempt_at ASC, created_at ASC
        LIMIT ?3
        "#
    ))
    .bind(max_retries)
    .bind(threshold)
    .bind(batch_size)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Rows that exhausted their retry budget. Bounded, unordered.
pub async fn select_exhausted(
    pool: &SqlitePool,
    max_retries: u32,
    batch_size: u32,
) -> RepoResult<Vec<PendingSyncRow>> {
    let rows = sqlx::query_as::<_, PendingSyncRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM pending_sync WHERE retry_count >= ?1 LIMIT ?2"
    ))
    .bind(max_retries)
    .bind(batch_size)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Number of orders currently awaiting sync.
pub async fn count(pool: &SqlitePool) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pending_sync")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Most recently created pending rows, for the operator API.
pub async fn list_recent(pool: &SqlitePool, limit: u32) -> RepoResult<Vec<PendingSyncRow>> {
    let rows = sqlx::query_as::<_, PendingSyncRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM pending_sync ORDER BY created_at DESC LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    async fn test_pool() -> SqlitePool {
        DbService::new_in_memory().await.unwrap().pool
    }

    /// Backdate a row's attempt/creation timestamps so ordering and
    /// cool-down queries can be exercised deterministically.
    async fn backdate(pool: &SqlitePool, order_id: i64, last_attempt_at: i64, created_at: i64) {
        sqlx::query("UPDATE pending_sync SET last_attempt_at = ?1, created_at = ?2 WHERE order_id = ?3")
            .bind(last_attempt_at)
            .bind(created_at)
            .bind(order_id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_failure_inserts_with_retry_count_one() {
        let pool = test_pool().await;
        record_failure(&pool, 7, r#"{"total":10}"#, "Network error", None)
            .await
            .unwrap();

        let row = get(&pool, 7).await.unwrap().unwrap();
        assert_eq!(row.retry_count, 1);
        assert_eq!(row.error_message, "Network error");
        assert_eq!(row.payload, r#"{"total":10}"#);
        assert!(row.destination_ref().is_none());
    }

    #[tokio::test]
    async fn test_repeat_failure_increments_and_overwrites() {
        let pool = test_pool().await;
        record_failure(&pool, 7, r#"{"v":1}"#, "first", None).await.unwrap();
        record_failure(&pool, 7, r#"{"v":2}"#, "second", None).await.unwrap();
        record_failure(&pool, 7, r#"{"v":3}"#, "third", None).await.unwrap();

        let row = get(&pool, 7).await.unwrap().unwrap();
        assert_eq!(row.retry_count, 3);
        assert_eq!(row.error_message, "third");
        assert_eq!(row.payload, r#"{"v":3}"#);

        // Still exactly one row for the order
        assert_eq!(count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_destination_ref_survives_later_failures() {
        let pool = test_pool().await;
        let dest = DestinationRef {
            id: "uuid-1".into(),
            number: "B-1".into(),
        };
        record_failure(&pool, 7, "{}", "link-back failed", Some(&dest))
            .await
            .unwrap();
        // A later failure without destination info must not clear it
        record_failure(&pool, 7, "{}", "network error", None).await.unwrap();

        let row = get(&pool, 7).await.unwrap().unwrap();
        assert_eq!(row.retry_count, 2);
        assert_eq!(row.destination_ref(), Some(dest));
    }

    #[tokio::test]
    async fn test_remove_is_noop_when_absent() {
        let pool = test_pool().await;
        assert!(!remove(&pool, 99).await.unwrap());

        record_failure(&pool, 99, "{}", "e", None).await.unwrap();
        assert!(remove(&pool, 99).await.unwrap());
        assert!(get(&pool, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eligibility_respects_cooldown() {
        let pool = test_pool().await;
        record_failure(&pool, 1, "{}", "e", None).await.unwrap();

        // Fresh failure: filtered out by a 5-minute cool-down
        let rows = select_eligible_for_retry(&pool, 5, 300_000, 20).await.unwrap();
        assert!(rows.is_empty());

        // Once outside the window it becomes eligible
        let old = shared::util::now_millis() - 600_000;
        backdate(&pool, 1, old, old).await;
        let rows = select_eligible_for_retry(&pool, 5, 300_000, 20).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_id, 1);
    }

    #[tokio::test]
    async fn test_eligibility_orders_oldest_attempt_first() {
        let pool = test_pool().await;
        for id in 1..=3 {
            record_failure(&pool, id, "{}", "e", None).await.unwrap();
        }
        let now = shared::util::now_millis();
        backdate(&pool, 1, now - 1_000, now - 1_000).await;
        backdate(&pool, 2, now - 3_000, now - 3_000).await;
        // Same attempt age as order 2, but created earlier: wins the tie
        backdate(&pool, 3, now - 3_000, now - 5_000).await;

        let rows = select_eligible_for_retry(&pool, 5, 0, 20).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.order_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_eligibility_excludes_exhausted() {
        let pool = test_pool().await;
        for _ in 0..5 {
            record_failure(&pool, 7, "{}", "e", None).await.unwrap();
        }
        record_failure(&pool, 8, "{}", "e", None).await.unwrap();

        let eligible = select_eligible_for_retry(&pool, 5, 0, 20).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].order_id, 8);

        let exhausted = select_exhausted(&pool, 5, 50).await.unwrap();
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].order_id, 7);
        assert_eq!(exhausted[0].retry_count, 5);
    }

    #[tokio::test]
    async fn test_concurrent_failures_lose_no_increment() {
        // File-backed pool with multiple connections so writers genuinely race
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.db");
        let db = DbService::new(path.to_str().unwrap()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let pool = db.pool.clone();
            handles.push(tokio::spawn(async move {
                record_failure(&pool, 7, "{}", &format!("failure {i}"), None)
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let row = get(&db.pool, 7).await.unwrap().unwrap();
        assert_eq!(row.retry_count, 20);
    }
}
