//! Sync API handlers
//!
//! The first-sync trigger (storefront webhook entry point) plus the
//! operator surface over the pending and dead-letter stores.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::order::{DESTINATION_NUMBER_KEY, DestinationRef};

use crate::clients::ApiError;
use crate::core::ServerState;
use crate::db::models::{DeadLetterRow, PendingSyncRow};
use crate::db::repository::{dead_letter, pending};
use crate::sync::SweepSummary;
use crate::utils::{AppError, AppResponse, AppResult};

const DEFAULT_LIST_LIMIT: u32 = 50;

/// First-sync request: a newly created source order and its destination
/// payload, as shaped by the storefront webhook
#[derive(Debug, Deserialize)]
pub struct SubmitOrderRequest {
    pub order_id: i64,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SubmitOrderResponse {
    /// Whether the order is fully synced and linked
    pub synced: bool,
    /// Failure kind when not synced (the order is queued for retry)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationRef>,
}

/// POST /api/sync/orders — first sync attempt for a new order.
///
/// Failures never bounce back to the caller: the order is recorded in
/// the pending queue with the classified error and the retry sweep takes
/// it from there.
pub async fn submit_order(
    State(state): State<ServerState>,
    Json(req): Json<SubmitOrderRequest>,
) -> AppResult<Json<AppResponse<SubmitOrderResponse>>> {
    let payload_text = req.payload.to_string();

    match state.executor.sync_order(req.order_id, &req.payload).await {
        Ok(outcome) => Ok(Json(AppResponse::success(SubmitOrderResponse {
            synced: true,
            failure: None,
            destination: Some(outcome.destination),
        }))),
        Err(failure) => {
            tracing::warn!(
                order_id = req.order_id,
                kind = failure.kind(),
                error = %failure,
                "First sync attempt failed, queueing order"
            );
            pending::record_failure(
                &state.db.pool,
                req.order_id,
                &payload_text,
                &failure.to_string(),
                failure.link_target(),
            )
            .await?;

            Ok(Json(AppResponse::success(SubmitOrderResponse {
                synced: false,
                failure: Some(failure.kind()),
                destination: failure.link_target().cloned(),
            })))
        }
    }
}

/// Linkage diagnostics for one order
#[derive(Debug, Serialize)]
pub struct OrderLinkResponse {
    pub order_id: i64,
    pub status: Option<String>,
    /// Destination linkage from the source order's metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationRef>,
    /// Pending queue entry, when the order is still awaiting sync
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingSyncRow>,
}

/// GET /api/sync/orders/{id} — where does this order stand?
pub async fn get_order_link(
    State(state): State<ServerState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<AppResponse<OrderLinkResponse>>> {
    let source = state
        .source
        .as_ref()
        .ok_or_else(|| AppError::validation("Source API credentials are not configured"))?;

    let order = source.get_order(order_id).await.map_err(|e| match e {
        ApiError::Status { status: 404, .. } => {
            AppError::not_found(format!("Order {order_id} not found in source system"))
        }
        other => AppError::internal(format!("Failed to fetch order {order_id}: {other}")),
    })?;

    let destination = match (
        order.destination_id(),
        order.metadata_value(DESTINATION_NUMBER_KEY),
    ) {
        (Some(id), Some(number)) => Some(DestinationRef {
            id: id.to_string(),
            number: number.to_string(),
        }),
        _ => None,
    };

    let pending = pending::get(&state.db.pool, order_id).await?;

    Ok(Json(AppResponse::success(OrderLinkResponse {
        order_id,
        status: order.status,
        destination,
        pending,
    })))
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub pending: i64,
    pub dead_letter: i64,
}

/// GET /api/sync/status — queue depths for dashboards.
pub async fn get_sync_status(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<SyncStatusResponse>>> {
    let pending = pending::count(&state.db.pool).await?;
    let dead = dead_letter::count(&state.db.pool).await?;
    Ok(Json(AppResponse::success(SyncStatusResponse {
        pending,
        dead_letter: dead,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// GET /api/sync/pending — recently queued orders.
pub async fn list_pending(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<PendingSyncRow>>>> {
    let rows = pending::list_recent(
        &state.db.pool,
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    )
    .await?;
    Ok(Json(AppResponse::success(rows)))
}

/// GET /api/sync/dead-letter — orders requiring manual intervention.
pub async fn list_dead_letter(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<DeadLetterRow>>>> {
    let rows = dead_letter::list_recent(
        &state.db.pool,
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    )
    .await?;
    Ok(Json(AppResponse::success(rows)))
}

/// POST /api/sync/retry — run a retry sweep outside the schedule.
pub async fn trigger_retry(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<SweepSummary>>> {
    let summary = state.retry_sweep.run_sweep().await?;
    tracing::info!(
        selected = summary.selected,
        succeeded = summary.succeeded,
        failed = summary.failed,
        escalated = summary.escalated,
        "Manual retry sweep finished"
    );
    Ok(Json(AppResponse::success(summary)))
}
