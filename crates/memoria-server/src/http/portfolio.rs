use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use memoria_core::MemoriaError;
use memoria_stores::types::PortfolioHolding;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

/// GET /v1/portfolio/summary?user_id — all holdings plus their total value
/// at last-recorded price.
pub async fn summary_handler(State(state): State<Arc<AppState>>, Query(q): Query<UserIdQuery>) -> ApiResult<Json<Value>> {
    let holdings = state
        .stores
        .with_conn(|conn| memoria_stores::relational::list_holdings(conn, &q.user_id))
        .map_err(MemoriaError::from)?;
    let total_value: f64 = holdings.iter().map(|h| h.shares * h.avg_price).sum();

    Ok(Json(json!({ "status": "success", "holdings": holdings, "total_value": total_value })))
}

/// GET /v1/portfolio/holding/{ticker}?user_id
pub async fn get_holding_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<Value>> {
    let holding = state
        .stores
        .with_conn(|conn| memoria_stores::relational::get_holding(conn, &q.user_id, &ticker))
        .map_err(MemoriaError::from)?;

    match holding {
        Some(h) => Ok(Json(json!({ "status": "success", "holding": h }))),
        None => Err(MemoriaError::NotFound(format!("no holding {ticker} for user {}", q.user_id)).into()),
    }
}

#[derive(Deserialize)]
pub struct UpsertHoldingRequest {
    pub user_id: String,
    pub shares: f64,
    pub avg_price: f64,
    #[serde(default)]
    pub asset_name: Option<String>,
}

/// POST /v1/portfolio/holding/{ticker} — create.
pub async fn create_holding_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Json(req): Json<UpsertHoldingRequest>,
) -> ApiResult<Json<Value>> {
    upsert(&state, ticker, req).await
}

/// PUT /v1/portfolio/holding/{ticker} — update. Same upsert semantics as
/// create: the relational layer keys on `(user_id, ticker)`, so there is no
/// meaningful distinction between "create" and "replace" here.
pub async fn update_holding_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Json(req): Json<UpsertHoldingRequest>,
) -> ApiResult<Json<Value>> {
    upsert(&state, ticker, req).await
}

async fn upsert(state: &AppState, ticker: String, req: UpsertHoldingRequest) -> ApiResult<Json<Value>> {
    let now = memoria_core::now_iso();
    let holding = PortfolioHolding {
        user_id: req.user_id,
        ticker,
        shares: req.shares,
        avg_price: req.avg_price,
        asset_name: req.asset_name,
        created_at: now.clone(),
        updated_at: now,
    };
    state
        .stores
        .with_conn(|conn| memoria_stores::relational::upsert_holding(conn, &holding))
        .map_err(MemoriaError::from)?;
    Ok(Json(json!({ "status": "success", "holding": holding })))
}

/// DELETE /v1/portfolio/holding/{ticker}?user_id
pub async fn delete_holding_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<Value>> {
    let deleted = state
        .stores
        .with_conn(|conn| memoria_stores::relational::delete_holding(conn, &q.user_id, &ticker))
        .map_err(MemoriaError::from)?;

    if deleted {
        Ok(Json(json!({ "status": "success" })))
    } else {
        Err(MemoriaError::NotFound(format!("no holding {ticker} for user {}", q.user_id)).into())
    }
}
