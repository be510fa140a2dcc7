//! HTTP handlers for stock lots

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::models::{StockLot, StockTotals};
use crate::services::stock::{
    AdjustLotInput, AdjustResult, CutLotInput, CutResult, IssueResult, IssueStockInput, LowStockItem, ReceiptResult,
    ReceiveStockInput,
};
use crate::services::StockService;
use crate::AppState;

fn service(state: AppState) -> StockService {
    StockService::new(state.db, state.config.stock.clone())
}

/// Receive stock into a new lot
pub async fn receive_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ReceiveStockInput>,
) -> AppResult<Json<ReceiptResult>> {
    require_permission(&current_user.0, "stock", "write")?;
    let receipt = service(state).receive_stock(current_user.0.user_id, input).await?;
    Ok(Json(receipt))
}

/// Issue stock outside of a project
pub async fn issue_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<IssueStockInput>,
) -> AppResult<Json<IssueResult>> {
    require_permission(&current_user.0, "stock", "write")?;
    let result = service(state).issue_stock(current_user.0.user_id, input).await?;
    Ok(Json(result))
}

/// Get a stock lot
pub async fn get_lot(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<StockLot>> {
    let lot = service(state).get_lot(lot_id).await?;
    Ok(Json(lot))
}

/// Cut a piece off a lot
pub async fn cut_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<CutLotInput>,
) -> AppResult<Json<CutResult>> {
    require_permission(&current_user.0, "stock", "write")?;
    let result = service(state).cut_lot(current_user.0.user_id, lot_id, input).await?;
    Ok(Json(result))
}

/// Correct a lot's count after a stock take
pub async fn adjust_lot(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lot_id): Path<Uuid>,
    Json(input): Json<AdjustLotInput>,
) -> AppResult<Json<AdjustResult>> {
    require_permission(&current_user.0, "stock", "adjust")?;
    let result = service(state).adjust_lot(current_user.0.user_id, lot_id, input).await?;
    Ok(Json(result))
}

/// Materials at or below their reorder thresholds
pub async fn low_stock_report(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<LowStockItem>>> {
    let report = service(state).low_stock_report().await?;
    Ok(Json(report))
}

/// Available totals of one material, as read by the stock-alert checker
pub async fn get_stock_totals(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<StockTotals>> {
    let totals = service(state).total_available_stock(material_id).await?;
    Ok(Json(totals))
}
