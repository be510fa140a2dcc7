//! HTTP handlers for the movement ledger

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{DateRange, PaginatedResponse};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::MovementRecord;
use crate::services::movement::{CostSummary, MovementFilter};
use crate::services::MovementService;
use crate::AppState;

/// List movements by material, project, kind and date range
pub async fn list_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<PaginatedResponse<MovementRecord>>> {
    let service = MovementService::new(state.db);
    let movements = service.list_movements(filter).await?;
    Ok(Json(movements))
}

/// Get a single movement
pub async fn get_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<MovementRecord>> {
    let service = MovementService::new(state.db);
    let movement = service.get_movement(movement_id).await?;
    Ok(Json(movement))
}

/// Cost totals per movement kind for `?start=YYYY-MM-DD&end=YYYY-MM-DD`
pub async fn cost_summary(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(range): Query<DateRange>,
) -> AppResult<Json<CostSummary>> {
    let service = MovementService::new(state.db);
    let summary = service.cost_summary(range).await?;
    Ok(Json(summary))
}

/// Movements booked against a project
pub async fn list_project_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<MovementRecord>>> {
    let service = MovementService::new(state.db);
    let movements = service.list_project_movements(project_id).await?;
    Ok(Json(movements))
}
