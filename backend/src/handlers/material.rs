//! HTTP handlers for the material catalog and the weight calculator

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::geometry;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::models::{Dimensions, MaterialSpec, Shape, StockLot};
use crate::services::material::{CatalogRowInput, CreateMaterialInput, MaterialStock};
use crate::services::{MaterialService, StockService};
use crate::AppState;

/// Create a catalog entry
pub async fn create_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateMaterialInput>,
) -> AppResult<Json<MaterialSpec>> {
    require_permission(&current_user.0, "materials", "write")?;
    let service = MaterialService::new(state.db);
    let material = service.create_material(input).await?;
    Ok(Json(material))
}

/// Import catalog rows, upserting by code
pub async fn import_catalog(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(rows): Json<Vec<CatalogRowInput>>,
) -> AppResult<Json<Vec<MaterialSpec>>> {
    require_permission(&current_user.0, "materials", "import")?;
    let service = MaterialService::new(state.db);
    let mut imported = Vec::with_capacity(rows.len());
    for row in rows {
        imported.push(service.import_catalog_row(row).await?);
    }
    tracing::info!(count = imported.len(), "Catalog import finished");
    Ok(Json(imported))
}

/// List the catalog
pub async fn list_materials(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<MaterialSpec>>> {
    let service = MaterialService::new(state.db);
    let materials = service.list_materials().await?;
    Ok(Json(materials))
}

/// Get a catalog entry
pub async fn get_material(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<MaterialSpec>> {
    let service = MaterialService::new(state.db);
    let material = service.get_material(material_id).await?;
    Ok(Json(material))
}

/// Get a catalog entry with its stock totals and level
pub async fn get_material_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<MaterialStock>> {
    let service = MaterialService::new(state.db);
    let stock = service.get_material_stock(material_id).await?;
    Ok(Json(stock))
}

#[derive(Debug, Deserialize)]
pub struct LotListQuery {
    #[serde(default)]
    pub include_consumed: bool,
}

/// List the lots of a material
pub async fn list_material_lots(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
    Query(query): Query<LotListQuery>,
) -> AppResult<Json<Vec<StockLot>>> {
    let service = StockService::new(state.db, state.config.stock.clone());
    let lots = service.list_lots(material_id, query.include_consumed).await?;
    Ok(Json(lots))
}

// ============================================================================
// Weight calculator
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WeightRequest {
    pub shape: Shape,
    pub dimensions: Dimensions,
    pub length_mm: Decimal,
    pub density: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WeightResponse {
    pub weight_kg: Decimal,
    pub weight_per_meter: Decimal,
}

/// Mass of a bar from its profile, length and density
pub async fn calculate_weight(Json(req): Json<WeightRequest>) -> AppResult<Json<WeightResponse>> {
    let weight_kg = geometry::weight(req.shape, &req.dimensions, req.length_mm, req.density)?;
    let weight_per_meter = geometry::weight_per_meter(req.shape, &req.dimensions, req.density)?;
    Ok(Json(WeightResponse {
        weight_kg,
        weight_per_meter,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LengthRequest {
    pub shape: Shape,
    pub dimensions: Dimensions,
    pub weight_kg: Decimal,
    pub density: Decimal,
}

#[derive(Debug, Serialize)]
pub struct LengthResponse {
    pub length_mm: Decimal,
}

/// Length of round bar that weighs the given mass
pub async fn calculate_length(Json(req): Json<LengthRequest>) -> AppResult<Json<LengthResponse>> {
    let length_mm = geometry::length_for_weight_of(req.shape, &req.dimensions, req.weight_kg, req.density)?;
    Ok(Json(LengthResponse { length_mm }))
}
