//! Database rows for the Metal Stock server
//!
//! Enums are stored as text; rows convert into the shared models, failing
//! on values the schema should never hold.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

pub use shared::allocation::*;
pub use shared::models::*;

use crate::error::{AppError, AppResult};

fn corrupt(column: &str, value: &str) -> AppError {
    AppError::Internal(format!("Unexpected {} value in database: {}", column, value))
}

fn parse_unit(value: &str) -> AppResult<UnitOfMeasure> {
    UnitOfMeasure::from_str(value).ok_or_else(|| corrupt("unit", value))
}

// ============================================================================
// Materials
// ============================================================================

/// Column list matching [`MaterialRow`]
pub const MATERIAL_COLUMNS: &str = "id, code, name, shape, diameter_mm, width_mm, height_mm, wall_thickness_mm, \
     density, weight_per_meter, unit, standard_length_mm, min_stock, safety_stock, unit_price, \
     average_cost, last_alerted_at, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct MaterialRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub shape: String,
    pub diameter_mm: Option<Decimal>,
    pub width_mm: Option<Decimal>,
    pub height_mm: Option<Decimal>,
    pub wall_thickness_mm: Option<Decimal>,
    pub density: Decimal,
    pub weight_per_meter: Option<Decimal>,
    pub unit: String,
    pub standard_length_mm: Option<Decimal>,
    pub min_stock: Decimal,
    pub safety_stock: Decimal,
    pub unit_price: Decimal,
    pub average_cost: Decimal,
    pub last_alerted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MaterialRow> for MaterialSpec {
    type Error = AppError;

    fn try_from(row: MaterialRow) -> AppResult<Self> {
        Ok(MaterialSpec {
            id: row.id,
            code: row.code,
            name: row.name,
            shape: row.shape.parse().map_err(|_| corrupt("shape", &row.shape))?,
            dimensions: Dimensions {
                diameter_mm: row.diameter_mm,
                width_mm: row.width_mm,
                height_mm: row.height_mm,
                wall_thickness_mm: row.wall_thickness_mm,
            },
            density: row.density,
            weight_per_meter: row.weight_per_meter,
            unit: parse_unit(&row.unit)?,
            standard_length_mm: row.standard_length_mm,
            min_stock: row.min_stock,
            safety_stock: row.safety_stock,
            unit_price: row.unit_price,
            average_cost: row.average_cost,
            last_alerted_at: row.last_alerted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Stock lots
// ============================================================================

pub const LOT_COLUMNS: &str =
    "id, material_id, kind, count, length_mm, weight_kg, status, version, notes, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct StockLotRow {
    pub id: Uuid,
    pub material_id: Uuid,
    pub kind: String,
    pub count: Decimal,
    pub length_mm: Option<Decimal>,
    pub weight_kg: Decimal,
    pub status: String,
    pub version: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<StockLotRow> for StockLot {
    type Error = AppError;

    fn try_from(row: StockLotRow) -> AppResult<Self> {
        Ok(StockLot {
            id: row.id,
            material_id: row.material_id,
            kind: LotKind::from_str(&row.kind).ok_or_else(|| corrupt("lot kind", &row.kind))?,
            count: row.count,
            length_mm: row.length_mm,
            weight_kg: row.weight_kg,
            status: LotStatus::from_str(&row.status).ok_or_else(|| corrupt("lot status", &row.status))?,
            version: row.version,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Movements
// ============================================================================

pub const MOVEMENT_COLUMNS: &str =
    "id, kind, material_id, lot_id, user_id, quantity, unit, project_id, reason, unit_cost, total_cost, created_at";

#[derive(Debug, FromRow)]
pub struct MovementRow {
    pub id: Uuid,
    pub kind: String,
    pub material_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub user_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
    pub project_id: Option<Uuid>,
    pub reason: Option<String>,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for MovementRecord {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        Ok(MovementRecord {
            id: row.id,
            kind: MovementKind::from_str(&row.kind).ok_or_else(|| corrupt("movement kind", &row.kind))?,
            material_id: row.material_id,
            lot_id: row.lot_id,
            user_id: row.user_id,
            quantity: row.quantity,
            unit: parse_unit(&row.unit)?,
            project_id: row.project_id,
            reason: row.reason,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Projects
// ============================================================================

pub const PROJECT_COLUMNS: &str = "id, code, name, customer_name, status, start_date, actual_end_date, \
     materials_cost, labor_cost, other_cost, total_cost, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub customer_name: Option<String>,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    pub materials_cost: Decimal,
    pub labor_cost: Decimal,
    pub other_cost: Decimal,
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(row: ProjectRow) -> AppResult<Self> {
        Ok(Project {
            id: row.id,
            code: row.code,
            name: row.name,
            customer_name: row.customer_name,
            status: ProjectStatus::from_str(&row.status).ok_or_else(|| corrupt("project status", &row.status))?,
            start_date: row.start_date,
            actual_end_date: row.actual_end_date,
            costs: ProjectCosts {
                materials: row.materials_cost,
                labor: row.labor_cost,
                other: row.other_cost,
                total: row.total_cost,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub const USAGE_COLUMNS: &str =
    "id, project_id, material_id, quantity, unit, unit_cost, total_cost, movement_id, created_at";

#[derive(Debug, FromRow)]
pub struct MaterialUsageRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub movement_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MaterialUsageRow> for MaterialUsage {
    type Error = AppError;

    fn try_from(row: MaterialUsageRow) -> AppResult<Self> {
        Ok(MaterialUsage {
            id: row.id,
            project_id: row.project_id,
            material_id: row.material_id,
            quantity: row.quantity,
            unit: parse_unit(&row.unit)?,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
            movement_id: row.movement_id,
            created_at: row.created_at,
        })
    }
}

pub const LABOR_COLUMNS: &str =
    "id, project_id, worker_name, description, hours, hourly_rate, total_cost, work_date, created_at";

#[derive(Debug, FromRow)]
pub struct LaborEntryRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub worker_name: String,
    pub description: Option<String>,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    pub total_cost: Decimal,
    pub work_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LaborEntryRow> for LaborEntry {
    type Error = AppError;

    fn try_from(row: LaborEntryRow) -> AppResult<Self> {
        Ok(LaborEntry {
            id: row.id,
            project_id: row.project_id,
            worker_name: row.worker_name,
            description: row.description,
            hours: row.hours,
            hourly_rate: row.hourly_rate,
            total_cost: row.total_cost,
            work_date: row.work_date,
            created_at: row.created_at,
        })
    }
}

pub const OTHER_COST_COLUMNS: &str = "id, project_id, description, amount, created_at";

#[derive(Debug, FromRow)]
pub struct OtherCostRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OtherCostRow> for OtherCostEntry {
    type Error = AppError;

    fn try_from(row: OtherCostRow) -> AppResult<Self> {
        Ok(OtherCostEntry {
            id: row.id,
            project_id: row.project_id,
            description: row.description,
            amount: row.amount,
            created_at: row.created_at,
        })
    }
}

/// Convert a batch of rows, stopping at the first bad one
pub fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}
