//! Stock service: lots, allocation and stock-level alerts
//!
//! Plans come from the shared allocation engine; this module only persists
//! them. Every lot write is guarded by the version the plan was computed
//! from, and all writes of one plan share the caller's transaction, so a
//! lost race aborts with `Conflict` and leaves every lot untouched.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::StockConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    classify_stock_level, convert_all, plan_cut, plan_decrement, plan_restore, total_available, touched_lots,
    weighted_average_cost, AllocationOutcome, AllocationPlan, LotChange, LotKind, MaterialRow, MaterialSpec,
    MovementKind, MovementRecord, NewStockLot, RestorePlan, StockLevel, StockLot, StockLotRow, StockTotals,
    LOT_COLUMNS, MATERIAL_COLUMNS,
};
use crate::services::material::{fetch_material, fetch_material_for_update};
use crate::services::movement::{record_movement, NewMovement};

// ============================================================================
// Lot persistence
// ============================================================================

/// Lots of a material that still hold stock (available or reserved)
pub async fn fetch_open_lots(conn: &mut PgConnection, material_id: Uuid) -> AppResult<Vec<StockLot>> {
    let sql = format!(
        "SELECT {} FROM stock_lots WHERE material_id = $1 AND status <> 'consumed' ORDER BY created_at, id",
        LOT_COLUMNS
    );
    let rows = sqlx::query_as::<_, StockLotRow>(&sql)
        .bind(material_id)
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

async fn fetch_lot(conn: &mut PgConnection, lot_id: Uuid) -> AppResult<StockLot> {
    let sql = format!("SELECT {} FROM stock_lots WHERE id = $1", LOT_COLUMNS);
    sqlx::query_as::<_, StockLotRow>(&sql)
        .bind(lot_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Lot"))?
        .try_into()
}

/// Write a planned lot state if nobody changed the lot since it was read
async fn apply_change(conn: &mut PgConnection, change: &LotChange) -> AppResult<()> {
    let lot = &change.lot;
    let result = sqlx::query(
        r#"
        UPDATE stock_lots
        SET count = $1, weight_kg = $2, status = $3, version = $4, updated_at = NOW()
        WHERE id = $5 AND version = $6
        "#,
    )
    .bind(lot.count)
    .bind(lot.weight_kg)
    .bind(lot.status.as_str())
    .bind(lot.version)
    .bind(lot.id)
    .bind(change.expected_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(lot_id = %lot.id, expected_version = change.expected_version, "Stock lot version conflict");
        return Err(AppError::lot_conflict(lot.id));
    }
    Ok(())
}

async fn insert_lot(conn: &mut PgConnection, lot: &NewStockLot) -> AppResult<StockLot> {
    let sql = format!(
        r#"
        INSERT INTO stock_lots (material_id, kind, count, length_mm, weight_kg, status, notes)
        VALUES ($1, $2, $3, $4, $5, 'available', $6)
        RETURNING {}
        "#,
        LOT_COLUMNS
    );
    sqlx::query_as::<_, StockLotRow>(&sql)
        .bind(lot.material_id)
        .bind(lot.kind.as_str())
        .bind(lot.count)
        .bind(lot.length_mm)
        .bind(lot.weight_kg)
        .bind(&lot.notes)
        .fetch_one(&mut *conn)
        .await?
        .try_into()
}

// ============================================================================
// Allocation
// ============================================================================

/// Consume `requested` units of `material` from its lots.
///
/// Either every planned lot write lands or the call fails; the caller owns
/// the transaction.
pub async fn decrement(
    conn: &mut PgConnection,
    material: &MaterialSpec,
    requested: Decimal,
    tolerance_percent: Decimal,
) -> AppResult<AllocationPlan> {
    let lots = fetch_open_lots(&mut *conn, material.id).await?;
    let plan = plan_decrement(material, &lots, requested, tolerance_percent)?;

    tracing::debug!(
        material_id = %material.id,
        requested = %requested,
        lots = ?touched_lots(&plan),
        "Allocation plan"
    );
    for change in &plan.changes {
        apply_change(&mut *conn, change).await?;
    }

    if !plan.outcome.satisfied {
        tracing::warn!(
            material_id = %material.id,
            requested = %plan.outcome.requested,
            shortfall = %plan.outcome.shortfall,
            "Request served within tolerance with a shortfall"
        );
    }
    Ok(plan)
}

/// Return `quantity` units of `material` to stock and give back the lot it landed in
pub async fn restore(conn: &mut PgConnection, material: &MaterialSpec, quantity: Decimal) -> AppResult<StockLot> {
    let lots = fetch_open_lots(&mut *conn, material.id).await?;
    match plan_restore(material, &lots, quantity)? {
        RestorePlan::Increment(change) => {
            apply_change(&mut *conn, &change).await?;
            tracing::debug!(lot_id = %change.lot.id, quantity = %quantity, "Stock restored into existing lot");
            Ok(change.lot)
        }
        RestorePlan::Create(new_lot) => {
            let lot = insert_lot(&mut *conn, &new_lot).await?;
            tracing::debug!(lot_id = %lot.id, quantity = %quantity, "Stock restored into new lot");
            Ok(lot)
        }
    }
}

/// Lot id to put on a movement: set only when exactly one lot was touched
pub fn single_lot(plan: &AllocationPlan) -> Option<Uuid> {
    match plan.changes.as_slice() {
        [only] => Some(only.lot.id),
        _ => None,
    }
}

// ============================================================================
// Inputs and results
// ============================================================================

/// Input for receiving stock
#[derive(Debug, Deserialize, Validate)]
pub struct ReceiveStockInput {
    pub material_id: Uuid,
    pub kind: LotKind,
    pub count: Decimal,
    pub length_mm: Option<Decimal>,
    /// Only used when the weight cannot be derived from length
    pub weight_kg: Option<Decimal>,
    /// Purchase price per material unit
    pub unit_price: Option<Decimal>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptResult {
    pub lot: StockLot,
    pub movement: MovementRecord,
    pub average_cost: Decimal,
}

/// Input for issuing stock outside of a project
#[derive(Debug, Deserialize, Validate)]
pub struct IssueStockInput {
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub unit: crate::models::UnitOfMeasure,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueResult {
    pub outcome: AllocationOutcome,
    pub movement: MovementRecord,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CutLotInput {
    pub cut_length_mm: Decimal,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CutResult {
    pub source: StockLot,
    pub offcut: Option<StockLot>,
    pub movement: MovementRecord,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustLotInput {
    pub new_count: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustResult {
    pub lot: StockLot,
    /// Absent when the count did not change
    pub movement: Option<MovementRecord>,
}

/// A material at or below one of its reorder thresholds
#[derive(Debug, Clone, Serialize)]
pub struct LowStockItem {
    pub material_id: Uuid,
    pub code: String,
    pub name: String,
    pub level: StockLevel,
    pub totals: StockTotals,
    pub min_stock: Decimal,
    pub safety_stock: Decimal,
    /// True when this report raised a new alert for the material
    pub alerted: bool,
}

// ============================================================================
// Service
// ============================================================================

/// Stock service for lots, receipts, cuts, adjustments and alerts
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    settings: StockConfig,
}

impl StockService {
    pub fn new(db: PgPool, settings: StockConfig) -> Self {
        Self { db, settings }
    }

    /// Aggregate of the available lots of a material
    pub async fn total_available_stock(&self, material_id: Uuid) -> AppResult<StockTotals> {
        let mut conn = self.db.acquire().await?;
        let material = fetch_material(&mut *conn, material_id).await?;
        let lots = fetch_open_lots(&mut *conn, material_id).await?;
        Ok(total_available(&lots, material.unit))
    }

    /// Lots of a material, consumed ones only on request
    pub async fn list_lots(&self, material_id: Uuid, include_consumed: bool) -> AppResult<Vec<StockLot>> {
        let mut conn = self.db.acquire().await?;
        fetch_material(&mut *conn, material_id).await?;
        if !include_consumed {
            return fetch_open_lots(&mut *conn, material_id).await;
        }
        let sql = format!(
            "SELECT {} FROM stock_lots WHERE material_id = $1 ORDER BY created_at, id",
            LOT_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockLotRow>(&sql)
            .bind(material_id)
            .fetch_all(&mut *conn)
            .await?;
        convert_all(rows)
    }

    pub async fn get_lot(&self, lot_id: Uuid) -> AppResult<StockLot> {
        let mut conn = self.db.acquire().await?;
        fetch_lot(&mut *conn, lot_id).await
    }

    /// Receive new stock: create the lot, book the IN movement and roll the
    /// weighted-average cost forward when a price is given
    pub async fn receive_stock(&self, user_id: Uuid, input: ReceiveStockInput) -> AppResult<ReceiptResult> {
        input.validate()?;
        if let Some(price) = input.unit_price {
            shared::validate_amount(price).map_err(|m| AppError::Validation {
                field: "unit_price".to_string(),
                message: m.to_string(),
            })?;
        }

        let mut tx = self.db.begin().await?;
        let material = fetch_material_for_update(&mut *tx, input.material_id).await?;

        let mut new_lot = NewStockLot::receive(&material, input.kind, input.count, input.length_mm, input.weight_kg)?;
        new_lot.notes = input.notes.clone();
        let quantity = new_lot.quantity(material.unit);

        let unit_cost = match input.unit_price {
            Some(price) => price,
            None if material.cost_snapshot() > Decimal::ZERO => material.cost_snapshot(),
            None => self.settings.default_unit_price,
        };

        let mut average_cost = material.average_cost;
        if input.unit_price.is_some() {
            let on_hand = total_available(&fetch_open_lots(&mut *tx, material.id).await?, material.unit).quantity;
            average_cost = weighted_average_cost(on_hand, material.cost_snapshot(), quantity, unit_cost);
            sqlx::query("UPDATE materials SET unit_price = $1, average_cost = $2, updated_at = NOW() WHERE id = $3")
                .bind(unit_cost)
                .bind(average_cost)
                .bind(material.id)
                .execute(&mut *tx)
                .await?;
        }

        let lot = insert_lot(&mut *tx, &new_lot).await?;
        let movement = record_movement(
            &mut *tx,
            NewMovement {
                kind: MovementKind::In,
                material_id: material.id,
                lot_id: Some(lot.id),
                user_id,
                quantity,
                unit: material.unit,
                project_id: None,
                reason: Some("receipt".to_string()),
                unit_cost,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            lot_id = %lot.id,
            material_id = %material.id,
            quantity = %quantity,
            average_cost = %average_cost,
            "Stock received"
        );
        Ok(ReceiptResult {
            lot,
            movement,
            average_cost,
        })
    }

    /// Issue stock without a project (scrap, sale, sample)
    pub async fn issue_stock(&self, user_id: Uuid, input: IssueStockInput) -> AppResult<IssueResult> {
        input.validate()?;
        let mut tx = self.db.begin().await?;
        let material = fetch_material(&mut *tx, input.material_id).await?;
        material.ensure_unit(input.unit)?;

        let plan = decrement(&mut *tx, &material, input.quantity, self.settings.tolerance_percent).await?;
        let movement = record_movement(
            &mut *tx,
            NewMovement {
                kind: MovementKind::Out,
                material_id: material.id,
                lot_id: single_lot(&plan),
                user_id,
                quantity: -plan.outcome.booked_quantity(),
                unit: material.unit,
                project_id: None,
                reason: Some(input.reason),
                unit_cost: material.cost_snapshot(),
            },
        )
        .await?;
        tx.commit().await?;

        Ok(IssueResult {
            outcome: plan.outcome,
            movement,
        })
    }

    /// Cut one piece of a lot; the remainder becomes a new offcut lot
    pub async fn cut_lot(&self, user_id: Uuid, lot_id: Uuid, input: CutLotInput) -> AppResult<CutResult> {
        input.validate()?;
        let mut tx = self.db.begin().await?;
        let lot = fetch_lot(&mut *tx, lot_id).await?;
        let material = fetch_material(&mut *tx, lot.material_id).await?;

        let plan = plan_cut(&material, &lot, input.cut_length_mm)?;
        apply_change(&mut *tx, &plan.source).await?;
        let offcut = match &plan.offcut {
            Some(new_lot) => Some(insert_lot(&mut *tx, new_lot).await?),
            None => None,
        };

        let reason = input
            .reason
            .unwrap_or_else(|| format!("cut {} mm", input.cut_length_mm));
        let movement = record_movement(
            &mut *tx,
            NewMovement {
                kind: MovementKind::Cut,
                material_id: material.id,
                lot_id: Some(lot.id),
                user_id,
                quantity: plan.quantity_delta,
                unit: material.unit,
                project_id: None,
                reason: Some(reason),
                unit_cost: material.cost_snapshot(),
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            lot_id = %lot.id,
            offcut_id = ?offcut.as_ref().map(|o| o.id),
            cut_length_mm = %input.cut_length_mm,
            "Lot cut"
        );
        Ok(CutResult {
            source: plan.source.lot,
            offcut,
            movement,
        })
    }

    /// Stock-take correction of a lot's piece count
    pub async fn adjust_lot(&self, user_id: Uuid, lot_id: Uuid, input: AdjustLotInput) -> AppResult<AdjustResult> {
        input.validate()?;
        let mut tx = self.db.begin().await?;
        let lot = fetch_lot(&mut *tx, lot_id).await?;
        let material = fetch_material(&mut *tx, lot.material_id).await?;

        let mut updated = lot.clone();
        let delta = updated.set_count(input.new_count, material.unit, material.effective_weight_per_meter()?)?;
        if delta.is_zero() {
            return Ok(AdjustResult {
                lot,
                movement: None,
            });
        }

        apply_change(
            &mut *tx,
            &LotChange {
                expected_version: lot.version,
                deducted: -delta,
                lot: updated.clone(),
            },
        )
        .await?;
        let movement = record_movement(
            &mut *tx,
            NewMovement {
                kind: MovementKind::Adjust,
                material_id: material.id,
                lot_id: Some(lot.id),
                user_id,
                quantity: delta,
                unit: material.unit,
                project_id: None,
                reason: Some(input.reason),
                unit_cost: material.cost_snapshot(),
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(lot_id = %lot.id, delta = %delta, status = %updated.status.as_str(), "Lot adjusted");
        Ok(AdjustResult {
            lot: updated,
            movement: Some(movement),
        })
    }

    /// Materials at or below their thresholds.
    ///
    /// A material raises a new alert at most once per `alert_dedup_hours`;
    /// the report still lists it in between.
    pub async fn low_stock_report(&self) -> AppResult<Vec<LowStockItem>> {
        let sql = format!(
            "SELECT {} FROM materials WHERE min_stock > 0 OR safety_stock > 0 ORDER BY code",
            MATERIAL_COLUMNS
        );
        let rows = sqlx::query_as::<_, MaterialRow>(&sql).fetch_all(&self.db).await?;
        let materials: Vec<MaterialSpec> = convert_all(rows)?;

        let cutoff = Utc::now() - Duration::hours(self.settings.alert_dedup_hours);
        let mut conn = self.db.acquire().await?;
        let mut report = Vec::new();

        for material in materials {
            let lots = fetch_open_lots(&mut *conn, material.id).await?;
            let totals = total_available(&lots, material.unit);
            let level = classify_stock_level(totals.quantity, material.min_stock, material.safety_stock);
            if level == StockLevel::Ok {
                continue;
            }

            let alerted = material.last_alerted_at.map_or(true, |at| at < cutoff);
            if alerted {
                sqlx::query("UPDATE materials SET last_alerted_at = NOW() WHERE id = $1")
                    .bind(material.id)
                    .execute(&mut *conn)
                    .await?;
                tracing::warn!(
                    material_id = %material.id,
                    code = %material.code,
                    level = level.as_str(),
                    available = %totals.quantity,
                    "Low stock alert"
                );
            }

            report.push(LowStockItem {
                material_id: material.id,
                code: material.code,
                name: material.name,
                level,
                totals,
                min_stock: material.min_stock,
                safety_stock: material.safety_stock,
                alerted,
            });
        }

        // Critical first
        report.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.code.cmp(&b.code)));
        Ok(report)
    }
}
