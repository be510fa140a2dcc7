//! Movement ledger: append-only record of every stock change

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{DateRange, PaginatedResponse, Pagination, PaginationMeta};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    convert_all, movement_total_cost, summarize_costs, MovementCostTotal, MovementKind, MovementRecord, MovementRow,
    UnitOfMeasure, MOVEMENT_COLUMNS,
};

/// Movement about to be appended; the total cost is derived on insert
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub kind: MovementKind,
    pub material_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub user_id: Uuid,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    pub project_id: Option<Uuid>,
    pub reason: Option<String>,
    pub unit_cost: Decimal,
}

/// Append one movement on the caller's connection or transaction
pub async fn record_movement(conn: &mut PgConnection, movement: NewMovement) -> AppResult<MovementRecord> {
    let total_cost = movement_total_cost(movement.quantity, movement.unit_cost);
    let sql = format!(
        r#"
        INSERT INTO stock_movements (kind, material_id, lot_id, user_id, quantity, unit,
                                     project_id, reason, unit_cost, total_cost)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    );
    let row = sqlx::query_as::<_, MovementRow>(&sql)
        .bind(movement.kind.as_str())
        .bind(movement.material_id)
        .bind(movement.lot_id)
        .bind(movement.user_id)
        .bind(movement.quantity)
        .bind(movement.unit.as_str())
        .bind(movement.project_id)
        .bind(&movement.reason)
        .bind(movement.unit_cost)
        .bind(total_cost)
        .fetch_one(&mut *conn)
        .await?;

    let record = MovementRecord::try_from(row)?;
    tracing::info!(
        movement_id = %record.id,
        kind = %record.kind,
        material_id = %record.material_id,
        quantity = %record.quantity,
        total_cost = %record.total_cost,
        "Movement recorded"
    );
    Ok(record)
}

/// Query filters for the ledger
#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub material_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl MovementFilter {
    fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(default.page),
            per_page: self.per_page.unwrap_or(default.per_page),
        }
    }

    fn date_range(&self) -> AppResult<Option<DateRange>> {
        if self.start_date.is_none() && self.end_date.is_none() {
            return Ok(None);
        }
        let range = DateRange {
            start: self.start_date.unwrap_or_default(),
            end: self
                .end_date
                .or_else(|| NaiveDate::from_ymd_opt(9999, 12, 31))
                .unwrap_or(NaiveDate::MAX),
        };
        if !range.is_valid() {
            return Err(AppError::ValidationError("start_date must not be after end_date".to_string()));
        }
        Ok(Some(range))
    }
}

/// Ledger totals over a period
#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub by_kind: Vec<MovementCostTotal>,
    /// Cost of stock issued (OUT) over the period
    pub consumed_cost: Decimal,
    /// Cost of stock received (IN) over the period
    pub received_cost: Decimal,
}

/// Read side of the movement ledger
#[derive(Clone)]
pub struct MovementService {
    db: PgPool,
}

impl MovementService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List movements, newest first
    pub async fn list_movements(&self, filter: MovementFilter) -> AppResult<PaginatedResponse<MovementRecord>> {
        let pagination = filter.pagination();
        let bounds = filter.date_range()?.map(|r| r.bounds());
        let (from, to) = (bounds.map(|b| b.0), bounds.map(|b| b.1));
        let kind = filter.kind.map(|k| k.as_str());

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR material_id = $1)
              AND ($2::uuid IS NULL OR project_id = $2)
              AND ($3::text IS NULL OR kind = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at < $5)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM stock_movements {}", WHERE))
            .bind(filter.material_id)
            .bind(filter.project_id)
            .bind(kind)
            .bind(from)
            .bind(to)
            .fetch_one(&self.db)
            .await?;

        let sql = format!(
            "SELECT {} FROM stock_movements {} ORDER BY created_at DESC, id LIMIT $6 OFFSET $7",
            MOVEMENT_COLUMNS, WHERE
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(filter.material_id)
            .bind(filter.project_id)
            .bind(kind)
            .bind(from)
            .bind(to)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        Ok(PaginatedResponse {
            data: convert_all(rows)?,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    /// Movements booked against one project, oldest first
    pub async fn list_project_movements(&self, project_id: Uuid) -> AppResult<Vec<MovementRecord>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE project_id = $1 ORDER BY created_at, id",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(project_id)
            .fetch_all(&self.db)
            .await?;
        convert_all(rows)
    }

    pub async fn get_movement(&self, movement_id: Uuid) -> AppResult<MovementRecord> {
        let sql = format!("SELECT {} FROM stock_movements WHERE id = $1", MOVEMENT_COLUMNS);
        sqlx::query_as::<_, MovementRow>(&sql)
            .bind(movement_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Movement"))?
            .try_into()
    }

    /// Per-kind cost totals for a period, derived from the ledger alone
    pub async fn cost_summary(&self, range: DateRange) -> AppResult<CostSummary> {
        if !range.is_valid() {
            return Err(AppError::ValidationError("start_date must not be after end_date".to_string()));
        }
        let (from, to) = range.bounds();
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE created_at >= $1 AND created_at < $2",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.db)
            .await?;
        let movements: Vec<MovementRecord> = convert_all(rows)?;

        let by_kind = summarize_costs(&movements);
        let cost_of = |kind: MovementKind| {
            by_kind
                .iter()
                .find(|t| t.kind == kind)
                .map(|t| t.total_cost)
                .unwrap_or(Decimal::ZERO)
        };
        let consumed_cost = cost_of(MovementKind::Out);
        let received_cost = cost_of(MovementKind::In);

        Ok(CostSummary {
            start_date: range.start,
            end_date: range.end,
            by_kind,
            consumed_cost,
            received_cost,
        })
    }
}
