//! Project costing service
//!
//! Every change to a project's usages, labor or other costs happens in one
//! transaction that ends by rebuilding the project's cost columns from its
//! child rows.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::StockConfig;
use crate::error::{unique_violation, AppError, AppResult};
use crate::models::{
    apply_status_change, convert_all, labor_cost, movement_total_cost, AllocationOutcome, LaborEntry, LaborEntryRow,
    MaterialUsage, MaterialUsageRow, MovementKind, OtherCostEntry, OtherCostRow, Project, ProjectCosts, ProjectRow,
    ProjectStatus, UnitOfMeasure, LABOR_COLUMNS, OTHER_COST_COLUMNS, PROJECT_COLUMNS, USAGE_COLUMNS,
};
use crate::services::material::fetch_material;
use crate::services::movement::{record_movement, NewMovement};
use crate::services::stock::{decrement, restore, single_lot};

// ============================================================================
// Inputs and results
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectInput {
    #[validate(length(min = 3, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusInput {
    pub status: ProjectStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMaterialInput {
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddMaterialResult {
    pub usage: MaterialUsage,
    pub outcome: AllocationOutcome,
    pub costs: ProjectCosts,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddLaborInput {
    #[validate(length(min = 1, max = 200))]
    pub worker_name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    pub work_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddOtherCostInput {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub amount: Decimal,
}

/// Project with every child row that feeds its costs
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: Project,
    pub materials: Vec<MaterialUsage>,
    pub labor: Vec<LaborEntry>,
    pub other_costs: Vec<OtherCostEntry>,
}

// ============================================================================
// Persistence helpers
// ============================================================================

async fn fetch_project(conn: &mut PgConnection, project_id: Uuid, for_update: bool) -> AppResult<Project> {
    let sql = format!(
        "SELECT {} FROM projects WHERE id = $1{}",
        PROJECT_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(project_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Project"))?
        .try_into()
}

async fn fetch_usages(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Vec<MaterialUsage>> {
    let sql = format!(
        "SELECT {} FROM project_material_usages WHERE project_id = $1 ORDER BY created_at, id",
        USAGE_COLUMNS
    );
    let rows = sqlx::query_as::<_, MaterialUsageRow>(&sql)
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

async fn fetch_labor(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Vec<LaborEntry>> {
    let sql = format!(
        "SELECT {} FROM project_labor_entries WHERE project_id = $1 ORDER BY work_date, created_at, id",
        LABOR_COLUMNS
    );
    let rows = sqlx::query_as::<_, LaborEntryRow>(&sql)
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

async fn fetch_other_costs(conn: &mut PgConnection, project_id: Uuid) -> AppResult<Vec<OtherCostEntry>> {
    let sql = format!(
        "SELECT {} FROM project_other_costs WHERE project_id = $1 ORDER BY created_at, id",
        OTHER_COST_COLUMNS
    );
    let rows = sqlx::query_as::<_, OtherCostRow>(&sql)
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;
    convert_all(rows)
}

/// Rebuild the cost columns from the child rows
async fn recompute_costs(conn: &mut PgConnection, project_id: Uuid) -> AppResult<ProjectCosts> {
    let usages = fetch_usages(&mut *conn, project_id).await?;
    let labor = fetch_labor(&mut *conn, project_id).await?;
    let other = fetch_other_costs(&mut *conn, project_id).await?;
    let costs = ProjectCosts::recompute(&usages, &labor, &other);

    sqlx::query(
        r#"
        UPDATE projects
        SET materials_cost = $1, labor_cost = $2, other_cost = $3, total_cost = $4, updated_at = NOW()
        WHERE id = $5
        "#,
    )
    .bind(costs.materials)
    .bind(costs.labor)
    .bind(costs.other)
    .bind(costs.total)
    .bind(project_id)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(project_id = %project_id, total = %costs.total, "Project costs recomputed");
    Ok(costs)
}

// ============================================================================
// Service
// ============================================================================

/// Project costing service
#[derive(Clone)]
pub struct ProjectService {
    db: PgPool,
    settings: StockConfig,
}

impl ProjectService {
    pub fn new(db: PgPool, settings: StockConfig) -> Self {
        Self { db, settings }
    }

    pub async fn create_project(&self, input: CreateProjectInput) -> AppResult<Project> {
        input.validate()?;
        shared::validate_project_code(&input.code).map_err(|m| AppError::Validation {
            field: "code".to_string(),
            message: m.to_string(),
        })?;

        let sql = format!(
            r#"
            INSERT INTO projects (code, name, customer_name, status, start_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        );
        let project: Project = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(&input.code)
            .bind(&input.name)
            .bind(&input.customer_name)
            .bind(ProjectStatus::Draft.as_str())
            .bind(input.start_date)
            .fetch_one(&self.db)
            .await
            .map_err(unique_violation("code"))?
            .try_into()?;

        tracing::info!(project_id = %project.id, code = %project.code, "Project created");
        Ok(project)
    }

    pub async fn list_projects(&self, status: Option<ProjectStatus>) -> AppResult<Vec<Project>> {
        let sql = format!(
            "SELECT {} FROM projects WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC",
            PROJECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;
        convert_all(rows)
    }

    /// Project with its usages, labor and other costs
    pub async fn get_project(&self, project_id: Uuid) -> AppResult<ProjectDetail> {
        let mut conn = self.db.acquire().await?;
        let project = fetch_project(&mut *conn, project_id, false).await?;
        Ok(ProjectDetail {
            project,
            materials: fetch_usages(&mut *conn, project_id).await?,
            labor: fetch_labor(&mut *conn, project_id).await?,
            other_costs: fetch_other_costs(&mut *conn, project_id).await?,
        })
    }

    /// Move a project through its lifecycle
    pub async fn change_status(&self, project_id: Uuid, status: ProjectStatus) -> AppResult<Project> {
        let mut tx = self.db.begin().await?;
        let project = fetch_project(&mut *tx, project_id, true).await?;
        let change = apply_status_change(
            project.status,
            project.actual_end_date,
            status,
            Utc::now().date_naive(),
        )?;
        if change.status == project.status && change.actual_end_date == project.actual_end_date {
            return Ok(project);
        }

        let sql = format!(
            r#"
            UPDATE projects SET status = $1, actual_end_date = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        );
        let updated: Project = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(change.status.as_str())
            .bind(change.actual_end_date)
            .bind(project_id)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;
        tx.commit().await?;

        tracing::info!(
            project_id = %project_id,
            from = %project.status,
            to = %updated.status,
            "Project status changed"
        );
        Ok(updated)
    }

    /// Consume stock for a project: allocate lots, book the OUT movement,
    /// record the usage and rebuild the project costs, all or nothing
    pub async fn add_material(&self, user_id: Uuid, project_id: Uuid, input: AddMaterialInput) -> AppResult<AddMaterialResult> {
        input.validate()?;
        let mut tx = self.db.begin().await?;
        let project = fetch_project(&mut *tx, project_id, true).await?;
        project.status.ensure_accepts_additions()?;

        let material = fetch_material(&mut *tx, input.material_id).await?;
        material.ensure_unit(input.unit)?;
        let unit_cost = material.cost_snapshot();

        let plan = decrement(&mut *tx, &material, input.quantity, self.settings.tolerance_percent).await?;
        let issued = plan.outcome.booked_quantity();
        let movement = record_movement(
            &mut *tx,
            NewMovement {
                kind: MovementKind::Out,
                material_id: material.id,
                lot_id: single_lot(&plan),
                user_id,
                quantity: -issued,
                unit: material.unit,
                project_id: Some(project.id),
                reason: Some(format!("project {}", project.code)),
                unit_cost,
            },
        )
        .await?;

        let sql = format!(
            r#"
            INSERT INTO project_material_usages (project_id, material_id, quantity, unit, unit_cost,
                                                 total_cost, movement_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USAGE_COLUMNS
        );
        let usage: MaterialUsage = sqlx::query_as::<_, MaterialUsageRow>(&sql)
            .bind(project.id)
            .bind(material.id)
            .bind(issued)
            .bind(material.unit.as_str())
            .bind(unit_cost)
            .bind(movement_total_cost(issued, unit_cost))
            .bind(movement.id)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;

        let costs = recompute_costs(&mut *tx, project.id).await?;
        tx.commit().await?;

        tracing::info!(
            project_id = %project.id,
            usage_id = %usage.id,
            material_id = %material.id,
            quantity = %usage.quantity,
            satisfied = plan.outcome.satisfied,
            "Material added to project"
        );
        Ok(AddMaterialResult {
            usage,
            outcome: plan.outcome,
            costs,
        })
    }

    /// Undo a usage: restore the stock, book a compensating IN movement,
    /// delete the usage and rebuild the project costs
    pub async fn remove_material(&self, user_id: Uuid, project_id: Uuid, usage_id: Uuid) -> AppResult<ProjectCosts> {
        let mut tx = self.db.begin().await?;
        let project = fetch_project(&mut *tx, project_id, true).await?;
        project.status.ensure_accepts_removals()?;

        let sql = format!(
            "SELECT {} FROM project_material_usages WHERE id = $1 AND project_id = $2",
            USAGE_COLUMNS
        );
        let usage: MaterialUsage = sqlx::query_as::<_, MaterialUsageRow>(&sql)
            .bind(usage_id)
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Usage"))?
            .try_into()?;

        let material = fetch_material(&mut *tx, usage.material_id).await?;
        let lot = restore(&mut *tx, &material, usage.quantity).await?;
        record_movement(
            &mut *tx,
            NewMovement {
                kind: MovementKind::In,
                material_id: material.id,
                lot_id: Some(lot.id),
                user_id,
                quantity: usage.quantity,
                unit: usage.unit,
                project_id: Some(project.id),
                reason: Some(format!("returned from project {}", project.code)),
                unit_cost: usage.unit_cost,
            },
        )
        .await?;

        sqlx::query("DELETE FROM project_material_usages WHERE id = $1")
            .bind(usage.id)
            .execute(&mut *tx)
            .await?;

        let costs = recompute_costs(&mut *tx, project.id).await?;
        tx.commit().await?;

        tracing::info!(project_id = %project.id, usage_id = %usage.id, "Material removed from project");
        Ok(costs)
    }

    pub async fn add_labor(&self, project_id: Uuid, input: AddLaborInput) -> AppResult<LaborEntry> {
        input.validate()?;
        shared::validate_labor_hours(input.hours).map_err(|m| AppError::Validation {
            field: "hours".to_string(),
            message: m.to_string(),
        })?;
        let total_cost = labor_cost(input.hours, input.hourly_rate)?;

        let mut tx = self.db.begin().await?;
        let project = fetch_project(&mut *tx, project_id, true).await?;
        project.status.ensure_accepts_additions()?;

        let sql = format!(
            r#"
            INSERT INTO project_labor_entries (project_id, worker_name, description, hours, hourly_rate,
                                               total_cost, work_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            LABOR_COLUMNS
        );
        let entry: LaborEntry = sqlx::query_as::<_, LaborEntryRow>(&sql)
            .bind(project_id)
            .bind(&input.worker_name)
            .bind(&input.description)
            .bind(input.hours)
            .bind(input.hourly_rate)
            .bind(total_cost)
            .bind(input.work_date.unwrap_or_else(|| Utc::now().date_naive()))
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;

        recompute_costs(&mut *tx, project_id).await?;
        tx.commit().await?;

        tracing::info!(project_id = %project_id, entry_id = %entry.id, total_cost = %entry.total_cost, "Labor added");
        Ok(entry)
    }

    pub async fn remove_labor(&self, project_id: Uuid, entry_id: Uuid) -> AppResult<ProjectCosts> {
        self.remove_child("project_labor_entries", "Labor entry", project_id, entry_id)
            .await
    }

    pub async fn add_other_cost(&self, project_id: Uuid, input: AddOtherCostInput) -> AppResult<OtherCostEntry> {
        input.validate()?;
        shared::validate_amount(input.amount).map_err(|m| AppError::Validation {
            field: "amount".to_string(),
            message: m.to_string(),
        })?;

        let mut tx = self.db.begin().await?;
        let project = fetch_project(&mut *tx, project_id, true).await?;
        project.status.ensure_accepts_additions()?;

        let sql = format!(
            r#"
            INSERT INTO project_other_costs (project_id, description, amount)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            OTHER_COST_COLUMNS
        );
        let entry: OtherCostEntry = sqlx::query_as::<_, OtherCostRow>(&sql)
            .bind(project_id)
            .bind(&input.description)
            .bind(input.amount)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;

        recompute_costs(&mut *tx, project_id).await?;
        tx.commit().await?;

        tracing::info!(project_id = %project_id, entry_id = %entry.id, amount = %entry.amount, "Other cost added");
        Ok(entry)
    }

    pub async fn remove_other_cost(&self, project_id: Uuid, entry_id: Uuid) -> AppResult<ProjectCosts> {
        self.remove_child("project_other_costs", "Cost entry", project_id, entry_id)
            .await
    }

    /// Delete a labor or other-cost row and rebuild the costs
    async fn remove_child(
        &self,
        table: &'static str,
        resource: &'static str,
        project_id: Uuid,
        entry_id: Uuid,
    ) -> AppResult<ProjectCosts> {
        let mut tx = self.db.begin().await?;
        let project = fetch_project(&mut *tx, project_id, true).await?;
        project.status.ensure_accepts_removals()?;

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1 AND project_id = $2", table))
            .bind(entry_id)
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(resource));
        }

        let costs = recompute_costs(&mut *tx, project_id).await?;
        tx.commit().await?;

        tracing::info!(project_id = %project_id, entry_id = %entry_id, "{} removed", resource);
        Ok(costs)
    }
}
