//! HTTP handlers for project costing

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::models::{LaborEntry, OtherCostEntry, Project, ProjectCosts, ProjectStatus};
use crate::services::project::{
    AddLaborInput, AddMaterialInput, AddMaterialResult, AddOtherCostInput, ChangeStatusInput, CreateProjectInput,
    ProjectDetail,
};
use crate::services::ProjectService;
use crate::AppState;

fn service(state: AppState) -> ProjectService {
    ProjectService::new(state.db, state.config.stock.clone())
}

/// Create a project in draft
pub async fn create_project(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProjectInput>,
) -> AppResult<Json<Project>> {
    require_permission(&current_user.0, "projects", "write")?;
    let project = service(state).create_project(input).await?;
    Ok(Json(project))
}

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub status: Option<ProjectStatus>,
}

/// List projects, optionally by status
pub async fn list_projects(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Vec<Project>>> {
    let projects = service(state).list_projects(query.status).await?;
    Ok(Json(projects))
}

/// Get a project with usages, labor and other costs
pub async fn get_project(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<ProjectDetail>> {
    let detail = service(state).get_project(project_id).await?;
    Ok(Json(detail))
}

/// Change project status
pub async fn change_project_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<ChangeStatusInput>,
) -> AppResult<Json<Project>> {
    require_permission(&current_user.0, "projects", "status")?;
    let project = service(state).change_status(project_id, input.status).await?;
    Ok(Json(project))
}

/// Consume stock for a project
pub async fn add_project_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<AddMaterialInput>,
) -> AppResult<Json<AddMaterialResult>> {
    require_permission(&current_user.0, "projects", "write")?;
    let result = service(state)
        .add_material(current_user.0.user_id, project_id, input)
        .await?;
    Ok(Json(result))
}

/// Return a project's material to stock
pub async fn remove_project_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((project_id, usage_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ProjectCosts>> {
    require_permission(&current_user.0, "projects", "write")?;
    let costs = service(state)
        .remove_material(current_user.0.user_id, project_id, usage_id)
        .await?;
    Ok(Json(costs))
}

/// Book labor against a project
pub async fn add_project_labor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<AddLaborInput>,
) -> AppResult<Json<LaborEntry>> {
    require_permission(&current_user.0, "projects", "write")?;
    let entry = service(state).add_labor(project_id, input).await?;
    Ok(Json(entry))
}

/// Remove a labor entry
pub async fn remove_project_labor(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((project_id, entry_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ProjectCosts>> {
    require_permission(&current_user.0, "projects", "write")?;
    let costs = service(state).remove_labor(project_id, entry_id).await?;
    Ok(Json(costs))
}

/// Book a miscellaneous cost against a project
pub async fn add_project_other_cost(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(input): Json<AddOtherCostInput>,
) -> AppResult<Json<OtherCostEntry>> {
    require_permission(&current_user.0, "projects", "write")?;
    let entry = service(state).add_other_cost(project_id, input).await?;
    Ok(Json(entry))
}

/// Remove a miscellaneous cost
pub async fn remove_project_other_cost(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((project_id, entry_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ProjectCosts>> {
    require_permission(&current_user.0, "projects", "write")?;
    let costs = service(state).remove_other_cost(project_id, entry_id).await?;
    Ok(Json(costs))
}
