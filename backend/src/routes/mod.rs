//! Route definitions for the Metal Stock server

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Weight calculator (public, no stock access)
        .nest("/calc", calc_routes())
        // Protected routes
        .nest("/materials", material_routes(state.clone()))
        .nest("/stock", stock_routes(state.clone()))
        .nest("/movements", movement_routes(state.clone()))
        .nest("/projects", project_routes(state))
}

fn calc_routes() -> Router<AppState> {
    Router::new()
        .route("/weight", post(handlers::calculate_weight))
        .route("/length", post(handlers::calculate_length))
}

/// Material catalog routes (protected)
fn material_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_materials).post(handlers::create_material))
        .route("/import", post(handlers::import_catalog))
        .route("/:material_id", get(handlers::get_material))
        .route("/:material_id/stock", get(handlers::get_material_stock))
        .route("/:material_id/lots", get(handlers::list_material_lots))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock lot routes (protected)
fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/receive", post(handlers::receive_stock))
        .route("/issue", post(handlers::issue_stock))
        .route("/low", get(handlers::low_stock_report))
        .route("/totals/:material_id", get(handlers::get_stock_totals))
        .route("/lots/:lot_id", get(handlers::get_lot))
        .route("/lots/:lot_id/cut", post(handlers::cut_lot))
        .route("/lots/:lot_id/adjust", post(handlers::adjust_lot))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Movement ledger routes (protected)
fn movement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_movements))
        .route("/summary", get(handlers::cost_summary))
        .route("/:movement_id", get(handlers::get_movement))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Project costing routes (protected)
fn project_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_projects).post(handlers::create_project))
        .route("/:project_id", get(handlers::get_project))
        .route("/:project_id/status", post(handlers::change_project_status))
        .route("/:project_id/materials", post(handlers::add_project_material))
        .route(
            "/:project_id/materials/:usage_id",
            delete(handlers::remove_project_material),
        )
        .route("/:project_id/labor", post(handlers::add_project_labor))
        .route(
            "/:project_id/labor/:entry_id",
            delete(handlers::remove_project_labor),
        )
        .route("/:project_id/other-costs", post(handlers::add_project_other_cost))
        .route(
            "/:project_id/other-costs/:entry_id",
            delete(handlers::remove_project_other_cost),
        )
        .route("/:project_id/movements", get(handlers::list_project_movements))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
