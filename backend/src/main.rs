//! Metal Stock - Backend Server
//!
//! Inventory of metal bar, tube and plate stock with lot-level allocation,
//! an append-only movement ledger and per-project costing.

use axum::{http::HeaderValue, routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;

pub use config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "msk_server=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = config::Config::load()?;

    tracing::info!(
        environment = %config.environment,
        tolerance_percent = %config.stock.tolerance_percent,
        alert_dedup_hours = config.stock.alert_dedup_hours,
        default_unit_price = %config.stock.default_unit_price,
        "Starting Metal Stock Server"
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;
    tracing::info!(max_connections = config.database.max_connections, "Stock database connected");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Stock schema up to date");
    }

    let addr = SocketAddr::from((config.server.host.parse::<std::net::IpAddr>()?, config.server.port));
    let state = AppState {
        db: db_pool,
        config: Arc::new(config),
    };
    let app = create_app(state)?;

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Router with the versioned API, request tracing and CORS
fn create_app(state: AppState) -> anyhow::Result<Router> {
    let origins = &state.config.server.cors_origins;
    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let allowed = origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new().allow_origin(allowed)
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Ok(Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// Let in-flight stock transactions finish on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn root() -> &'static str {
    "Metal Stock API v1.0"
}
