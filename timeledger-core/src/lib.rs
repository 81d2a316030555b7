//! Timeledger core: a local-first time tracking and billing service.
//!
//! Sessions of work accumulate into an earnings ledger backed by SQLite;
//! invoices are derived snapshots over that ledger; a sales funnel tracks
//! leads on the side. Everything is served over HTTP by axum, and an
//! optional replicator mirrors each user's workspace to a remote store.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, patch, post};
use axum::{middleware, Router};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod funnel;
pub mod invoicing;
pub mod ledger;
pub mod models;
pub mod money;
pub mod rates;
pub mod replicator;
pub mod reports;

pub use config::AppConfig;
pub use error::AppError;

/// Application state containing shared resources.
///
/// This struct holds the database connection pool and other shared state
/// that needs to be accessible to route handlers.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool
    pub db: SqlitePool,

    /// Resolved runtime configuration
    pub config: Arc<AppConfig>,

    /// In-memory engine behind the single active timer per user
    pub timers: ledger::TimerEngine,

    /// Handle for marking workspaces dirty and reading replication state
    pub sync: replicator::SyncNotifier,

    /// Shared HTTP client for outbound calls
    pub http: reqwest::Client,
}

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
/// Useful for monitoring and load balancer health checks.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "timeledger-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Database health check endpoint.
///
/// Verifies that the database connection is working by executing
/// a simple query.
async fn db_health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

/// Everything under `/api`, guarded by the bearer-token middleware.
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::me))
        // Session ledger
        .route(
            "/sessions",
            get(ledger::handlers::list_sessions).post(ledger::handlers::create_session),
        )
        .route("/sessions/stats", get(reports::handlers::session_stats))
        .route("/sessions/export", get(reports::handlers::export_sessions))
        .route(
            "/sessions/:id",
            get(ledger::handlers::get_session)
                .patch(ledger::handlers::update_session)
                .delete(ledger::handlers::delete_session),
        )
        // Timer
        .route("/timer", get(ledger::handlers::timer_status))
        .route("/timer/start", post(ledger::handlers::start_timer))
        .route("/timer/start/:session_id", post(ledger::handlers::start_pending))
        .route("/timer/pause", post(ledger::handlers::pause_timer))
        .route("/timer/resume", post(ledger::handlers::resume_timer))
        .route("/timer/stop", post(ledger::handlers::stop_timer))
        // Clients
        .route(
            "/clients",
            get(clients::list_clients_handler).post(clients::create_client_handler),
        )
        .route(
            "/clients/:id",
            get(clients::get_client_handler)
                .patch(clients::update_client_handler)
                .delete(clients::delete_client_handler),
        )
        // Invoices
        .route(
            "/invoices",
            get(invoicing::handlers::list_invoices).post(invoicing::handlers::create_invoice),
        )
        .route("/invoices/candidates", get(invoicing::handlers::invoice_candidates))
        .route(
            "/invoices/:id",
            get(invoicing::handlers::get_invoice).delete(invoicing::handlers::delete_invoice),
        )
        .route("/invoices/:id/document", get(invoicing::handlers::invoice_document))
        .route("/invoices/:id/advance", post(invoicing::handlers::advance_invoice))
        .route("/invoices/:id/cancel", post(invoicing::handlers::cancel_invoice))
        // Funnel board
        .route(
            "/funnels",
            get(funnel::list_funnels_handler).post(funnel::create_funnel_handler),
        )
        .route("/funnels/:id/stats", get(funnel::funnel_stats_handler))
        .route(
            "/funnels/:id/leads",
            get(funnel::list_leads_handler).post(funnel::create_lead_handler),
        )
        .route(
            "/leads/:id",
            patch(funnel::update_lead_handler).delete(funnel::delete_lead_handler),
        )
        // Lookups and replication state
        .route("/rates", get(rates::get_rates_handler))
        .route("/sync/status", get(replicator::handlers::sync_status))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_guard))
}

/// Creates the main application router.
///
/// Sets up all routes and middleware for the Timeledger API.
///
/// # Arguments
///
/// * `state` - The application state containing the pool, config and engines
///
/// # Returns
///
/// Returns a configured Axum Router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Public routes
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .nest("/api", api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
