// File: orchestrator/src/web/server.rs
use crate::web::{handlers, AppState};
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub async fn start_web_server(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // === OPERATION ROUTES ===
        .route("/api/operations/{id}", get(handlers::get_operation))
        .route(
            "/api/operations/{id}/execute",
            post(handlers::execute_operation),
        )
        .route(
            "/api/operations/{id}/executions",
            get(handlers::list_operation_executions),
        )
        .route("/api/executions/{id}", get(handlers::get_execution))
        .route("/api/runs/active", get(handlers::get_active_runs))
        // === DEPLOYMENT ROUTES ===
        .route("/api/deploy/execute", post(handlers::execute_deploy))
        .route("/api/deploy/backups", get(handlers::list_backups))
        .route("/api/deploy/rollback", post(handlers::rollback_deploy))
        // === SCHEDULER ROUTES ===
        .route("/api/scheduler/resync", post(handlers::resync_scheduler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
