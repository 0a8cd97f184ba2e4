// Trigger store maintenance endpoints

use axum::{extract::State, response::Json};
use tracing::info;

use super::common::{operation_error, ApiResponse, ApiResult};
use crate::scheduler::SyncReport;
use crate::web::AppState;

/// Rebuild every schedule entry from the stored operations
pub async fn resync_scheduler(State(state): State<AppState>) -> ApiResult<SyncReport> {
    info!("Scheduler resync requested");
    state
        .operation_service
        .resync_all()
        .await
        .map(|report| Json(ApiResponse::success(report)))
        .map_err(|e| operation_error(&e))
}
