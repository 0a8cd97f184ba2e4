// Operation lookup, execute-now and run history endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info};

use super::common::{api_error, internal_error, ApiResponse, ApiResult, LimitQuery};
use crate::database::{Operation, OperationExecution};
use crate::dispatch::DispatchOutcome;
use crate::run_tracker::{RunTrackerStatus, RunTrigger};
use crate::web::AppState;

pub async fn get_operation(
    Path(operation_id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Operation> {
    match state.database.get_operation(operation_id).await {
        Ok(Some(operation)) => Ok(Json(ApiResponse::success(operation))),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Operation {} not found", operation_id),
        )),
        Err(e) => {
            error!("Failed to load operation {}: {}", operation_id, e);
            Err(internal_error(e))
        }
    }
}

/// Dispatch an operation now; returns once every job is submitted
pub async fn execute_operation(
    Path(operation_id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<DispatchOutcome> {
    info!("Manual execution requested for operation {}", operation_id);

    let outcome = state
        .dispatcher
        .dispatch(operation_id, RunTrigger::Manual)
        .await
        .map_err(|e| {
            error!("Dispatch of operation {} failed: {}", operation_id, e);
            internal_error(e)
        })?;

    match &outcome {
        DispatchOutcome::Submitted { .. } => Ok(Json(ApiResponse::success(outcome))),
        DispatchOutcome::NotFound { .. } => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Operation {} not found", operation_id),
        )),
        DispatchOutcome::AlreadyRunning { active_run_id, .. } => Err(api_error(
            StatusCode::CONFLICT,
            format!(
                "Operation {} is already running (run {})",
                operation_id, active_run_id
            ),
        )),
        DispatchOutcome::NoTargets { run_id } => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Operation {} has no target resources, run {} recorded as failed",
                operation_id, run_id
            ),
        )),
        DispatchOutcome::Unsupported { .. } => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Operation {} is a frontend deployment, use /api/deploy/execute",
                operation_id
            ),
        )),
    }
}

pub async fn list_operation_executions(
    Path(operation_id): Path<i64>,
    Query(query): Query<LimitQuery>,
    State(state): State<AppState>,
) -> ApiResult<Vec<OperationExecution>> {
    let limit = query.limit.clamp(1, 500);
    state
        .database
        .list_executions(operation_id, limit)
        .await
        .map(|executions| Json(ApiResponse::success(executions)))
        .map_err(internal_error)
}

pub async fn get_execution(
    Path(execution_id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<OperationExecution> {
    match state.database.get_execution(execution_id).await {
        Ok(Some(execution)) => Ok(Json(ApiResponse::success(execution))),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Execution {} not found", execution_id),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

pub async fn get_active_runs(State(state): State<AppState>) -> ApiResult<RunTrackerStatus> {
    Ok(Json(ApiResponse::success(state.run_tracker.get_status().await)))
}
