// Common types and utilities for API handlers

use axum::{http::StatusCode, response::Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::{DeployError, OperationError};

// Helper type for API responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message.into())))
}

pub fn internal_error(err: impl std::fmt::Display) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub fn deploy_error(err: &DeployError) -> ApiError {
    let status = match err {
        DeployError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
        DeployError::Session(_) | DeployError::Remote { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    };
    api_error(status, err.to_string())
}

pub fn operation_error(err: &OperationError) -> ApiError {
    let status = match err {
        OperationError::NotFound { .. } => StatusCode::NOT_FOUND,
        OperationError::InvalidSchedule(_) | OperationError::NoTargets => StatusCode::BAD_REQUEST,
        OperationError::SavedButNotScheduled { .. } | OperationError::SchedulerUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        OperationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, err.to_string())
}

// Query parameters
#[derive(Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Deserialize)]
pub struct ResourceQuery {
    pub resource_id: i64,
}
