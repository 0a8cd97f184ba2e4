// Frontend deployment, backup listing and rollback endpoints

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{error, info};

use super::common::{deploy_error, internal_error, ApiResponse, ApiResult, ResourceQuery};
use crate::deploy::{BackupInfo, DeployOptions, DeployResult};
use crate::errors::DeployError;
use crate::services::DeploymentReport;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct DeployRequest {
    /// Path of an already-uploaded package on the orchestrator host
    pub package_path: String,
    pub resource_ids: Vec<i64>,
    #[serde(default)]
    pub restart_secondary: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Deserialize)]
pub struct RollbackRequest {
    pub resource_id: i64,
    pub backup_name: String,
    #[serde(default)]
    pub restart_secondary: bool,
}

pub async fn execute_deploy(
    State(state): State<AppState>,
    Json(request): Json<DeployRequest>,
) -> ApiResult<DeploymentReport> {
    info!(
        "Deployment of {} requested for resources {:?}",
        request.package_path, request.resource_ids
    );

    let options = DeployOptions {
        restart_secondary: request.restart_secondary,
    };
    let package = PathBuf::from(&request.package_path);

    match state
        .deployment_service
        .deploy_and_record(&package, &request.resource_ids, options, request.created_by)
        .await
    {
        Ok(report) => Ok(Json(ApiResponse::success(report))),
        Err(e) => match e.downcast_ref::<DeployError>() {
            Some(deploy) => Err(deploy_error(deploy)),
            None => {
                error!("Deployment of {} failed: {}", request.package_path, e);
                Err(internal_error(e))
            }
        },
    }
}

pub async fn list_backups(
    Query(query): Query<ResourceQuery>,
    State(state): State<AppState>,
) -> ApiResult<Vec<BackupInfo>> {
    state
        .deployment_service
        .list_backups(query.resource_id)
        .await
        .map(|backups| Json(ApiResponse::success(backups)))
        .map_err(|e| {
            error!("Listing backups for resource {} failed: {}", query.resource_id, e);
            deploy_error(&e)
        })
}

pub async fn rollback_deploy(
    State(state): State<AppState>,
    Json(request): Json<RollbackRequest>,
) -> ApiResult<DeployResult> {
    info!(
        "Rollback of resource {} to {} requested",
        request.resource_id, request.backup_name
    );

    let options = DeployOptions {
        restart_secondary: request.restart_secondary,
    };

    state
        .deployment_service
        .rollback(request.resource_id, &request.backup_name, options)
        .await
        .map(|result| Json(ApiResponse::success(result)))
        .map_err(|e| deploy_error(&e))
}
