// File: orchestrator/src/services/deployment_service.rs
use crate::config::{Config, Resource};
use crate::database::{
    Database, OperationConfig, OperationDraft, OperationStatus, RunCompletion,
};
use crate::deploy::{BackupInfo, DeployOptions, DeployPipeline, DeployResult};
use crate::errors::DeployError;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub operation_id: i64,
    pub run_id: String,
    pub success: bool,
    pub results: Vec<DeployResult>,
}

/// Resolves resource ids against the inventory and records deployments as
/// FRONTEND_DEPLOY operations with one history row each.
///
/// Boundary failures surface as `DeployError` inside the `anyhow::Error`,
/// so callers can tell a bad request from a storage failure.
pub struct DeploymentService {
    config: Arc<Config>,
    database: Arc<Database>,
    pipeline: DeployPipeline,
}

impl DeploymentService {
    pub fn new(config: Arc<Config>, database: Arc<Database>, pipeline: DeployPipeline) -> Self {
        Self {
            config,
            database,
            pipeline,
        }
    }

    fn lookup(&self, resource_id: i64) -> Result<&Resource, DeployError> {
        self.config
            .resources
            .get(&resource_id)
            .ok_or(DeployError::ResourceNotFound { resource_id })
    }

    fn lookup_all(&self, resource_ids: &[i64]) -> Result<Vec<Resource>, DeployError> {
        resource_ids
            .iter()
            .map(|&id| self.lookup(id).cloned())
            .collect()
    }

    #[instrument(skip(self, package), fields(package = %package.display()))]
    pub async fn deploy_and_record(
        &self,
        package: &Path,
        resource_ids: &[i64],
        options: DeployOptions,
        created_by: Option<String>,
    ) -> Result<DeploymentReport> {
        self.pipeline
            .check_request(package, resource_ids)
            .await?;
        let resources = self.lookup_all(resource_ids)?;

        let filename = package
            .file_name()
            .map(|name| name.to_string_lossy().to_string());

        let draft = OperationDraft {
            name: format!(
                "Frontend deploy {}",
                filename.as_deref().unwrap_or("package")
            ),
            description: None,
            config: OperationConfig::FrontendDeploy {
                restart_secondary: options.restart_secondary,
                filename: filename.clone(),
            },
            target_resource_ids: resource_ids.to_vec(),
            schedule: None,
            enabled: true,
            created_by,
        };

        let operation = self.database.insert_operation(&draft).await?;
        let operation_id = operation.id;
        self.database
            .mark_running(operation_id)
            .await?
            .ok_or_else(|| anyhow!("Operation {} vanished before deployment", operation_id))?;

        let run_id = Uuid::new_v4().to_string();
        info!(
            "Deployment {} (operation {}) to {} servers",
            run_id,
            operation_id,
            resources.len()
        );

        let input_data = serde_json::json!({
            "run_id": run_id,
            "package": filename,
            "target_resources": resource_ids,
            "restart_secondary": options.restart_secondary,
        });

        // Detached: the row must reach a terminal state even if the caller is dropped
        let recording = RecordedDeployment {
            pipeline: self.pipeline.clone(),
            database: self.database.clone(),
            operation_id,
            run_id: run_id.clone(),
            input_data,
        };
        let package = package.to_path_buf();
        let handle = tokio::spawn(
            async move { recording.execute(&package, &resources, options).await }.in_current_span(),
        );

        match handle.await {
            Ok(report) => report,
            Err(e) => {
                error!("Deployment {} task aborted: {}", run_id, e);
                let message = format!("Deployment task aborted: {}", e);
                if let Err(recovery) = self
                    .database
                    .force_fail_run(operation_id, &run_id, &message)
                    .await
                {
                    error!("Recovery write also failed: {}", recovery);
                }
                Err(anyhow!(message))
            }
        }
    }

    pub async fn rollback(
        &self,
        resource_id: i64,
        backup_name: &str,
        options: DeployOptions,
    ) -> Result<DeployResult, DeployError> {
        let resource = self.lookup(resource_id)?.clone();
        let result = self.pipeline.rollback(&resource, backup_name, options).await?;
        if result.success {
            info!("Rolled back {} to {}", result.server, backup_name);
        } else {
            warn!(
                "Rollback of {} to {} failed: {:?}",
                result.server, backup_name, result.error
            );
        }
        Ok(result)
    }

    pub async fn list_backups(&self, resource_id: i64) -> Result<Vec<BackupInfo>, DeployError> {
        let resource = self.lookup(resource_id)?.clone();
        self.pipeline.list_backups(&resource).await
    }
}

/// The part of a deployment that runs after its history row is RUNNING
struct RecordedDeployment {
    pipeline: DeployPipeline,
    database: Arc<Database>,
    operation_id: i64,
    run_id: String,
    input_data: serde_json::Value,
}

impl RecordedDeployment {
    async fn execute(
        self,
        package: &Path,
        resources: &[Resource],
        options: DeployOptions,
    ) -> Result<DeploymentReport> {
        let Self {
            pipeline,
            database,
            operation_id,
            run_id,
            input_data,
        } = self;

        let results = match pipeline.deploy(package, resources, options).await {
            Ok(results) => results,
            Err(e) => {
                // Checked before recording, only reachable if the package changed in between
                error!("Deployment {} rejected after recording: {}", run_id, e);
                database
                    .complete_run(&RunCompletion {
                        operation_id,
                        run_id: run_id.clone(),
                        status: OperationStatus::Failed,
                        success_delta: 0,
                        failure_delta: 1,
                        output: None,
                        error: Some(e.to_string()),
                        steps: Vec::new(),
                        input_data,
                    })
                    .await?;
                return Err(e.into());
            }
        };

        let success = results.iter().all(|r| r.success);
        let output = results
            .iter()
            .map(|r| {
                format!(
                    "[{}] {}",
                    r.server,
                    if r.success { "succeeded" } else { "failed" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.server, e)))
            .collect();

        let completion = RunCompletion {
            operation_id,
            run_id: run_id.clone(),
            status: if success {
                OperationStatus::Success
            } else {
                OperationStatus::Failed
            },
            success_delta: i64::from(success),
            failure_delta: i64::from(!success),
            output: Some(output),
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
            steps: results.iter().flat_map(|r| r.steps.clone()).collect(),
            input_data,
        };

        if !database.complete_run(&completion).await? {
            warn!("Operation {} was deleted during deployment {}", operation_id, run_id);
        }

        info!(
            "Deployment {} finished: {}",
            run_id,
            if success { "success" } else { "failed" }
        );

        Ok(DeploymentReport {
            operation_id,
            run_id,
            success,
            results,
        })
    }
}
