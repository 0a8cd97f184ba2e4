// File: orchestrator/src/dispatch/aggregator.rs
use super::{JobResult, RunContext};
use crate::database::{Database, OperationStatus, RunCompletion};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub operation_id: i64,
    pub run_id: String,
    pub status: OperationStatus,
    pub success_count: i64,
    pub failure_count: i64,
    /// `false` when the operation was deleted while the run was in flight
    pub recorded: bool,
}

/// Fan-in for one dispatch: merges every job result into the operation's
/// terminal state and one history row.
pub struct Aggregator {
    database: Arc<Database>,
}

impl Aggregator {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    #[instrument(skip(self, results, run), fields(operation_id = run.operation_id, run_id = %run.run_id))]
    pub async fn summarize(&self, results: Vec<JobResult>, run: &RunContext) -> Result<RunSummary> {
        let mut success_count = 0i64;
        let mut failure_count = 0i64;
        let mut outputs = Vec::with_capacity(results.len());
        let mut per_resource = Vec::with_capacity(results.len());

        for result in &results {
            match result {
                Ok(res) => {
                    outputs.push(res.output.clone());
                    if res.is_success() {
                        success_count += 1;
                    } else {
                        failure_count += 1;
                    }
                    per_resource.push(serde_json::json!({
                        "resource_id": res.resource_id,
                        "status": res.status,
                        "exit_code": res.exit_code,
                        "truncated": res.truncated,
                    }));
                }
                Err(crash) => {
                    outputs.push(format!(
                        "Task execution error: resource {}: {}",
                        crash.resource_id, crash.message
                    ));
                    failure_count += 1;
                    per_resource.push(serde_json::json!({
                        "resource_id": crash.resource_id,
                        "status": "crashed",
                    }));
                }
            }
        }

        let (status, last_error) = if failure_count > 0 {
            (
                OperationStatus::Failed,
                Some(format!("Execution failed on {} resources", failure_count)),
            )
        } else {
            (OperationStatus::Success, None)
        };

        let completion = RunCompletion {
            operation_id: run.operation_id,
            run_id: run.run_id.clone(),
            status,
            success_delta: success_count,
            failure_delta: failure_count,
            output: Some(outputs.join("\n")),
            error: last_error,
            steps: Vec::new(),
            input_data: serde_json::json!({
                "run_id": run.run_id,
                "trigger": run.trigger,
                "target_resources": run.target_resource_ids,
                "results": per_resource,
            }),
        };

        let recorded = match self.database.complete_run(&completion).await {
            Ok(recorded) => recorded,
            Err(e) => {
                error!("Summarization of run {} failed: {}", run.run_id, e);
                let message = format!("Summarization error: {}", e);
                if let Err(recovery) = self
                    .database
                    .force_fail_run(run.operation_id, &run.run_id, &message)
                    .await
                {
                    error!("Recovery write also failed: {}", recovery);
                }
                return Err(e);
            }
        };

        if !recorded {
            warn!(
                "Operation {} was deleted during run {}, results dropped",
                run.operation_id, run.run_id
            );
        }

        info!(
            "Operation {} run {} summary: {} success, {} failed",
            run.operation_id, run.run_id, success_count, failure_count
        );

        Ok(RunSummary {
            operation_id: run.operation_id,
            run_id: run.run_id.clone(),
            status,
            success_count,
            failure_count,
            recorded,
        })
    }
}
