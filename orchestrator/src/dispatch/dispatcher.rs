// File: orchestrator/src/dispatch/dispatcher.rs
use super::{Aggregator, DispatchOutcome, JobFailure, JobResult, RemoteExecutor, RunContext};
use crate::database::{Database, OperationConfig, OperationStatus, RunCompletion};
use crate::run_tracker::{RunTracker, RunTrigger};
use crate::scheduler::DispatchTrigger;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Result of a dispatch plus, when jobs were spawned, the fan-in task
pub struct DispatchHandle {
    pub outcome: DispatchOutcome,
    fan_in: Option<JoinHandle<()>>,
}

impl DispatchHandle {
    /// Waits for the fan-in to finish writing the terminal state
    pub async fn wait(self) -> DispatchOutcome {
        if let Some(fan_in) = self.fan_in {
            if let Err(e) = fan_in.await {
                error!("Fan-in task for {:?} did not complete: {}", self.outcome.run_id(), e);
            }
        }
        self.outcome
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    database: Arc<Database>,
    executor: RemoteExecutor,
    aggregator: Arc<Aggregator>,
    tracker: RunTracker,
}

impl Dispatcher {
    pub fn new(
        database: Arc<Database>,
        executor: RemoteExecutor,
        aggregator: Arc<Aggregator>,
        tracker: RunTracker,
    ) -> Self {
        Self {
            database,
            executor,
            aggregator,
            tracker,
        }
    }

    /// Starts a run and returns once every job has been submitted.
    pub async fn dispatch(&self, operation_id: i64, trigger: RunTrigger) -> Result<DispatchOutcome> {
        Ok(self.start(operation_id, trigger).await?.outcome)
    }

    #[instrument(skip(self))]
    pub async fn start(&self, operation_id: i64, trigger: RunTrigger) -> Result<DispatchHandle> {
        let Some(operation) = self.database.get_operation(operation_id).await? else {
            warn!("Operation {} not found, nothing to dispatch", operation_id);
            return Ok(DispatchHandle {
                outcome: DispatchOutcome::NotFound { operation_id },
                fan_in: None,
            });
        };

        if let OperationConfig::FrontendDeploy { .. } = operation.config {
            warn!(
                "Operation {} is a frontend deployment and cannot be dispatched",
                operation_id
            );
            return Ok(DispatchHandle {
                outcome: DispatchOutcome::Unsupported { operation_id },
                fan_in: None,
            });
        }

        let run_id = match self.tracker.try_start(operation_id, trigger).await {
            Ok(run_id) => run_id,
            Err(active) => {
                return Ok(DispatchHandle {
                    outcome: DispatchOutcome::AlreadyRunning {
                        operation_id,
                        active_run_id: active.run_id,
                    },
                    fan_in: None,
                })
            }
        };

        info!("Dispatching operation {} as run {} ({:?})", operation_id, run_id, trigger);

        let operation = match self.database.mark_running(operation_id).await {
            Ok(Some(operation)) => operation,
            Ok(None) => {
                self.tracker.finish(operation_id, &run_id).await;
                return Ok(DispatchHandle {
                    outcome: DispatchOutcome::NotFound { operation_id },
                    fan_in: None,
                });
            }
            Err(e) => {
                self.tracker.finish(operation_id, &run_id).await;
                return Err(e);
            }
        };

        let targets = operation.target_resource_ids.clone();

        if targets.is_empty() {
            warn!("Operation {} has no target resources", operation_id);
            let completion = RunCompletion {
                operation_id,
                run_id: run_id.clone(),
                status: OperationStatus::Failed,
                success_delta: 0,
                failure_delta: 1,
                output: Some("No target resources specified.".to_string()),
                error: Some("No target resources".to_string()),
                steps: Vec::new(),
                input_data: serde_json::json!({
                    "run_id": run_id,
                    "trigger": trigger,
                    "target_resources": targets,
                }),
            };
            let written = self.database.complete_run(&completion).await;
            self.tracker.finish(operation_id, &run_id).await;
            written?;

            return Ok(DispatchHandle {
                outcome: DispatchOutcome::NoTargets { run_id },
                fan_in: None,
            });
        }

        info!("Operation {} targeting resources: {:?}", operation_id, targets);

        let handles: Vec<(i64, JoinHandle<_>)> = targets
            .iter()
            .map(|&resource_id| {
                let executor = self.executor.clone();
                let handle =
                    tokio::spawn(async move { executor.execute(operation_id, resource_id).await });
                (resource_id, handle)
            })
            .collect();

        self.tracker
            .set_target_count(operation_id, &run_id, handles.len())
            .await;

        let context = RunContext {
            operation_id,
            run_id: run_id.clone(),
            trigger,
            target_resource_ids: targets.clone(),
        };
        let aggregator = self.aggregator.clone();
        let tracker = self.tracker.clone();

        let fan_in = tokio::spawn(async move {
            let (resource_ids, handles): (Vec<i64>, Vec<_>) = handles.into_iter().unzip();

            let results: Vec<JobResult> = join_all(handles)
                .await
                .into_iter()
                .zip(resource_ids)
                .map(|(joined, resource_id)| {
                    joined.map_err(|e| JobFailure {
                        resource_id,
                        message: if e.is_panic() {
                            format!("job panicked: {}", e)
                        } else {
                            format!("job cancelled: {}", e)
                        },
                    })
                })
                .collect();

            if let Err(e) = aggregator.summarize(results, &context).await {
                error!(
                    "Failed to summarize run {} of operation {}: {}",
                    context.run_id, context.operation_id, e
                );
            }

            tracker.finish(context.operation_id, &context.run_id).await;
        });

        Ok(DispatchHandle {
            outcome: DispatchOutcome::Submitted {
                run_id,
                targets: targets.len(),
            },
            fan_in: Some(fan_in),
        })
    }
}

#[async_trait]
impl DispatchTrigger for Dispatcher {
    async fn fire(&self, operation_id: i64) {
        match self.dispatch(operation_id, RunTrigger::Scheduled).await {
            Ok(DispatchOutcome::AlreadyRunning { active_run_id, .. }) => warn!(
                "Skipping scheduled run of operation {}: run {} still active",
                operation_id, active_run_id
            ),
            Ok(outcome) => info!("Scheduled dispatch of operation {}: {:?}", operation_id, outcome),
            Err(e) => error!("Scheduled dispatch of operation {} failed: {}", operation_id, e),
        }
    }
}
