// File: orchestrator/src/dispatch/mod.rs
//! Fan-out/fan-in execution of script operations.
//!
//! `Dispatcher` turns one "run operation N" request into one spawned
//! `RemoteExecutor` job per target resource, then spawns a single fan-in task
//! that joins every job handle in submission order and hands the ordered
//! results to the `Aggregator`.

pub mod aggregator;
pub mod dispatcher;
pub mod executor;

pub use aggregator::{Aggregator, RunSummary};
pub use dispatcher::{DispatchHandle, Dispatcher};
pub use executor::RemoteExecutor;

use crate::run_tracker::RunTrigger;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceRunStatus {
    Success,
    Failed,
}

/// Outcome of one script run on one resource
#[derive(Debug, Clone, Serialize)]
pub struct SingleResourceResult {
    pub resource_id: i64,
    pub status: ResourceRunStatus,
    pub output: String,
    /// `None` when the command never ran
    pub exit_code: Option<u32>,
    pub truncated: bool,
}

impl SingleResourceResult {
    pub fn failed(resource_id: i64, output: String) -> Self {
        Self {
            resource_id,
            status: ResourceRunStatus::Failed,
            output,
            exit_code: None,
            truncated: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResourceRunStatus::Success
    }
}

/// A job that never produced a result (panicked or was cancelled)
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub resource_id: i64,
    pub message: String,
}

pub type JobResult = Result<SingleResourceResult, JobFailure>;

/// Identity of one dispatch, handed to the fan-in
#[derive(Debug, Clone)]
pub struct RunContext {
    pub operation_id: i64,
    pub run_id: String,
    pub trigger: RunTrigger,
    pub target_resource_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Jobs were spawned; the fan-in will write the terminal state
    Submitted { run_id: String, targets: usize },
    /// The operation had no targets and was failed immediately
    NoTargets { run_id: String },
    NotFound { operation_id: i64 },
    /// The operation type cannot be dispatched (frontend deployments)
    Unsupported { operation_id: i64 },
    AlreadyRunning { operation_id: i64, active_run_id: String },
}

impl DispatchOutcome {
    pub fn run_id(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Submitted { run_id, .. } | DispatchOutcome::NoTargets { run_id } => {
                Some(run_id.as_str())
            }
            _ => None,
        }
    }
}
