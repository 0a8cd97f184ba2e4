//! Run tracking for dispatched operations
//!
//! Tracks the run currently in flight for each operation so that a second
//! dispatch (a cron tick firing while a manual run is still fanning out, or a
//! double click on "execute") is rejected instead of interleaving with the
//! first one.
//!
//! # Key Features
//!
//! - **One run per operation**: `try_start` fails while a run is active
//! - **Run ids**: every run gets a UUID that ties log lines, the fan-in task
//!   and the history row together
//! - **Stale-finish protection**: `finish` only clears the run it was given
//! - **Automatic cleanup**: runs stuck longer than a cutoff are dropped
//!
//! # Usage
//!
//! ```ignore
//! let run_id = tracker.try_start(operation_id, RunTrigger::Manual).await?;
//! // fan out, fan in ...
//! tracker.finish(operation_id, &run_id).await;
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveRun {
    pub operation_id: i64,
    pub run_id: String,
    pub trigger: RunTrigger,
    pub target_count: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunTrackerStatus {
    pub active_runs: Vec<ActiveRun>,
    pub total_active: usize,
}

#[derive(Clone, Default)]
pub struct RunTracker {
    active_runs: Arc<RwLock<HashMap<i64, ActiveRun>>>, // operation_id -> run
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new run for the operation and returns its run id.
    /// Returns the active run when one is already in flight.
    #[instrument(skip(self))]
    pub async fn try_start(
        &self,
        operation_id: i64,
        trigger: RunTrigger,
    ) -> Result<String, ActiveRun> {
        let mut active = self.active_runs.write().await;

        if let Some(current) = active.get(&operation_id) {
            warn!(
                "Operation {} is already running as {} (started {}s ago)",
                operation_id,
                current.run_id,
                Utc::now()
                    .signed_duration_since(current.started_at)
                    .num_seconds()
            );
            return Err(current.clone());
        }

        let run_id = Uuid::new_v4().to_string();
        active.insert(
            operation_id,
            ActiveRun {
                operation_id,
                run_id: run_id.clone(),
                trigger,
                target_count: 0,
                started_at: Utc::now(),
            },
        );

        info!("Started run {} for operation {}", run_id, operation_id);
        Ok(run_id)
    }

    /// Records how many jobs the run fanned out to
    pub async fn set_target_count(&self, operation_id: i64, run_id: &str, count: usize) {
        let mut active = self.active_runs.write().await;
        if let Some(run) = active.get_mut(&operation_id) {
            if run.run_id == run_id {
                run.target_count = count;
            }
        }
    }

    /// Clears the run if it is still the active one for the operation
    pub async fn finish(&self, operation_id: i64, run_id: &str) {
        let mut active = self.active_runs.write().await;
        match active.get(&operation_id) {
            Some(run) if run.run_id == run_id => {
                let duration = Utc::now().signed_duration_since(run.started_at);
                info!(
                    "Finished run {} for operation {} (took {}s)",
                    run_id,
                    operation_id,
                    duration.num_seconds()
                );
                active.remove(&operation_id);
            }
            Some(run) => warn!(
                "Ignoring finish of stale run {} for operation {}; {} is active",
                run_id, operation_id, run.run_id
            ),
            None => {}
        }
    }

    pub async fn is_running(&self, operation_id: i64) -> bool {
        self.active_runs.read().await.contains_key(&operation_id)
    }

    pub async fn get_active_run(&self, operation_id: i64) -> Option<ActiveRun> {
        self.active_runs.read().await.get(&operation_id).cloned()
    }

    pub async fn get_status(&self) -> RunTrackerStatus {
        let active = self.active_runs.read().await;
        let mut active_runs: Vec<ActiveRun> = active.values().cloned().collect();
        active_runs.sort_by_key(|run| run.started_at);
        RunTrackerStatus {
            total_active: active_runs.len(),
            active_runs,
        }
    }

    /// Drops runs older than `max_hours` (fan-in never reported back)
    pub async fn cleanup_old_runs(&self, max_hours: i64) -> u32 {
        let mut active = self.active_runs.write().await;
        let cutoff = Utc::now() - chrono::Duration::hours(max_hours);
        let initial_count = active.len();

        active.retain(|operation_id, run| {
            let should_keep = run.started_at > cutoff;
            if !should_keep {
                warn!(
                    "Cleaned up stuck run {} for operation {} (running for {}h)",
                    run.run_id,
                    operation_id,
                    Utc::now().signed_duration_since(run.started_at).num_hours()
                );
            }
            should_keep
        });

        (initial_count - active.len()) as u32
    }
}
