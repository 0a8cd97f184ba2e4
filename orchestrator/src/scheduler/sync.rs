// File: orchestrator/src/scheduler/sync.rs
use crate::constants::scheduler::ENTRY_PREFIX;
use crate::database::{Operation, OperationType};
use crate::errors::{ScheduleStoreError, SchedulerError};
use crate::scheduler::cron::validate_cron;
use crate::scheduler::store::{DispatchTrigger, ScheduleEntry, ScheduleStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// What `sync` left behind for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Scheduled,
    Unscheduled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub operation_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub scheduled: usize,
    pub unscheduled: usize,
    pub failures: Vec<SyncFailure>,
}

/// Keeps trigger-store entries consistent with each operation's enabled flag
/// and schedule.
pub struct SchedulerSync {
    store: Arc<dyn ScheduleStore>,
    trigger: Arc<dyn DispatchTrigger>,
}

impl SchedulerSync {
    pub fn new(store: Arc<dyn ScheduleStore>, trigger: Arc<dyn DispatchTrigger>) -> Self {
        Self { store, trigger }
    }

    pub fn entry_name(operation_id: i64) -> String {
        format!("{}{}", ENTRY_PREFIX, operation_id)
    }

    /// Delete-then-maybe-create. Safe to call any number of times.
    #[instrument(skip(self, operation), fields(operation_id = operation.id))]
    pub async fn sync(&self, operation: &Operation) -> Result<SyncOutcome, SchedulerError> {
        self.delete(operation.id).await?;

        if !operation.enabled || operation.operation_type != OperationType::ScriptExec {
            return Ok(SyncOutcome::Unscheduled);
        }

        let Some(schedule) = operation.cron_schedule() else {
            return Ok(SyncOutcome::Unscheduled);
        };

        validate_cron(schedule).map_err(|source| SchedulerError::InvalidSchedule {
            operation_id: operation.id,
            source,
        })?;

        let entry = ScheduleEntry {
            name: Self::entry_name(operation.id),
            cron: schedule.to_string(),
            operation_id: operation.id,
            trigger: self.trigger.clone(),
        };

        match self.store.create(entry).await {
            Ok(()) => Ok(SyncOutcome::Scheduled),
            Err(ScheduleStoreError::Rejected { reason, .. }) => {
                error!(
                    "Validator accepted '{}' for operation {} but the trigger store rejected it: {}",
                    schedule, operation.id, reason
                );
                Err(SchedulerError::Parity {
                    operation_id: operation.id,
                    schedule: schedule.to_string(),
                    reason,
                })
            }
            Err(source) => Err(SchedulerError::Store {
                operation_id: operation.id,
                source,
            }),
        }
    }

    /// Removes the operation's entry; a missing entry is not an error.
    pub async fn delete(&self, operation_id: i64) -> Result<(), SchedulerError> {
        match self.store.delete(&Self::entry_name(operation_id)).await {
            Ok(()) | Err(ScheduleStoreError::NotFound { .. }) => Ok(()),
            Err(source) => Err(SchedulerError::Store {
                operation_id,
                source,
            }),
        }
    }

    /// Syncs every operation, collecting failures instead of stopping at the first.
    pub async fn sync_all(&self, operations: &[Operation]) -> SyncReport {
        let mut report = SyncReport::default();

        for operation in operations {
            match self.sync(operation).await {
                Ok(SyncOutcome::Scheduled) => report.scheduled += 1,
                Ok(SyncOutcome::Unscheduled) => report.unscheduled += 1,
                Err(e) => {
                    warn!("Failed to sync operation {}: {}", operation.id, e);
                    report.failures.push(SyncFailure {
                        operation_id: operation.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Scheduler sync complete: {} scheduled, {} unscheduled, {} failed",
            report.scheduled,
            report.unscheduled,
            report.failures.len()
        );
        report
    }
}
