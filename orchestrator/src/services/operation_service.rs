// File: orchestrator/src/services/operation_service.rs
use crate::database::{Database, Operation, OperationDraft};
use crate::errors::OperationError;
use crate::scheduler::{validate_cron, SchedulerSync, SyncReport};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Edit boundary for operations. Every committed change is followed by a
/// scheduler sync so the trigger store tracks the row.
pub struct OperationService {
    database: Arc<Database>,
    scheduler: Arc<SchedulerSync>,
}

impl OperationService {
    pub fn new(database: Arc<Database>, scheduler: Arc<SchedulerSync>) -> Self {
        Self {
            database,
            scheduler,
        }
    }

    fn validate(draft: &OperationDraft) -> Result<(), OperationError> {
        if draft.target_resource_ids.is_empty() {
            return Err(OperationError::NoTargets);
        }
        if let Some(schedule) = draft.schedule.as_deref() {
            if !schedule.trim().is_empty() {
                validate_cron(schedule)?;
            }
        }
        Ok(())
    }

    async fn sync_saved(&self, operation: Operation) -> Result<Operation, OperationError> {
        match self.scheduler.sync(&operation).await {
            Ok(outcome) => {
                info!("Operation {} saved ({:?})", operation.id, outcome);
                Ok(operation)
            }
            Err(source) => {
                error!("Operation {} saved but not scheduled: {}", operation.id, source);
                Err(OperationError::SavedButNotScheduled {
                    operation_id: operation.id,
                    source,
                })
            }
        }
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: &OperationDraft) -> Result<Operation, OperationError> {
        Self::validate(draft)?;
        let operation = self.database.insert_operation(draft).await?;
        self.sync_saved(operation).await
    }

    #[instrument(skip(self, draft))]
    pub async fn update(
        &self,
        operation_id: i64,
        draft: &OperationDraft,
    ) -> Result<Operation, OperationError> {
        Self::validate(draft)?;
        let operation = self
            .database
            .update_operation(operation_id, draft)
            .await?
            .ok_or(OperationError::NotFound { operation_id })?;
        self.sync_saved(operation).await
    }

    /// Removes the trigger first; the row is only deleted once nothing can fire it.
    #[instrument(skip(self))]
    pub async fn delete(&self, operation_id: i64) -> Result<(), OperationError> {
        if self.database.get_operation(operation_id).await?.is_none() {
            return Err(OperationError::NotFound { operation_id });
        }

        self.scheduler
            .delete(operation_id)
            .await
            .map_err(|source| OperationError::SchedulerUnavailable {
                operation_id,
                source,
            })?;

        if !self.database.delete_operation(operation_id).await? {
            return Err(OperationError::NotFound { operation_id });
        }
        info!("Operation {} deleted", operation_id);
        Ok(())
    }

    /// Rebuilds every trigger from the stored operations
    pub async fn resync_all(&self) -> Result<SyncReport, OperationError> {
        let operations = self.database.list_operations().await?;
        Ok(self.scheduler.sync_all(&operations).await)
    }
}
