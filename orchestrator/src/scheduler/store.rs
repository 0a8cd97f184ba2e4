// File: orchestrator/src/scheduler/store.rs
use crate::errors::ScheduleStoreError;
use crate::scheduler::cron::to_six_field;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Whatever a fired entry should start. The dispatcher implements this.
#[async_trait]
pub trait DispatchTrigger: Send + Sync {
    async fn fire(&self, operation_id: i64);
}

/// One periodic trigger, keyed by `name`
#[derive(Clone)]
pub struct ScheduleEntry {
    pub name: String,
    /// Five-field cron expression, already validated
    pub cron: String,
    pub operation_id: i64,
    pub trigger: Arc<dyn DispatchTrigger>,
}

impl fmt::Debug for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleEntry")
            .field("name", &self.name)
            .field("cron", &self.cron)
            .field("operation_id", &self.operation_id)
            .finish()
    }
}

/// Registry of periodic triggers
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Stores the entry, replacing any entry with the same name
    async fn create(&self, entry: ScheduleEntry) -> Result<(), ScheduleStoreError>;

    /// Removes the named entry; `NotFound` if there is none
    async fn delete(&self, name: &str) -> Result<(), ScheduleStoreError>;

    /// Names of all stored entries
    async fn entry_names(&self) -> Vec<String>;
}

/// `ScheduleStore` backed by an in-process tokio-cron-scheduler instance.
/// Schedules are evaluated in UTC.
pub struct CronScheduleStore {
    scheduler: JobScheduler,
    jobs: RwLock<HashMap<String, Uuid>>,
}

impl CronScheduleStore {
    pub async fn new() -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create JobScheduler: {}", e))?;

        Ok(Self {
            scheduler,
            jobs: RwLock::new(HashMap::new()),
        })
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start scheduler: {}", e))?;
        info!(
            "Cron scheduler started with {} entries",
            self.jobs.read().await.len()
        );
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for CronScheduleStore {
    async fn create(&self, entry: ScheduleEntry) -> Result<(), ScheduleStoreError> {
        let six_field = to_six_field(&entry.cron);
        let trigger = entry.trigger.clone();
        let operation_id = entry.operation_id;
        let entry_name = entry.name.clone();

        let job = Job::new_async(six_field.as_str(), move |_uuid, _scheduler| {
            let trigger = trigger.clone();
            let entry_name = entry_name.clone();

            Box::pin(async move {
                info!("Schedule entry {} fired", entry_name);
                trigger.fire(operation_id).await;
            })
        })
        .map_err(|e| ScheduleStoreError::Rejected {
            name: entry.name.clone(),
            reason: e.to_string(),
        })?;

        let mut jobs = self.jobs.write().await;

        if let Some(previous) = jobs.remove(&entry.name) {
            debug!("Replacing schedule entry {}", entry.name);
            if let Err(e) = self.scheduler.remove(&previous).await {
                warn!("Failed to remove previous job for {}: {}", entry.name, e);
            }
        }

        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| ScheduleStoreError::Unavailable {
                reason: e.to_string(),
            })?;

        jobs.insert(entry.name.clone(), job_id);
        info!(
            "Scheduled {} for operation {}: '{}' (UTC)",
            entry.name, entry.operation_id, entry.cron
        );
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ScheduleStoreError> {
        let mut jobs = self.jobs.write().await;

        let Some(job_id) = jobs.get(name).copied() else {
            return Err(ScheduleStoreError::NotFound {
                name: name.to_string(),
            });
        };

        self.scheduler
            .remove(&job_id)
            .await
            .map_err(|e| ScheduleStoreError::Unavailable {
                reason: e.to_string(),
            })?;

        jobs.remove(name);
        debug!("Removed schedule entry {}", name);
        Ok(())
    }

    async fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
