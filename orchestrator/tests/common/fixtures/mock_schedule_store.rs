//! In-memory schedule store and dispatch trigger for testing

use async_trait::async_trait;
use orchestrator::errors::ScheduleStoreError;
use orchestrator::scheduler::{DispatchTrigger, ScheduleEntry, ScheduleStore};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Schedule store that keeps entries in a map and can be told to fail
#[derive(Default)]
pub struct MemoryScheduleStore {
    entries: Mutex<BTreeMap<String, ScheduleEntry>>,
    create_error: Mutex<Option<ScheduleStoreError>>,
    delete_error: Mutex<Option<ScheduleStoreError>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `create` fails with `error`
    pub fn fail_next_create(&self, error: ScheduleStoreError) {
        *self.create_error.lock().unwrap() = Some(error);
    }

    /// The next `delete` of an existing or missing entry fails with `error`
    pub fn fail_next_delete(&self, error: ScheduleStoreError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    pub fn entry(&self, name: &str) -> Option<ScheduleEntry> {
        self.entries.lock().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Fires the named entry the way the cron scheduler would
    pub async fn fire(&self, name: &str) -> bool {
        let Some(entry) = self.entry(name) else {
            return false;
        };
        entry.trigger.fire(entry.operation_id).await;
        true
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn create(&self, entry: ScheduleEntry) -> Result<(), ScheduleStoreError> {
        if let Some(error) = self.create_error.lock().unwrap().take() {
            return Err(error);
        }
        self.entries.lock().unwrap().insert(entry.name.clone(), entry);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ScheduleStoreError> {
        if let Some(error) = self.delete_error.lock().unwrap().take() {
            return Err(error);
        }
        match self.entries.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(ScheduleStoreError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn entry_names(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

/// Trigger that records the operation ids it was fired for
#[derive(Default)]
pub struct RecordingTrigger {
    fired: Mutex<Vec<i64>>,
}

impl RecordingTrigger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fired(&self) -> Vec<i64> {
        self.fired.lock().unwrap().clone()
    }
}

#[async_trait]
impl DispatchTrigger for RecordingTrigger {
    async fn fire(&self, operation_id: i64) {
        self.fired.lock().unwrap().push(operation_id);
    }
}
