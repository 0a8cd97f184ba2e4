//! Test database utilities for in-memory SQLite testing

use orchestrator::database::{Database, Operation, OperationDraft};
use std::sync::Arc;

pub struct TestDatabase;

impl TestDatabase {
    /// Fresh in-memory database with the full schema
    pub async fn new() -> Arc<Database> {
        Arc::new(
            Database::new(":memory:")
                .await
                .expect("in-memory database should initialize"),
        )
    }

    /// Fresh database holding one operation built from `draft`
    pub async fn with_operation(draft: &OperationDraft) -> (Arc<Database>, Operation) {
        let database = Self::new().await;
        let operation = database
            .insert_operation(draft)
            .await
            .expect("operation insert should succeed");
        (database, operation)
    }
}
