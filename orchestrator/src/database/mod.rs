//! Database layer for the orchestrator.
//!
//! This module provides SQLite persistence for:
//! - Operations (definition, schedule, status and lifetime counters)
//! - Operation executions (one immutable history row per finished run)
//!
//! The module is organized into submodules:
//! - `records` - All record types (entities)
//! - `operations` - Operation reads, edits and run state transitions
//! - `executions` - Execution history queries

mod executions;
mod operations;
mod records;

pub use records::*;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use tracing::{debug, error, info, warn};

const IN_MEMORY: &str = ":memory:";

pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        info!("=== Starting database initialization ===");
        info!("Database path: {}", database_path);

        let pool = if database_path == IN_MEMORY {
            // A single long-lived connection, otherwise every connection sees its own empty database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?
        } else {
            if let Some(parent) = Path::new(database_path).parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("FAILED to create parent directory {:?}: {}", parent, e);
                    return Err(e.into());
                }
            }

            let database_url = format!("sqlite:{}?mode=rwc", database_path);
            match SqlitePoolOptions::new().connect(&database_url).await {
                Ok(pool) => {
                    info!("Successfully connected to SQLite database");
                    pool
                }
                Err(e) => {
                    error!("FAILED to connect to database: {}", e);
                    error!("   Connection URL: {}", database_url);
                    return Err(e.into());
                }
            }
        };

        let database = Self { pool };

        match database.initialize_tables().await {
            Ok(_) => info!("Database tables initialized successfully"),
            Err(e) => {
                error!("CRITICAL: Database table initialization failed: {}", e);
                return Err(e);
            }
        }

        // STARTUP CLEANUP: runs left RUNNING by a previous process will never reach fan-in
        match database.cleanup_interrupted_runs().await {
            Ok(0) => info!("No interrupted runs found"),
            Ok(cleaned_count) => {
                warn!("Marked {} interrupted runs as failed on startup", cleaned_count)
            }
            Err(e) => {
                error!("Failed to cleanup interrupted runs: {}", e);
                warn!("Continuing with startup despite cleanup failure");
            }
        }

        info!("=== Database initialization completed successfully ===");
        Ok(database)
    }

    async fn initialize_tables(&self) -> Result<()> {
        info!("Step 1: Creating operations table...");
        let operations_table_sql = r#"
            CREATE TABLE IF NOT EXISTS operations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                operation_type TEXT NOT NULL,
                config TEXT NOT NULL,
                target_resources TEXT NOT NULL DEFAULT '[]',
                schedule TEXT,
                enabled BOOLEAN NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'PENDING',
                last_run_at DATETIME,
                execution_count INTEGER NOT NULL DEFAULT 0,
                success_count INTEGER NOT NULL DEFAULT 0,
                failure_count INTEGER NOT NULL DEFAULT 0,
                last_output TEXT,
                last_error TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                created_by TEXT
            )
        "#;

        if let Err(e) = sqlx::query(operations_table_sql)
            .execute(&self.pool)
            .await
        {
            error!("FAILED to create operations table: {}", e);
            return Err(e.into());
        }

        let operations_index_sql =
            "CREATE INDEX IF NOT EXISTS idx_operations_type ON operations(operation_type)";
        if let Err(e) = sqlx::query(operations_index_sql).execute(&self.pool).await {
            error!("FAILED to create operations index: {}", e);
            return Err(e.into());
        }
        info!("operations table created");

        info!("Step 2: Creating operation_executions table...");
        let executions_table_sql = r#"
            CREATE TABLE IF NOT EXISTS operation_executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                operation_id INTEGER NOT NULL REFERENCES operations(id) ON DELETE CASCADE,
                run_id TEXT,
                operation_type TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at DATETIME,
                completed_at DATETIME NOT NULL,
                output TEXT,
                error TEXT,
                steps TEXT NOT NULL DEFAULT '[]',
                input_data TEXT NOT NULL DEFAULT '{}'
            )
        "#;

        if let Err(e) = sqlx::query(executions_table_sql)
            .execute(&self.pool)
            .await
        {
            error!("FAILED to create operation_executions table: {}", e);
            return Err(e.into());
        }

        let executions_index_sql = "CREATE INDEX IF NOT EXISTS idx_executions_operation ON operation_executions(operation_id, completed_at DESC)";
        if let Err(e) = sqlx::query(executions_index_sql).execute(&self.pool).await {
            error!("FAILED to create operation_executions index: {}", e);
            return Err(e.into());
        }
        info!("operation_executions table created");

        Ok(())
    }

    /// Marks operations left RUNNING by a previous process as FAILED and
    /// writes their history row.
    async fn cleanup_interrupted_runs(&self) -> Result<u32> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, last_run_at
            FROM operations
            WHERE status = 'RUNNING'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            debug!("No interrupted runs found");
            return Ok(0);
        }

        let mut cleaned_count = 0u32;

        for row in &rows {
            let operation_id: i64 = row.try_get("id")?;
            let name: String = row.try_get("name")?;

            warn!(
                "Operation {} ('{}') was RUNNING when the previous process stopped",
                operation_id, name
            );

            let completion = RunCompletion {
                operation_id,
                run_id: format!("interrupted-{}", Utc::now().timestamp()),
                status: OperationStatus::Failed,
                success_delta: 0,
                failure_delta: 1,
                output: None,
                error: Some(
                    "Marked as failed during startup cleanup - run was interrupted by a restart"
                        .to_string(),
                ),
                steps: Vec::new(),
                input_data: serde_json::json!({}),
            };

            match self.complete_run(&completion).await {
                Ok(_) => cleaned_count += 1,
                Err(e) => error!("Failed to cleanup operation {}: {}", operation_id, e),
            }
        }

        Ok(cleaned_count)
    }
}
