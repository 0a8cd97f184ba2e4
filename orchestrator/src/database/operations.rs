//! Operation reads, edits and run state transitions.

use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, error};

use super::records::{
    Operation, OperationConfig, OperationDraft, OperationStatus, RunCompletion,
};
use super::Database;

const OPERATION_COLUMNS: &str = r#"
    id, name, description, operation_type, config, target_resources, schedule,
    enabled, status, last_run_at, execution_count, success_count, failure_count,
    last_output, last_error, created_at, updated_at, created_by
"#;

fn operation_from_row(row: &SqliteRow) -> Result<Operation> {
    let operation_type: String = row.try_get("operation_type")?;
    let status: String = row.try_get("status")?;
    let config: String = row.try_get("config")?;
    let targets: String = row.try_get("target_resources")?;

    let config: OperationConfig = serde_json::from_str(&config)
        .map_err(|e| anyhow!("Invalid operation config JSON: {}", e))?;

    Ok(Operation {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        operation_type: operation_type.parse()?,
        config,
        target_resource_ids: serde_json::from_str(&targets)
            .map_err(|e| anyhow!("Invalid target list JSON: {}", e))?,
        schedule: row.try_get("schedule")?,
        enabled: row.try_get("enabled")?,
        status: status.parse()?,
        last_run_at: row.try_get("last_run_at")?,
        execution_count: row.try_get("execution_count")?,
        success_count: row.try_get("success_count")?,
        failure_count: row.try_get("failure_count")?,
        last_output: row.try_get("last_output")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        created_by: row.try_get("created_by")?,
    })
}

impl Database {
    pub async fn get_operation(&self, operation_id: i64) -> Result<Option<Operation>> {
        debug!("Querying operation by ID: {}", operation_id);

        let row = sqlx::query(&format!(
            "SELECT {} FROM operations WHERE id = ?",
            OPERATION_COLUMNS
        ))
        .bind(operation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(operation_from_row).transpose()
    }

    pub async fn list_operations(&self) -> Result<Vec<Operation>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM operations ORDER BY id ASC",
            OPERATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(operation_from_row).collect()
    }

    pub async fn insert_operation(&self, draft: &OperationDraft) -> Result<Operation> {
        let now = Utc::now();
        let config = serde_json::to_string(&draft.config)?;
        let targets = serde_json::to_string(&draft.target_resource_ids)?;

        let result = sqlx::query(
            r#"
            INSERT INTO operations (
                name, description, operation_type, config, target_resources, schedule,
                enabled, status, created_at, updated_at, created_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'PENDING', ?, ?, ?)
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.config.operation_type().as_str())
        .bind(&config)
        .bind(&targets)
        .bind(&draft.schedule)
        .bind(draft.enabled)
        .bind(now)
        .bind(now)
        .bind(&draft.created_by)
        .execute(&self.pool)
        .await?;

        let operation_id = result.last_insert_rowid();
        debug!("Inserted operation {} ('{}')", operation_id, draft.name);

        self.get_operation(operation_id)
            .await?
            .ok_or_else(|| anyhow!("Operation {} vanished after insert", operation_id))
    }

    /// Replaces the editable fields; run state and counters are untouched.
    pub async fn update_operation(
        &self,
        operation_id: i64,
        draft: &OperationDraft,
    ) -> Result<Option<Operation>> {
        let config = serde_json::to_string(&draft.config)?;
        let targets = serde_json::to_string(&draft.target_resource_ids)?;

        let result = sqlx::query(
            r#"
            UPDATE operations
            SET name = ?, description = ?, operation_type = ?, config = ?,
                target_resources = ?, schedule = ?, enabled = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.config.operation_type().as_str())
        .bind(&config)
        .bind(&targets)
        .bind(&draft.schedule)
        .bind(draft.enabled)
        .bind(Utc::now())
        .bind(operation_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_operation(operation_id).await
    }

    pub async fn delete_operation(&self, operation_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM operation_executions WHERE operation_id = ?")
            .bind(operation_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM operations WHERE id = ?")
            .bind(operation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Moves the operation to RUNNING, stamps `last_run_at` and bumps
    /// `execution_count`. Returns the updated row, or `None` if it does not exist.
    pub async fn mark_running(&self, operation_id: i64) -> Result<Option<Operation>> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE operations
            SET status = 'RUNNING',
                last_run_at = ?,
                execution_count = execution_count + 1,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(operation_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_operation(operation_id).await
    }

    /// Terminal write for one run: status, outputs and counter deltas on the
    /// operation plus its history row, in a single transaction. The history
    /// row starts at the operation's `last_run_at`.
    ///
    /// Returns `false` when the operation no longer exists.
    pub async fn complete_run(&self, completion: &RunCompletion) -> Result<bool> {
        if !completion.status.is_terminal() {
            return Err(anyhow!(
                "Cannot complete run {} with non-terminal status {}",
                completion.run_id,
                completion.status
            ));
        }

        let now = Utc::now();
        let steps = serde_json::to_string(&completion.steps)?;
        let input_data = serde_json::to_string(&completion.input_data)?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT operation_type, last_run_at FROM operations WHERE id = ?")
            .bind(completion.operation_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(false);
        };

        let operation_type: String = row.try_get("operation_type")?;
        let started_at: Option<chrono::DateTime<Utc>> = row.try_get("last_run_at")?;

        sqlx::query(
            r#"
            UPDATE operations
            SET status = ?,
                success_count = success_count + ?,
                failure_count = failure_count + ?,
                last_output = ?,
                last_error = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(completion.status.as_str())
        .bind(completion.success_delta)
        .bind(completion.failure_delta)
        .bind(&completion.output)
        .bind(&completion.error)
        .bind(now)
        .bind(completion.operation_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO operation_executions (
                operation_id, run_id, operation_type, status, started_at, completed_at,
                output, error, steps, input_data
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(completion.operation_id)
        .bind(&completion.run_id)
        .bind(&operation_type)
        .bind(completion.status.as_str())
        .bind(started_at)
        .bind(now)
        .bind(&completion.output)
        .bind(&completion.error)
        .bind(&steps)
        .bind(&input_data)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "Run {} of operation {} recorded as {}",
            completion.run_id, completion.operation_id, completion.status
        );
        Ok(true)
    }

    /// Best-effort terminal write used when the regular summarization failed.
    /// Counts the run as one failure and records the error.
    pub async fn force_fail_run(&self, operation_id: i64, run_id: &str, message: &str) -> Result<()> {
        let completion = RunCompletion {
            operation_id,
            run_id: run_id.to_string(),
            status: OperationStatus::Failed,
            success_delta: 0,
            failure_delta: 1,
            output: None,
            error: Some(message.to_string()),
            steps: Vec::new(),
            input_data: serde_json::json!({ "run_id": run_id }),
        };

        match self.complete_run(&completion).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(
                    "Recovery write for run {} of operation {} failed: {}",
                    run_id, operation_id, e
                );
                Err(e)
            }
        }
    }
}
