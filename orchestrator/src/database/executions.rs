//! Execution history queries.

use anyhow::{anyhow, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::records::OperationExecution;
use super::Database;

fn execution_from_row(row: &SqliteRow) -> Result<OperationExecution> {
    let operation_type: String = row.try_get("operation_type")?;
    let status: String = row.try_get("status")?;
    let steps: String = row.try_get("steps")?;
    let input_data: String = row.try_get("input_data")?;

    Ok(OperationExecution {
        id: row.try_get("id")?,
        operation_id: row.try_get("operation_id")?,
        run_id: row.try_get("run_id")?,
        operation_type: operation_type.parse()?,
        status: status.parse()?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        output: row.try_get("output")?,
        error: row.try_get("error")?,
        steps: serde_json::from_str(&steps).map_err(|e| anyhow!("Invalid steps JSON: {}", e))?,
        input_data: serde_json::from_str(&input_data)
            .map_err(|e| anyhow!("Invalid input JSON: {}", e))?,
    })
}

impl Database {
    /// History of one operation, newest first
    pub async fn list_executions(
        &self,
        operation_id: i64,
        limit: i64,
    ) -> Result<Vec<OperationExecution>> {
        let rows = sqlx::query(
            r#"
            SELECT id, operation_id, run_id, operation_type, status, started_at,
                   completed_at, output, error, steps, input_data
            FROM operation_executions
            WHERE operation_id = ?
            ORDER BY completed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(operation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(execution_from_row).collect()
    }

    pub async fn get_execution(&self, execution_id: i64) -> Result<Option<OperationExecution>> {
        let row = sqlx::query(
            r#"
            SELECT id, operation_id, run_id, operation_type, status, started_at,
                   completed_at, output, error, steps, input_data
            FROM operation_executions
            WHERE id = ?
            "#,
        )
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(execution_from_row).transpose()
    }

    pub async fn count_executions(&self, operation_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM operation_executions WHERE operation_id = ?")
                .bind(operation_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
