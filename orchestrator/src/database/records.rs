//! Database record types (entities).
//!
//! This module contains all the record structs used by the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Operation entities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    ScriptExec,
    FrontendDeploy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

/// Type-specific operation configuration, stored as JSON in `operations.config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationConfig {
    ScriptExec {
        script: String,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
    FrontendDeploy {
        #[serde(default)]
        restart_secondary: bool,
        #[serde(default)]
        filename: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub operation_type: OperationType,
    pub config: OperationConfig,
    pub target_resource_ids: Vec<i64>, // Ordered, dispatch preserves this order
    pub schedule: Option<String>,
    pub enabled: bool,
    pub status: OperationStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub execution_count: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_output: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// Fields accepted when creating or editing an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDraft {
    pub name: String,
    pub description: Option<String>,
    pub config: OperationConfig,
    pub target_resource_ids: Vec<i64>,
    pub schedule: Option<String>,
    pub enabled: bool,
    pub created_by: Option<String>,
}

/// Immutable history row, exactly one per finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationExecution {
    pub id: i64,
    pub operation_id: i64,
    pub run_id: Option<String>,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub steps: Vec<StepLog>,
    pub input_data: serde_json::Value,
}

/// Terminal write applied by the aggregator or the deploy recorder
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub operation_id: i64,
    pub run_id: String,
    pub status: OperationStatus,
    pub success_delta: i64,
    pub failure_delta: i64,
    pub output: Option<String>,
    pub error: Option<String>,
    pub steps: Vec<StepLog>,
    pub input_data: serde_json::Value,
}

// ============================================================================
// Deployment step logs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLog {
    pub server: String,
    pub step: String,
    pub status: StepStatus,
    pub message: String,
}

// ============================================================================
// Text conversions for the TEXT columns
// ============================================================================

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::ScriptExec => "SCRIPT_EXEC",
            OperationType::FrontendDeploy => "FRONTEND_DEPLOY",
        }
    }
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::Running => "RUNNING",
            OperationStatus::Success => "SUCCESS",
            OperationStatus::Failed => "FAILED",
            OperationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Success | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }
}

impl OperationConfig {
    pub fn operation_type(&self) -> OperationType {
        match self {
            OperationConfig::ScriptExec { .. } => OperationType::ScriptExec,
            OperationConfig::FrontendDeploy { .. } => OperationType::FrontendDeploy,
        }
    }
}

impl Operation {
    /// Script body for script operations, `None` for deployments
    pub fn script(&self) -> Option<&str> {
        match &self.config {
            OperationConfig::ScriptExec { script, .. } => Some(script.as_str()),
            OperationConfig::FrontendDeploy { .. } => None,
        }
    }

    /// Non-blank cron expression, if any
    pub fn cron_schedule(&self) -> Option<&str> {
        self.schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCRIPT_EXEC" => Ok(OperationType::ScriptExec),
            "FRONTEND_DEPLOY" => Ok(OperationType::FrontendDeploy),
            other => Err(anyhow::anyhow!("Unknown operation type: {}", other)),
        }
    }
}

impl FromStr for OperationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OperationStatus::Pending),
            "RUNNING" => Ok(OperationStatus::Running),
            "SUCCESS" => Ok(OperationStatus::Success),
            "FAILED" => Ok(OperationStatus::Failed),
            "CANCELLED" => Ok(OperationStatus::Cancelled),
            other => Err(anyhow::anyhow!("Unknown operation status: {}", other)),
        }
    }
}
