//! Custom error types for the orchestrator
//!
//! Plumbing (database, config loading, startup) uses `anyhow`; the enums here
//! mark the boundaries where callers need to tell failure kinds apart.

use std::fmt;

/// Cron validation failure naming the offending field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Empty or whitespace-only schedule
    Empty,

    /// Wrong number of whitespace-separated fields
    FieldCount { found: usize },

    /// A field that does not parse or is out of range
    InvalidField { field: &'static str, reason: String },
}

/// Failures reported by a periodic trigger store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleStoreError {
    /// No entry under that name; callers deleting entries may ignore this
    NotFound { name: String },

    /// The store refused the cron expression
    Rejected { name: String, reason: String },

    /// Storage or connectivity failure
    Unavailable { reason: String },
}

/// Failures of the scheduler sync service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The stored schedule does not pass validation
    InvalidSchedule {
        operation_id: i64,
        source: ScheduleError,
    },

    /// The validator accepted the schedule but the store rejected it
    Parity {
        operation_id: i64,
        schedule: String,
        reason: String,
    },

    /// The store could not be reached or written
    Store {
        operation_id: i64,
        source: ScheduleStoreError,
    },
}

/// Credential resolution failure, surfaced to callers as a bad request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    MissingAddress { resource: String },
    MissingCredentials { resource: String },
    UnknownReference { resource: String, reference: String },
}

/// Remote session failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    ConnectFailed { host: String, reason: String },
    ConnectTimeout { host: String, seconds: u64 },
    AuthenticationFailed { host: String },
    CommandTimeout { host: String, seconds: u64 },
    Transport { host: String, reason: String },
    TransferFailed { host: String, reason: String },
}

/// Errors raised at the deployment boundary before any server is touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    NoTargets,
    TooManyTargets { requested: usize, max: usize },
    DuplicateTarget { resource_id: i64 },
    ResourceNotFound { resource_id: i64 },
    UnsupportedPackage { path: String },
    PackageMissing { path: String },
    InvalidPackage { path: String, reason: String },
    InvalidBackupName { name: String },
    Credentials(CredentialError),
    Session(SessionError),
    Remote { server: String, reason: String },
}

/// Errors of the operation service (the edit boundary in front of the store)
#[derive(Debug)]
pub enum OperationError {
    NotFound { operation_id: i64 },
    InvalidSchedule(ScheduleError),
    NoTargets,
    /// The row was committed but the trigger store could not be updated
    SavedButNotScheduled {
        operation_id: i64,
        source: SchedulerError,
    },
    /// Removing the trigger failed, so the row was kept
    SchedulerUnavailable {
        operation_id: i64,
        source: SchedulerError,
    },
    Storage(anyhow::Error),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::Empty => write!(f, "Schedule string cannot be empty"),
            ScheduleError::FieldCount { found } => write!(
                f,
                "Invalid cron format: must have 5 fields (minute hour day_of_month month day_of_week), got {}",
                found
            ),
            ScheduleError::InvalidField { field, reason } => {
                write!(f, "Invalid cron field '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for ScheduleStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStoreError::NotFound { name } => write!(f, "Schedule entry '{}' not found", name),
            ScheduleStoreError::Rejected { name, reason } => {
                write!(f, "Schedule entry '{}' rejected: {}", name, reason)
            }
            ScheduleStoreError::Unavailable { reason } => {
                write!(f, "Schedule store unavailable: {}", reason)
            }
        }
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::InvalidSchedule {
                operation_id,
                source,
            } => write!(f, "Operation {} has an invalid schedule: {}", operation_id, source),
            SchedulerError::Parity {
                operation_id,
                schedule,
                reason,
            } => write!(
                f,
                "Operation {} schedule '{}' passed validation but was rejected by the trigger store: {}",
                operation_id, schedule, reason
            ),
            SchedulerError::Store {
                operation_id,
                source,
            } => write!(f, "Failed to sync operation {} with the scheduler: {}", operation_id, source),
        }
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::MissingAddress { resource } => {
                write!(f, "Resource '{}' has no IP address configured", resource)
            }
            CredentialError::MissingCredentials { resource } => write!(
                f,
                "Resource '{}' has no stored SSH credentials, cannot connect",
                resource
            ),
            CredentialError::UnknownReference {
                resource,
                reference,
            } => write!(
                f,
                "Resource '{}' references unknown credential '{}'",
                resource, reference
            ),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ConnectFailed { host, reason } => {
                write!(f, "Connection to {} failed: {}", host, reason)
            }
            SessionError::ConnectTimeout { host, seconds } => {
                write!(f, "Connection to {} timed out after {}s", host, seconds)
            }
            SessionError::AuthenticationFailed { host } => {
                write!(f, "Authentication failed for {}", host)
            }
            SessionError::CommandTimeout { host, seconds } => {
                write!(f, "Command timed out on {} after {}s", host, seconds)
            }
            SessionError::Transport { host, reason } => {
                write!(f, "SSH error on {}: {}", host, reason)
            }
            SessionError::TransferFailed { host, reason } => {
                write!(f, "File transfer to {} failed: {}", host, reason)
            }
        }
    }
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::NoTargets => write!(f, "Deployment requires at least one target resource"),
            DeployError::TooManyTargets { requested, max } => write!(
                f,
                "Deployment targets {} resources, at most {} are allowed",
                requested, max
            ),
            DeployError::DuplicateTarget { resource_id } => {
                write!(f, "Resource {} is targeted more than once", resource_id)
            }
            DeployError::ResourceNotFound { resource_id } => {
                write!(f, "Resource {} not found", resource_id)
            }
            DeployError::UnsupportedPackage { path } => write!(
                f,
                "Unsupported package '{}': only .zip and .tar.gz files are supported",
                path
            ),
            DeployError::PackageMissing { path } => write!(f, "Package '{}' does not exist", path),
            DeployError::InvalidPackage { path, reason } => {
                write!(f, "Invalid package '{}': {}", path, reason)
            }
            DeployError::InvalidBackupName { name } => write!(f, "Invalid backup name '{}'", name),
            DeployError::Credentials(e) => write!(f, "{}", e),
            DeployError::Session(e) => write!(f, "{}", e),
            DeployError::Remote { server, reason } => {
                write!(f, "Remote command failed on {}: {}", server, reason)
            }
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::NotFound { operation_id } => {
                write!(f, "Operation {} not found", operation_id)
            }
            OperationError::InvalidSchedule(e) => write!(f, "{}", e),
            OperationError::NoTargets => write!(f, "Operation requires at least one target resource"),
            OperationError::SavedButNotScheduled {
                operation_id,
                source,
            } => write!(
                f,
                "Operation {} saved but failed to schedule: {}",
                operation_id, source
            ),
            OperationError::SchedulerUnavailable {
                operation_id,
                source,
            } => write!(
                f,
                "Failed to remove operation {} from scheduler: {}",
                operation_id, source
            ),
            OperationError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ScheduleError {}
impl std::error::Error for ScheduleStoreError {}
impl std::error::Error for SchedulerError {}
impl std::error::Error for CredentialError {}
impl std::error::Error for SessionError {}
impl std::error::Error for DeployError {}
impl std::error::Error for OperationError {}

impl From<CredentialError> for DeployError {
    fn from(err: CredentialError) -> Self {
        DeployError::Credentials(err)
    }
}

impl From<SessionError> for DeployError {
    fn from(err: SessionError) -> Self {
        DeployError::Session(err)
    }
}

impl From<ScheduleError> for OperationError {
    fn from(err: ScheduleError) -> Self {
        OperationError::InvalidSchedule(err)
    }
}

impl From<anyhow::Error> for OperationError {
    fn from(err: anyhow::Error) -> Self {
        OperationError::Storage(err)
    }
}
