// File: orchestrator/src/deploy/mod.rs
//! Frontend deployment with backup and rollback.
//!
//! [`DeployPipeline`] walks each target server through backup, upload,
//! extract, and restart. A failed extract restores the backup taken at the
//! start of the same run. Backup naming and listing live in [`backup`], local
//! package inspection in [`package`].

pub mod backup;
pub mod package;
pub mod pipeline;

pub use backup::{validate_backup_name, ArchiveKind, BackupInfo};
pub use pipeline::{steps, DeployOptions, DeployPipeline, DeployResult};
