// File: orchestrator/src/deploy/backup.rs
//! Backup naming, validation and listing parsing.
//!
//! Backups live in the remote backup directory as
//! `{prefix}_{YYYYMMDD_HHMMSS}.tar.gz` (or `.zip`). Names reach the remote
//! shell during rollback, so anything that does not match the pattern exactly
//! is rejected before a session is opened.

use crate::constants::deploy::BACKUP_TIMESTAMP_FORMAT;
use crate::errors::DeployError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const BACKUP_EXTENSIONS: [&str; 2] = ["tar.gz", "zip"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupInfo {
    pub name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Archive format of a backup or upload package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    pub fn from_path(path: &str) -> Option<Self> {
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if path.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }
}

/// Name for a fresh backup taken at `at`
pub fn backup_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.tar.gz", prefix, at.format(BACKUP_TIMESTAMP_FORMAT))
}

/// Checks `name` against `{prefix}_{YYYYMMDD_HHMMSS}.{tar.gz|zip}` and
/// returns the embedded timestamp.
pub fn validate_backup_name(name: &str, prefix: &str) -> Result<DateTime<Utc>, DeployError> {
    let invalid = || DeployError::InvalidBackupName {
        name: name.to_string(),
    };

    if name.contains('/') || name.contains("..") || name.contains('\\') {
        return Err(invalid());
    }

    let rest = name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(invalid)?;

    let stamp = BACKUP_EXTENSIONS
        .iter()
        .find_map(|ext| rest.strip_suffix(ext).and_then(|s| s.strip_suffix('.')))
        .ok_or_else(invalid)?;

    parse_stamp(stamp).ok_or_else(invalid)
}

fn parse_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    let bytes = stamp.as_bytes();
    // chrono accepts unpadded fields, the layout is checked by hand first
    if bytes.len() != 15 || bytes[8] != b'_' {
        return None;
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 8 || b.is_ascii_digit())
    {
        return None;
    }

    NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// Shell command printing `path size mtime` for every backup in `backup_dir`
pub fn list_command(backup_dir: &str, prefix: &str) -> String {
    format!(
        "find '{}' -maxdepth 1 -type f \\( -name '{}_*.tar.gz' -o -name '{}_*.zip' \\) | xargs -r stat -c '%n %s %Y'",
        backup_dir, prefix, prefix
    )
}

/// Parses `list_command` output into backups, newest name first.
/// Lines whose file name is not a valid backup name are skipped.
pub fn parse_listing(output: &str, prefix: &str) -> Vec<BackupInfo> {
    let mut backups = Vec::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let name = parts[0].rsplit('/').next().unwrap_or(parts[0]).to_string();
        let Ok(created_at) = validate_backup_name(&name, prefix) else {
            continue;
        };

        backups.push(BackupInfo {
            name,
            size_bytes: parts[1].parse::<u64>().unwrap_or(0),
            created_at,
        });
    }

    backups.sort_by(|a, b| b.name.cmp(&a.name));
    backups
}
