//! Central repository for timeouts, limits, and configuration defaults
//!
//! Constants are grouped by the component that consumes them so that the
//! config layer and the services agree on a single source of truth.

use std::time::Duration;

/// Remote session limits used by the script executor
pub mod remote {
    use super::Duration;

    /// Time allowed to open and authenticate a session
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Time allowed for a single script run
    pub const EXEC_TIMEOUT: Duration = Duration::from_secs(300);

    /// Per-stream capture cap (stdout and stderr are capped independently)
    pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

    /// Upper bound on sessions open at the same time across all dispatches
    pub const MAX_CONCURRENT_SESSIONS: usize = 32;

    /// Default SSH port when the inventory does not carry one
    pub const DEFAULT_SSH_PORT: u16 = 22;

    /// Default SSH user when the inventory does not carry one
    pub const DEFAULT_SSH_USER: &str = "root";
}

/// Frontend deployment layout on target servers
pub mod deploy {
    pub const BASE_DIR: &str = "/usr/local/nginx";
    pub const LIVE_DIR_NAME: &str = "html";
    pub const BACKUP_DIR: &str = "/usr/local/nginx/backup";
    pub const BACKUP_PREFIX: &str = "html";

    /// Backups older than this many days are pruned after a fresh backup
    pub const BACKUP_RETENTION_DAYS: u32 = 3;

    /// File that marks the root of a frontend package
    pub const MARKER_FILE: &str = "index.html";

    pub const RESTART_COMMAND: &str = "cd /usr/local/nginx && docker-compose restart start_nginx";
    pub const SECONDARY_RESTART_COMMAND: &str = "systemctl restart keepalived";

    /// HA pairs: a deployment never targets more servers than this
    pub const MAX_SERVERS: usize = 2;

    /// Timestamp layout embedded in backup names
    pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// Remote scratch area for uploads and extraction
    pub const REMOTE_TMP_DIR: &str = "/tmp";
}

/// Cleanup constants
pub mod cleanup {
    /// Runs tracked in memory longer than this are considered stuck
    pub const RUN_CLEANUP_HOURS: i64 = 6;

    /// Cleanup interval in seconds
    pub const CLEANUP_INTERVAL_SECONDS: u64 = 3600;
}

/// Service defaults
pub mod defaults {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8095;
    pub const DATABASE_PATH: &str = "data/operations.db";
    pub const SECRETS_PATH: &str = "config/secrets.toml";
}

/// Names used for entries in the periodic trigger store
pub mod scheduler {
    pub const ENTRY_PREFIX: &str = "operation-";
}
