// File: orchestrator/src/config/mod.rs
pub mod manager;
pub mod secrets;

use crate::constants::{defaults, deploy, remote};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use manager::ConfigManager;
pub use secrets::{CredentialSecret, SecretsLoader};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_secrets_path")]
    pub secrets_path: String,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub deploy: DeploySettings,
    // Populated from the inventory files next to main.toml
    #[serde(skip)]
    pub resources: HashMap<i64, Resource>,
}

/// Limits applied to every remote script run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_seconds: u64,
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,
    #[serde(default = "default_max_sessions")]
    pub max_concurrent_sessions: usize,
}

/// Remote layout and commands used by the frontend deployment pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
    #[serde(default = "default_live_dir_name")]
    pub live_dir_name: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    #[serde(default = "default_backup_prefix")]
    pub backup_prefix: String,
    #[serde(default = "default_retention_days")]
    pub backup_retention_days: u32,
    #[serde(default = "default_marker_file")]
    pub marker_file: String,
    #[serde(default = "default_restart_command")]
    pub restart_command: String,
    #[serde(default = "default_secondary_restart_command")]
    pub secondary_restart_command: String,
    #[serde(default = "default_max_servers")]
    pub max_servers: usize,
    #[serde(default = "default_remote_tmp_dir")]
    pub remote_tmp_dir: String,
}

/// Inventory record for one managed server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_ssh_user")]
    pub ssh_username: String,
    #[serde(default)]
    pub credential_ref: Option<String>,
}

/// Shape of an inventory file (`config/<group>.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryFile {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl ExecutionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_seconds)
    }
}

impl DeploySettings {
    pub fn live_dir(&self) -> String {
        format!("{}/{}", self.base_dir.trim_end_matches('/'), self.live_dir_name)
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout(),
            exec_timeout_seconds: default_exec_timeout(),
            max_output_bytes: default_max_output(),
            max_concurrent_sessions: default_max_sessions(),
        }
    }
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            live_dir_name: default_live_dir_name(),
            backup_dir: default_backup_dir(),
            backup_prefix: default_backup_prefix(),
            backup_retention_days: default_retention_days(),
            marker_file: default_marker_file(),
            restart_command: default_restart_command(),
            secondary_restart_command: default_secondary_restart_command(),
            max_servers: default_max_servers(),
            remote_tmp_dir: default_remote_tmp_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            secrets_path: default_secrets_path(),
            execution: ExecutionSettings::default(),
            deploy: DeploySettings::default(),
            resources: HashMap::new(),
        }
    }
}

fn default_host() -> String {
    defaults::HOST.to_string()
}

fn default_port() -> u16 {
    defaults::PORT
}

fn default_database_path() -> String {
    defaults::DATABASE_PATH.to_string()
}

fn default_secrets_path() -> String {
    defaults::SECRETS_PATH.to_string()
}

fn default_connect_timeout() -> u64 {
    remote::CONNECT_TIMEOUT.as_secs()
}

fn default_exec_timeout() -> u64 {
    remote::EXEC_TIMEOUT.as_secs()
}

fn default_max_output() -> usize {
    remote::MAX_OUTPUT_BYTES
}

fn default_max_sessions() -> usize {
    remote::MAX_CONCURRENT_SESSIONS
}

fn default_ssh_port() -> u16 {
    remote::DEFAULT_SSH_PORT
}

fn default_ssh_user() -> String {
    remote::DEFAULT_SSH_USER.to_string()
}

fn default_base_dir() -> String {
    deploy::BASE_DIR.to_string()
}

fn default_live_dir_name() -> String {
    deploy::LIVE_DIR_NAME.to_string()
}

fn default_backup_dir() -> String {
    deploy::BACKUP_DIR.to_string()
}

fn default_backup_prefix() -> String {
    deploy::BACKUP_PREFIX.to_string()
}

fn default_retention_days() -> u32 {
    deploy::BACKUP_RETENTION_DAYS
}

fn default_marker_file() -> String {
    deploy::MARKER_FILE.to_string()
}

fn default_restart_command() -> String {
    deploy::RESTART_COMMAND.to_string()
}

fn default_secondary_restart_command() -> String {
    deploy::SECONDARY_RESTART_COMMAND.to_string()
}

fn default_max_servers() -> usize {
    deploy::MAX_SERVERS
}

fn default_remote_tmp_dir() -> String {
    deploy::REMOTE_TMP_DIR.to_string()
}
