// File: orchestrator/src/remote/mod.rs
//! Remote session seam.
//!
//! Everything that talks to a managed server goes through [`SessionConnector`]
//! and [`RemoteSession`]. Production uses SSH ([`ssh::SshConnector`]); tests
//! plug in scripted sessions. Timeouts are applied by callers so that the
//! connector implementations stay simple.

pub mod credentials;
pub mod ssh;

pub use credentials::{CredentialResolver, SecretsCredentialResolver};
pub use ssh::SshConnector;

use crate::errors::SessionError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Clone)]
pub enum SshAuth {
    Password(String),
    PrivateKey {
        path: String,
        passphrase: Option<String>,
    },
}

/// Everything needed to open a session to one resource
#[derive(Clone)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SshAuth,
}

impl Credentials {
    pub fn is_root(&self) -> bool {
        self.username == "root"
    }

    /// `sudo`-prefixes a command for non-root users. Compound commands run
    /// under `sudo sh -c` so every part is elevated.
    pub fn privileged(&self, command: &str) -> String {
        if self.is_root() {
            command.to_string()
        } else if command.contains("&&") || command.contains(';') || command.contains('|') {
            format!("sudo sh -c '{}'", command.replace('\'', r"'\''"))
        } else {
            format!("sudo {}", command)
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth = match &self.auth {
            SshAuth::Password(_) => "password",
            SshAuth::PrivateKey { .. } => "private_key",
        };
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth", &auth)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: u32,
    /// Set when either stream was cut at the capture limit
    pub truncated: bool,
}

#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RemoteSession>, SessionError>;
}

#[async_trait]
pub trait RemoteSession: Send {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SessionError>;

    /// Runs a command keeping at most `max_bytes` of each stream.
    /// Implementations that can read incrementally should stop buffering at
    /// the limit instead of relying on this after-the-fact cut.
    async fn exec_capped(
        &mut self,
        command: &str,
        max_bytes: usize,
    ) -> Result<CommandOutput, SessionError> {
        let mut output = self.exec(command).await?;
        let cut_stdout = cap_stream(&mut output.stdout, max_bytes);
        let cut_stderr = cap_stream(&mut output.stderr, max_bytes);
        output.truncated |= cut_stdout || cut_stderr;
        Ok(output)
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), SessionError>;

    async fn close(&mut self);
}

/// Connects with a deadline; an elapsed deadline becomes `ConnectTimeout`.
pub async fn connect_with_timeout(
    connector: &dyn SessionConnector,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<Box<dyn RemoteSession>, SessionError> {
    match tokio::time::timeout(timeout, connector.connect(credentials)).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::ConnectTimeout {
            host: credentials.host.clone(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// Runs one command with a deadline; an elapsed deadline becomes `CommandTimeout`.
pub async fn exec_with_timeout(
    session: &mut dyn RemoteSession,
    host: &str,
    command: &str,
    timeout: Duration,
) -> Result<CommandOutput, SessionError> {
    match tokio::time::timeout(timeout, session.exec(command)).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::CommandTimeout {
            host: host.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// Like [`exec_with_timeout`], with each output stream capped at `max_bytes`.
pub async fn exec_capped_with_timeout(
    session: &mut dyn RemoteSession,
    host: &str,
    command: &str,
    max_bytes: usize,
    timeout: Duration,
) -> Result<CommandOutput, SessionError> {
    match tokio::time::timeout(timeout, session.exec_capped(command, max_bytes)).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::CommandTimeout {
            host: host.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// Truncates `text` to at most `max_bytes` on a char boundary.
/// Returns whether anything was cut.
pub fn cap_stream(text: &mut String, max_bytes: usize) -> bool {
    if text.len() <= max_bytes {
        return false;
    }

    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    true
}
