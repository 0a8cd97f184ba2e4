// File: orchestrator/src/remote/ssh.rs
use super::{cap_stream, CommandOutput, Credentials, RemoteSession, SessionConnector, SshAuth};
use crate::errors::SessionError;
use async_ssh2_tokio::client::{AuthMethod, Client, ServerCheckMethod};
use async_trait::async_trait;
use russh::ChannelMsg;
use std::path::Path;
use tracing::{debug, warn};

/// Opens SSH sessions with async-ssh2-tokio
#[derive(Debug, Default, Clone)]
pub struct SshConnector;

impl SshConnector {
    pub fn new() -> Self {
        Self
    }
}

pub struct SshSession {
    client: Client,
    host: String,
}

#[async_trait]
impl SessionConnector for SshConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RemoteSession>, SessionError> {
        debug!(
            "Establishing SSH connection to {}@{}:{}",
            credentials.username, credentials.host, credentials.port
        );

        let auth_method = match &credentials.auth {
            SshAuth::Password(password) => AuthMethod::with_password(password),
            SshAuth::PrivateKey { path, passphrase } => {
                AuthMethod::with_key_file(path, passphrase.as_deref())
            }
        };

        let client = Client::connect(
            (credentials.host.as_str(), credentials.port),
            &credentials.username,
            auth_method,
            ServerCheckMethod::NoCheck,
        )
        .await
        .map_err(|e| match e {
            async_ssh2_tokio::Error::PasswordWrong | async_ssh2_tokio::Error::KeyAuthFailed => {
                SessionError::AuthenticationFailed {
                    host: credentials.host.clone(),
                }
            }
            other => SessionError::ConnectFailed {
                host: credentials.host.clone(),
                reason: other.to_string(),
            },
        })?;

        debug!("SSH connection established to {}", credentials.host);

        Ok(Box::new(SshSession {
            client,
            host: credentials.host.clone(),
        }))
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        debug!("Executing command on {}: {} chars", self.host, command.len());

        let result = self
            .client
            .execute(command)
            .await
            .map_err(|e| SessionError::Transport {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code: result.exit_status,
            truncated: false,
        })
    }

    async fn exec_capped(
        &mut self,
        command: &str,
        max_bytes: usize,
    ) -> Result<CommandOutput, SessionError> {
        debug!(
            "Executing capped command on {}: {} chars, {} bytes per stream",
            self.host,
            command.len(),
            max_bytes
        );

        let transport = |e: &dyn std::fmt::Display| SessionError::Transport {
            host: self.host.clone(),
            reason: e.to_string(),
        };

        let mut channel = self.client.get_channel().await.map_err(|e| transport(&e))?;
        channel.exec(true, command).await.map_err(|e| transport(&e))?;

        let mut stdout = CappedBuffer::new(max_bytes);
        let mut stderr = CappedBuffer::new(max_bytes);
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.push(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => stderr.push(data),
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                _ => {}
            }
        }

        let exit_code = exit_code.ok_or_else(|| SessionError::Transport {
            host: self.host.clone(),
            reason: "channel closed without an exit status".to_string(),
        })?;

        let (stdout, cut_stdout) = stdout.into_string();
        let (stderr, cut_stderr) = stderr.into_string();

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
            truncated: cut_stdout || cut_stderr,
        })
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<(), SessionError> {
        debug!("Uploading {} to {}:{}", local.display(), self.host, remote);

        self.client
            .upload_file(local, remote)
            .await
            .map_err(|e| SessionError::TransferFailed {
                host: self.host.clone(),
                reason: e.to_string(),
            })
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("Failed to close SSH session to {}: {}", self.host, e);
        }
    }
}

/// Keeps the first `limit` bytes of a stream and drops the rest as it arrives.
struct CappedBuffer {
    bytes: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl CappedBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            overflowed: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.overflowed = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    /// Decodes lossily; a multi-byte char split at the limit is trimmed off.
    fn into_string(self) -> (String, bool) {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        let mut truncated = self.overflowed;
        if self.overflowed {
            if let Some(tail) = text.strip_suffix('\u{FFFD}') {
                text.truncate(tail.len());
            }
        }
        truncated |= cap_stream(&mut text, self.limit);
        (text, truncated)
    }
}
