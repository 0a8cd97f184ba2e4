// File: orchestrator/src/dispatch/executor.rs
use super::{ResourceRunStatus, SingleResourceResult};
use crate::config::{Config, Resource};
use crate::database::Database;
use crate::errors::SessionError;
use crate::remote::{
    connect_with_timeout, exec_capped_with_timeout, CredentialResolver, SessionConnector,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

/// Runs an operation's script on one resource. Never fails: every problem
/// ends up in a failed `SingleResourceResult`.
#[derive(Clone)]
pub struct RemoteExecutor {
    config: Arc<Config>,
    database: Arc<Database>,
    credentials: Arc<dyn CredentialResolver>,
    connector: Arc<dyn SessionConnector>,
    sessions: Arc<Semaphore>,
}

impl RemoteExecutor {
    pub fn new(
        config: Arc<Config>,
        database: Arc<Database>,
        credentials: Arc<dyn CredentialResolver>,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        let permits = config.execution.max_concurrent_sessions.max(1);
        Self {
            config,
            database,
            credentials,
            connector,
            sessions: Arc::new(Semaphore::new(permits)),
        }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, operation_id: i64, resource_id: i64) -> SingleResourceResult {
        let script = match self.database.get_operation(operation_id).await {
            Ok(Some(operation)) => operation.script().unwrap_or_default().to_string(),
            Ok(None) => {
                warn!("Operation {} vanished before resource {} ran", operation_id, resource_id);
                return SingleResourceResult::failed(
                    resource_id,
                    format!("Operation {} not found", operation_id),
                );
            }
            Err(e) => {
                error!("Database error loading operation {}: {}", operation_id, e);
                return SingleResourceResult::failed(resource_id, format!("Database error: {}", e));
            }
        };

        let Some(resource) = self.config.resources.get(&resource_id) else {
            return SingleResourceResult::failed(
                resource_id,
                format!("Resource {} not found", resource_id),
            );
        };

        self.run_script(resource, &script).await
    }

    async fn run_script(&self, resource: &Resource, script: &str) -> SingleResourceResult {
        let mut output = format!(
            "--- Resource: {} ({}) ---\n",
            resource.name,
            resource.ip_address.as_deref().unwrap_or("no address")
        );

        let credentials = match self.credentials.resolve(resource) {
            Ok(credentials) => credentials,
            Err(e) => {
                error!("Credential resolution failed for {}: {}", resource.name, e);
                let _ = writeln!(output, "Execution Error: {}", e);
                return SingleResourceResult::failed(resource.id, output);
            }
        };

        // Held for the whole session, bounds open sessions across all runs
        let _permit = match self.sessions.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                let _ = writeln!(output, "Execution Error: session pool closed: {}", e);
                return SingleResourceResult::failed(resource.id, output);
            }
        };

        let mut session = match connect_with_timeout(
            self.connector.as_ref(),
            &credentials,
            self.config.execution.connect_timeout(),
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                error!("{}", describe_session_error(&resource.name, &e));
                let _ = writeln!(
                    output,
                    "Execution Error: {}",
                    describe_session_error(&resource.name, &e)
                );
                return SingleResourceResult::failed(resource.id, output);
            }
        };

        let max_output = self.config.execution.max_output_bytes;
        let exec_result = exec_capped_with_timeout(
            session.as_mut(),
            &credentials.host,
            script,
            max_output,
            self.config.execution.exec_timeout(),
        )
        .await;

        session.close().await;

        let command = match exec_result {
            Ok(command) => command,
            Err(e) => {
                error!("{}", describe_session_error(&resource.name, &e));
                let _ = writeln!(
                    output,
                    "Execution Error: {}",
                    describe_session_error(&resource.name, &e)
                );
                return SingleResourceResult::failed(resource.id, output);
            }
        };

        let truncated = command.truncated;

        let _ = writeln!(output, "STDOUT:\n{}", command.stdout);
        if !command.stderr.is_empty() {
            let _ = writeln!(output, "STDERR:\n{}", command.stderr);
        }
        if truncated {
            let _ = writeln!(output, "[output truncated to {} bytes per stream]", max_output);
        }
        let _ = writeln!(output, "Exit Code: {}", command.exit_code);

        let status = if command.exit_code == 0 {
            ResourceRunStatus::Success
        } else {
            ResourceRunStatus::Failed
        };

        debug!(
            "Resource {} finished with exit code {}",
            resource.name, command.exit_code
        );
        info!("Script on {} finished: {:?}", resource.name, status);

        SingleResourceResult {
            resource_id: resource.id,
            status,
            output,
            exit_code: Some(command.exit_code),
            truncated,
        }
    }
}

fn describe_session_error(resource_name: &str, error: &SessionError) -> String {
    match error {
        SessionError::AuthenticationFailed { .. } => {
            format!("Authentication failed for resource {}", resource_name)
        }
        SessionError::ConnectTimeout { seconds, .. } => format!(
            "Connection timed out for resource {} after {}s",
            resource_name, seconds
        ),
        SessionError::CommandTimeout { seconds, .. } => format!(
            "Command timed out for resource {} after {}s",
            resource_name, seconds
        ),
        SessionError::Transport { reason, .. } => {
            format!("SSH error for resource {}: {}", resource_name, reason)
        }
        other => format!(
            "Failed to execute task on resource {}: {}",
            resource_name, other
        ),
    }
}
