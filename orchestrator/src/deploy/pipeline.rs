// File: orchestrator/src/deploy/pipeline.rs
use super::backup::{self, ArchiveKind, BackupInfo};
use super::package::inspect_package;
use crate::config::{Config, DeploySettings, Resource};
use crate::database::{StepLog, StepStatus};
use crate::errors::DeployError;
use crate::remote::{
    connect_with_timeout, exec_with_timeout, CredentialResolver, Credentials, RemoteSession,
    SessionConnector,
};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub mod steps {
    pub const CONNECT: &str = "connect";
    pub const PREPARE_BACKUP_DIR: &str = "prepare_backup_dir";
    pub const BACKUP: &str = "backup";
    pub const PRUNE_BACKUPS: &str = "prune_backups";
    pub const UPLOAD: &str = "upload";
    pub const EXTRACT: &str = "extract";
    pub const AUTO_ROLLBACK: &str = "auto_rollback";
    pub const CHECK_BACKUP: &str = "check_backup";
    pub const RESTORE: &str = "restore";
    pub const RESTART: &str = "restart";
    pub const RESTART_SECONDARY: &str = "restart_secondary";
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeployOptions {
    #[serde(default)]
    pub restart_secondary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResult {
    pub server: String,
    pub resource_id: i64,
    pub success: bool,
    pub steps: Vec<StepLog>,
    pub error: Option<String>,
}

/// Multi-step frontend deployment and rollback over remote sessions.
/// Servers are handled concurrently and independently.
#[derive(Clone)]
pub struct DeployPipeline {
    config: Arc<Config>,
    credentials: Arc<dyn CredentialResolver>,
    connector: Arc<dyn SessionConnector>,
}

/// One open session plus the step log for one server
struct ServerRun {
    server: String,
    resource_id: i64,
    credentials: Credentials,
    session: Box<dyn RemoteSession>,
    exec_timeout: Duration,
    steps: Vec<StepLog>,
}

impl ServerRun {
    fn log(&mut self, step: &str, status: StepStatus, message: impl Into<String>) {
        let message = message.into();
        match status {
            StepStatus::Failed => error!("[Deploy:{}] {}: {}", self.server, step, message),
            StepStatus::Warning => warn!("[Deploy:{}] {}: {}", self.server, step, message),
            StepStatus::Success => info!("[Deploy:{}] {}: ok {}", self.server, step, message),
        }
        self.steps.push(StepLog {
            server: self.server.clone(),
            step: step.to_string(),
            status,
            message,
        });
    }

    /// Runs a privileged command; non-zero exit is an error carrying stderr (or stdout)
    async fn run(&mut self, command: &str) -> Result<String, String> {
        let command = self.credentials.privileged(command);
        let output = exec_with_timeout(
            self.session.as_mut(),
            &self.credentials.host,
            &command,
            self.exec_timeout,
        )
        .await
        .map_err(|e| e.to_string())?;

        let stdout = output.stdout.trim().to_string();
        if output.exit_code != 0 {
            let stderr = output.stderr.trim();
            let detail = if stderr.is_empty() { stdout.as_str() } else { stderr };
            return Err(format!("Command failed (exit {}): {}", output.exit_code, detail));
        }
        Ok(stdout)
    }

    fn finish(self, success: bool, error: Option<&str>) -> (DeployResult, Box<dyn RemoteSession>) {
        let result = DeployResult {
            server: self.server,
            resource_id: self.resource_id,
            success,
            steps: self.steps,
            error: error.map(str::to_string),
        };
        (result, self.session)
    }
}

fn server_label(resource: &Resource) -> String {
    resource
        .ip_address
        .clone()
        .filter(|ip| !ip.trim().is_empty())
        .unwrap_or_else(|| resource.name.clone())
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn restore_command(settings: &DeploySettings, backup_name: &str) -> String {
    let archive = format!("{}/{}", settings.backup_dir, backup_name);
    match ArchiveKind::from_path(backup_name) {
        Some(ArchiveKind::Zip) => format!("unzip -o {} -d {}", archive, settings.base_dir),
        _ => format!("tar -xzf {} -C {}", archive, settings.base_dir),
    }
}

impl DeployPipeline {
    pub fn new(
        config: Arc<Config>,
        credentials: Arc<dyn CredentialResolver>,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        Self {
            config,
            credentials,
            connector,
        }
    }

    fn settings(&self) -> &DeploySettings {
        &self.config.deploy
    }

    /// Target and package checks shared by every deploy entrypoint
    pub async fn check_request(
        &self,
        package: &Path,
        resource_ids: &[i64],
    ) -> Result<ArchiveKind, DeployError> {
        if resource_ids.is_empty() {
            return Err(DeployError::NoTargets);
        }
        let max = self.settings().max_servers;
        if resource_ids.len() > max {
            return Err(DeployError::TooManyTargets {
                requested: resource_ids.len(),
                max,
            });
        }
        let mut seen = HashSet::new();
        if let Some(&resource_id) = resource_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(DeployError::DuplicateTarget { resource_id });
        }

        let package_str = package.display().to_string();
        let kind = ArchiveKind::from_path(&package_str).ok_or_else(|| {
            DeployError::UnsupportedPackage {
                path: package_str.clone(),
            }
        })?;
        if tokio::fs::metadata(package).await.is_err() {
            return Err(DeployError::PackageMissing { path: package_str });
        }

        let path = package.to_path_buf();
        let marker = self.settings().marker_file.clone();
        tokio::task::spawn_blocking(move || inspect_package(&path, kind, &marker))
            .await
            .map_err(|e| DeployError::InvalidPackage {
                path: package_str,
                reason: format!("inspection aborted: {}", e),
            })??;

        Ok(kind)
    }

    /// Deploys the package to every resource concurrently. Boundary checks
    /// (targets, package format, package contents) fail the whole call;
    /// everything after that is reported per server.
    #[instrument(skip(self, resources), fields(servers = resources.len()))]
    pub async fn deploy(
        &self,
        package: &Path,
        resources: &[Resource],
        options: DeployOptions,
    ) -> Result<Vec<DeployResult>, DeployError> {
        let ids: Vec<i64> = resources.iter().map(|r| r.id).collect();
        let kind = self.check_request(package, &ids).await?;

        let tasks: Vec<_> = resources
            .iter()
            .map(|resource| {
                let pipeline = self.clone();
                let resource = resource.clone();
                let package = package.to_path_buf();
                tokio::spawn(async move { pipeline.deploy_single(&package, kind, &resource, options).await })
            })
            .collect();

        let results = join_all(tasks).await;

        Ok(results
            .into_iter()
            .zip(resources)
            .map(|(joined, resource)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("Deploy task for {} panicked: {}", resource.name, e);
                    DeployResult {
                        server: server_label(resource),
                        resource_id: resource.id,
                        success: false,
                        steps: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect())
    }

    async fn open(&self, resource: &Resource) -> Result<ServerRun, DeployResult> {
        let server = server_label(resource);
        let fail = |message: String| DeployResult {
            server: server.clone(),
            resource_id: resource.id,
            success: false,
            steps: vec![StepLog {
                server: server.clone(),
                step: steps::CONNECT.to_string(),
                status: StepStatus::Failed,
                message: message.clone(),
            }],
            error: Some(message),
        };

        let credentials = self
            .credentials
            .resolve(resource)
            .map_err(|e| fail(e.to_string()))?;

        let session = connect_with_timeout(
            self.connector.as_ref(),
            &credentials,
            self.config.execution.connect_timeout(),
        )
        .await
        .map_err(|e| fail(e.to_string()))?;

        let mut run = ServerRun {
            server: server.clone(),
            resource_id: resource.id,
            credentials,
            session,
            exec_timeout: self.config.execution.exec_timeout(),
            steps: Vec::new(),
        };
        run.log(steps::CONNECT, StepStatus::Success, "");
        Ok(run)
    }

    async fn deploy_single(
        &self,
        package: &Path,
        kind: ArchiveKind,
        resource: &Resource,
        options: DeployOptions,
    ) -> DeployResult {
        let mut run = match self.open(resource).await {
            Ok(run) => run,
            Err(result) => return result,
        };

        let (success, error) = self.deploy_steps(&mut run, package, kind, options).await;
        let (result, mut session) = run.finish(success, error.as_deref());
        session.close().await;
        result
    }

    async fn deploy_steps(
        &self,
        run: &mut ServerRun,
        package: &Path,
        kind: ArchiveKind,
        options: DeployOptions,
    ) -> (bool, Option<String>) {
        let s = self.settings();
        let live_dir = s.live_dir();

        // 1. Backup directory
        match run.run(&format!("mkdir -p {}", s.backup_dir)).await {
            Ok(_) => run.log(steps::PREPARE_BACKUP_DIR, StepStatus::Success, s.backup_dir.clone()),
            Err(e) => {
                run.log(steps::PREPARE_BACKUP_DIR, StepStatus::Failed, e);
                return (false, Some("Backup directory unavailable, deployment aborted".to_string()));
            }
        }

        // 2. Snapshot the live tree
        let backup_name = backup::backup_name(&s.backup_prefix, Utc::now());
        let backup_cmd = format!(
            "tar -czf {}/{} -C {} {}/",
            s.backup_dir, backup_name, s.base_dir, s.live_dir_name
        );
        match run.run(&backup_cmd).await {
            Ok(_) => run.log(steps::BACKUP, StepStatus::Success, backup_name.clone()),
            Err(e) => {
                run.log(steps::BACKUP, StepStatus::Failed, e);
                return (false, Some("Backup failed, deployment aborted".to_string()));
            }
        }

        // 3. Prune old archives, never fatal
        let prune_cmd = format!(
            "find {} -name '{}_*.tar.gz' -mtime +{} -delete",
            s.backup_dir, s.backup_prefix, s.backup_retention_days
        );
        match run.run(&prune_cmd).await {
            Ok(_) => run.log(steps::PRUNE_BACKUPS, StepStatus::Success, ""),
            Err(e) => run.log(steps::PRUNE_BACKUPS, StepStatus::Warning, e),
        }

        // 4. Upload
        let remote_package = format!("{}/deploy_{}.pkg", s.remote_tmp_dir, short_id());
        let upload = tokio::time::timeout(
            run.exec_timeout,
            run.session.upload(package, &remote_package),
        )
        .await;
        match upload {
            Ok(Ok(())) => run.log(steps::UPLOAD, StepStatus::Success, remote_package.clone()),
            Ok(Err(e)) => {
                run.log(steps::UPLOAD, StepStatus::Failed, e.to_string());
                return (false, Some("Upload failed".to_string()));
            }
            Err(_) => {
                run.log(
                    steps::UPLOAD,
                    StepStatus::Failed,
                    format!("Upload timed out after {}s", run.exec_timeout.as_secs()),
                );
                return (false, Some("Upload failed".to_string()));
            }
        }

        // 5. Replace the live tree, restoring the snapshot on failure
        let extract_dir = format!("{}/deploy_extract_{}", s.remote_tmp_dir, short_id());
        let extracted = self
            .extract(run, kind, &remote_package, &extract_dir, &live_dir)
            .await;

        if let Err(e) = run
            .run(&format!("rm -rf {} {}", extract_dir, remote_package))
            .await
        {
            warn!("[Deploy:{}] failed to remove temporary files: {}", run.server, e);
        }

        match extracted {
            Ok(()) => run.log(steps::EXTRACT, StepStatus::Success, ""),
            Err(e) => {
                run.log(steps::EXTRACT, StepStatus::Failed, e);
                let restore = format!("rm -rf {}/* && {}", live_dir, restore_command(s, &backup_name));
                match run.run(&restore).await {
                    Ok(_) => run.log(
                        steps::AUTO_ROLLBACK,
                        StepStatus::Success,
                        format!("Rolled back to {}", backup_name),
                    ),
                    Err(e) => run.log(
                        steps::AUTO_ROLLBACK,
                        StepStatus::Failed,
                        format!("Rollback failed, manual intervention required: {}", e),
                    ),
                }
                return (false, Some("Extract failed".to_string()));
            }
        }

        // 6. Restart the serving process, no rollback on failure
        match run.run(&s.restart_command).await {
            Ok(_) => run.log(steps::RESTART, StepStatus::Success, ""),
            Err(e) => {
                run.log(steps::RESTART, StepStatus::Failed, e);
                return (false, Some("Restart failed".to_string()));
            }
        }

        // 7. Secondary HA process, never gates
        if options.restart_secondary {
            self.restart_secondary(run).await;
        }

        (true, None)
    }

    async fn extract(
        &self,
        run: &mut ServerRun,
        kind: ArchiveKind,
        remote_package: &str,
        extract_dir: &str,
        live_dir: &str,
    ) -> Result<(), String> {
        let marker = &self.settings().marker_file;

        run.run(&format!("rm -rf {}/*", live_dir)).await?;

        match kind {
            ArchiveKind::Zip => {
                run.run(&format!("unzip -o {} -d {}", remote_package, extract_dir))
                    .await?;
            }
            ArchiveKind::TarGz => {
                run.run(&format!("mkdir -p {}", extract_dir)).await?;
                run.run(&format!("tar -xzf {} -C {}", remote_package, extract_dir))
                    .await?;
            }
        }

        // Package root is the archive root or its first subdirectory holding the marker
        let detect = format!(
            "if [ -f {dir}/{marker} ]; then echo root; else ls -d {dir}/*/{marker} 2>/dev/null | head -1; fi",
            dir = extract_dir,
            marker = marker
        );
        let found = run.run(&detect).await?;
        let source = if found == "root" {
            extract_dir.to_string()
        } else if let Some(dir) = found.strip_suffix(&format!("/{}", marker)) {
            dir.to_string()
        } else {
            return Err(format!("Package does not contain {}", marker));
        };

        run.run(&format!("cp -a {}/. {}/", source, live_dir)).await?;
        Ok(())
    }

    async fn restart_secondary(&self, run: &mut ServerRun) {
        let command = self.settings().secondary_restart_command.clone();
        match run.run(&command).await {
            Ok(_) => run.log(steps::RESTART_SECONDARY, StepStatus::Success, ""),
            Err(e) => run.log(steps::RESTART_SECONDARY, StepStatus::Failed, e),
        }
    }

    /// Restores a named backup on one server, then restarts.
    /// The name is validated before any session is opened.
    #[instrument(skip(self, resource), fields(resource_id = resource.id))]
    pub async fn rollback(
        &self,
        resource: &Resource,
        backup_name: &str,
        options: DeployOptions,
    ) -> Result<DeployResult, DeployError> {
        backup::validate_backup_name(backup_name, &self.settings().backup_prefix)?;

        let mut run = match self.open(resource).await {
            Ok(run) => run,
            Err(result) => return Ok(result),
        };

        let (success, error) = self.rollback_steps(&mut run, backup_name, options).await;
        let (result, mut session) = run.finish(success, error.as_deref());
        session.close().await;
        Ok(result)
    }

    async fn rollback_steps(
        &self,
        run: &mut ServerRun,
        backup_name: &str,
        options: DeployOptions,
    ) -> (bool, Option<String>) {
        let s = self.settings();

        if let Err(e) = run
            .run(&format!("test -f {}/{}", s.backup_dir, backup_name))
            .await
        {
            run.log(steps::CHECK_BACKUP, StepStatus::Failed, e);
            return (false, Some(format!("Backup {} not found", backup_name)));
        }
        run.log(steps::CHECK_BACKUP, StepStatus::Success, backup_name);

        let restore = format!("rm -rf {}/* && {}", s.live_dir(), restore_command(s, backup_name));
        match run.run(&restore).await {
            Ok(_) => run.log(steps::RESTORE, StepStatus::Success, backup_name),
            Err(e) => {
                run.log(steps::RESTORE, StepStatus::Failed, e);
                return (false, Some("Restore failed".to_string()));
            }
        }

        let restart_ok = match run.run(&s.restart_command).await {
            Ok(_) => {
                run.log(steps::RESTART, StepStatus::Success, "");
                true
            }
            Err(e) => {
                run.log(steps::RESTART, StepStatus::Failed, e);
                false
            }
        };

        if options.restart_secondary {
            self.restart_secondary(run).await;
        }

        if restart_ok {
            (true, None)
        } else {
            (false, Some("Restart failed".to_string()))
        }
    }

    /// Backups on one server, newest first
    pub async fn list_backups(&self, resource: &Resource) -> Result<Vec<BackupInfo>, DeployError> {
        let s = self.settings();
        let credentials = self.credentials.resolve(resource)?;

        let mut session = connect_with_timeout(
            self.connector.as_ref(),
            &credentials,
            self.config.execution.connect_timeout(),
        )
        .await?;

        let command = credentials.privileged(&backup::list_command(&s.backup_dir, &s.backup_prefix));
        let output = exec_with_timeout(
            session.as_mut(),
            &credentials.host,
            &command,
            self.config.execution.exec_timeout(),
        )
        .await;
        session.close().await;

        let output = output?;
        if output.exit_code != 0 {
            return Err(DeployError::Remote {
                server: server_label(resource),
                reason: format!(
                    "Listing backups failed (exit {}): {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }

        Ok(backup::parse_listing(&output.stdout, &s.backup_prefix))
    }
}
