//! Integration Tests: Frontend Deployment Pipeline
//!
//! These tests run the deploy and rollback pipelines against scripted
//! sessions that keep a simulated web root per server:
//! - a failed extraction restores the pre-deploy tree on that server only
//! - a failed restart is reported without rollback
//! - the secondary restart and backup pruning never gate success
//! - boundary checks reject requests before any session is opened
//! - a recorded deployment finishes even when its caller goes away

mod common;

use common::fixtures::*;
use orchestrator::config::{Config, Resource};
use orchestrator::database::{OperationStatus, StepStatus};
use orchestrator::deploy::{steps, DeployOptions, DeployPipeline, DeployResult};
use orchestrator::errors::{DeployError, SessionError};
use orchestrator::services::DeploymentService;
use std::sync::Arc;
use std::time::Duration;

const OLD_TREE: [&str; 2] = ["index.html", "app.v1.js"];
const NEW_TREE: [&str; 2] = ["index.html", "app.v2.js"];

struct DeployHarness {
    config: Arc<Config>,
    connector: MockConnector,
    pipeline: DeployPipeline,
}

fn deploy_harness(config: Arc<Config>) -> DeployHarness {
    let connector = MockConnector::new();
    connector.set_package_files(&NEW_TREE);
    let pipeline = DeployPipeline::new(
        config.clone(),
        Arc::new(StaticCredentials),
        Arc::new(connector.clone()),
    );
    DeployHarness {
        config,
        connector,
        pipeline,
    }
}

fn two_servers() -> DeployHarness {
    let harness = deploy_harness(
        TestConfigBuilder::new()
            .with_resource(resources::WEB_1, "web-1", resources::WEB_1_IP)
            .with_resource(resources::WEB_2, "web-2", resources::WEB_2_IP)
            .with_resource(resources::WEB_3, "web-3", resources::WEB_3_IP)
            .build_arc(),
    );
    harness
        .connector
        .set_live_files(resources::WEB_1_IP, &OLD_TREE)
        .set_live_files(resources::WEB_2_IP, &OLD_TREE);
    harness
}

impl DeployHarness {
    fn resource(&self, id: i64) -> Resource {
        self.config.resources[&id].clone()
    }

    fn live(&self, host: &str) -> Vec<String> {
        self.connector.fs(host).live
    }
}

fn tree(files: &[&str]) -> Vec<String> {
    files.iter().map(|f| f.to_string()).collect()
}

fn step_names(result: &DeployResult) -> Vec<&str> {
    result.steps.iter().map(|s| s.step.as_str()).collect()
}

fn step_status(result: &DeployResult, step: &str) -> Option<StepStatus> {
    result.steps.iter().find(|s| s.step == step).map(|s| s.status)
}

#[tokio::test]
async fn test_extract_failure_rolls_back_only_that_server() {
    let h = two_servers();
    h.connector.on_command(
        resources::WEB_2_IP,
        "tar -xzf /tmp/deploy_",
        MockReply::fail(2, "gzip: stdin: not in gzip format"),
    );
    let pkg = site_package(".tar.gz");

    let results = h
        .pipeline
        .deploy(
            pkg.path(),
            &[h.resource(resources::WEB_1), h.resource(resources::WEB_2)],
            DeployOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(!results.iter().all(|r| r.success));

    let (a, b) = (&results[0], &results[1]);
    assert_eq!(a.server, resources::WEB_1_IP);
    assert!(a.success);
    assert_eq!(
        step_names(a),
        vec![
            steps::CONNECT,
            steps::PREPARE_BACKUP_DIR,
            steps::BACKUP,
            steps::PRUNE_BACKUPS,
            steps::UPLOAD,
            steps::EXTRACT,
            steps::RESTART
        ]
    );
    assert_eq!(h.live(resources::WEB_1_IP), tree(&NEW_TREE));

    assert_eq!(b.server, resources::WEB_2_IP);
    assert!(!b.success);
    assert_eq!(b.error.as_deref(), Some("Extract failed"));
    assert_eq!(step_status(b, steps::EXTRACT), Some(StepStatus::Failed));
    assert_eq!(step_status(b, steps::AUTO_ROLLBACK), Some(StepStatus::Success));
    assert_eq!(step_status(b, steps::RESTART), None);
    assert_eq!(h.live(resources::WEB_2_IP), tree(&OLD_TREE));

    assert_eq!(h.connector.closed_count(), 2);
}

#[tokio::test]
async fn test_restart_failure_is_reported_without_rollback() {
    let h = two_servers();
    h.connector.on_command(
        resources::WEB_1_IP,
        "docker-compose restart",
        MockReply::fail(1, "no such service: start_nginx"),
    );
    let pkg = site_package(".zip");

    let results = h
        .pipeline
        .deploy(
            pkg.path(),
            &[h.resource(resources::WEB_1)],
            DeployOptions::default(),
        )
        .await
        .unwrap();

    let result = &results[0];
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Restart failed"));
    assert_eq!(step_status(result, steps::RESTART), Some(StepStatus::Failed));
    assert_eq!(step_status(result, steps::AUTO_ROLLBACK), None);
    assert_eq!(h.live(resources::WEB_1_IP), tree(&NEW_TREE));

    let restart = result
        .steps
        .iter()
        .find(|s| s.step == steps::RESTART)
        .unwrap();
    assert!(restart.message.contains("no such service"));
}

#[tokio::test]
async fn test_secondary_restart_and_prune_failures_do_not_gate() {
    let h = two_servers();
    h.connector
        .on_command(
            resources::WEB_1_IP,
            "systemctl restart keepalived",
            MockReply::fail(5, "Unit keepalived.service not found."),
        )
        .on_command(
            resources::WEB_1_IP,
            "-mtime +3 -delete",
            MockReply::fail(1, "find: permission denied"),
        );
    let pkg = site_package(".tar.gz");

    let results = h
        .pipeline
        .deploy(
            pkg.path(),
            &[h.resource(resources::WEB_1)],
            DeployOptions {
                restart_secondary: true,
            },
        )
        .await
        .unwrap();

    let result = &results[0];
    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(
        step_status(result, steps::PRUNE_BACKUPS),
        Some(StepStatus::Warning)
    );
    assert_eq!(
        step_status(result, steps::RESTART_SECONDARY),
        Some(StepStatus::Failed)
    );
}

#[tokio::test]
async fn test_backup_failure_aborts_before_upload() {
    let h = two_servers();
    h.connector.on_command(
        resources::WEB_1_IP,
        "tar -czf",
        MockReply::fail(2, "No space left on device"),
    );
    let pkg = site_package(".tar.gz");

    let results = h
        .pipeline
        .deploy(
            pkg.path(),
            &[h.resource(resources::WEB_1)],
            DeployOptions::default(),
        )
        .await
        .unwrap();

    let result = &results[0];
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Backup failed, deployment aborted")
    );
    assert!(!h.connector.fs(resources::WEB_1_IP).uploaded);
    assert_eq!(h.live(resources::WEB_1_IP), tree(&OLD_TREE));
}

#[tokio::test]
async fn test_unreachable_server_fails_alone() {
    let h = two_servers();
    h.connector.refuse_connections(
        resources::WEB_2_IP,
        SessionError::ConnectFailed {
            host: resources::WEB_2_IP.to_string(),
            reason: "connection refused".to_string(),
        },
    );
    let pkg = site_package(".tar.gz");

    let results = h
        .pipeline
        .deploy(
            pkg.path(),
            &[h.resource(resources::WEB_1), h.resource(resources::WEB_2)],
            DeployOptions::default(),
        )
        .await
        .unwrap();

    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(
        step_status(&results[1], steps::CONNECT),
        Some(StepStatus::Failed)
    );
    assert!(results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn test_boundary_checks_open_no_sessions() {
    let h = two_servers();
    let pkg = site_package(".tar.gz");
    let all = [
        h.resource(resources::WEB_1),
        h.resource(resources::WEB_2),
        h.resource(resources::WEB_3),
    ];

    let err = h
        .pipeline
        .deploy(pkg.path(), &all, DeployOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DeployError::TooManyTargets {
            requested: 3,
            max: 2
        }
    );

    let err = h
        .pipeline
        .deploy(pkg.path(), &[], DeployOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, DeployError::NoTargets);

    let rar = site_package(".rar");
    let err = h
        .pipeline
        .deploy(rar.path(), &all[..1], DeployOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::UnsupportedPackage { .. }));

    let err = h
        .pipeline
        .deploy(
            std::path::Path::new("/nonexistent/dist.zip"),
            &all[..1],
            DeployOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::PackageMissing { .. }));

    let twice = [h.resource(resources::WEB_1), h.resource(resources::WEB_1)];
    let err = h
        .pipeline
        .deploy(pkg.path(), &twice, DeployOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DeployError::DuplicateTarget {
            resource_id: resources::WEB_1
        }
    );

    let no_marker = write_package(".zip", &[("dist/app/index.html", "<html></html>")]);
    let err = h
        .pipeline
        .deploy(no_marker.path(), &all[..1], DeployOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeployError::InvalidPackage { ref reason, .. } if reason == "package does not contain index.html"
    ));

    let garbage = write_package(".tar.gz", &[]);
    std::fs::write(garbage.path(), b"not gzip").unwrap();
    let err = h
        .pipeline
        .deploy(garbage.path(), &all[..1], DeployOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::InvalidPackage { .. }));

    assert_eq!(h.connector.connection_count(), 0);
}

#[tokio::test]
async fn test_package_root_in_subdirectory_is_deployed() {
    let h = two_servers();
    h.connector.on_command(
        resources::WEB_1_IP,
        "if [ -f",
        MockReply::ok("/tmp/deploy_extract_x/dist/index.html\n"),
    );
    let pkg = write_package(".tar.gz", &[("dist/index.html", "<html></html>")]);

    let results = h
        .pipeline
        .deploy(
            pkg.path(),
            &[h.resource(resources::WEB_1)],
            DeployOptions::default(),
        )
        .await
        .unwrap();

    assert!(results[0].success);
    assert!(h
        .connector
        .commands(resources::WEB_1_IP)
        .iter()
        .any(|c| c.starts_with("cp -a /tmp/deploy_extract_x/dist/. ")));
    assert_eq!(h.live(resources::WEB_1_IP), tree(&NEW_TREE));
}

#[tokio::test]
async fn test_extracted_package_without_marker_rolls_back() {
    let h = two_servers();
    h.connector
        .on_command(resources::WEB_1_IP, "if [ -f", MockReply::ok(""));
    let pkg = site_package(".zip");

    let results = h
        .pipeline
        .deploy(
            pkg.path(),
            &[h.resource(resources::WEB_1)],
            DeployOptions::default(),
        )
        .await
        .unwrap();

    let result = &results[0];
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Extract failed"));
    let extract = result
        .steps
        .iter()
        .find(|s| s.step == steps::EXTRACT)
        .unwrap();
    assert_eq!(extract.status, StepStatus::Failed);
    assert_eq!(extract.message, "Package does not contain index.html");
    assert_eq!(
        step_status(result, steps::AUTO_ROLLBACK),
        Some(StepStatus::Success)
    );
    assert_eq!(step_status(result, steps::RESTART), None);
    assert_eq!(h.live(resources::WEB_1_IP), tree(&OLD_TREE));
    assert!(!h
        .connector
        .commands(resources::WEB_1_IP)
        .iter()
        .any(|c| c.starts_with("cp -a ")));
}

#[tokio::test]
async fn test_abandoned_deploy_request_is_still_recorded() {
    let h = two_servers();
    h.connector
        .on_command(resources::WEB_1_IP, "docker-compose restart", MockReply::Hang);
    let database = TestDatabase::new().await;
    let service = DeploymentService::new(h.config.clone(), database.clone(), h.pipeline.clone());
    let pkg = site_package(".tar.gz");

    // The caller gives up while the restart hangs
    let abandoned = tokio::time::timeout(
        Duration::from_millis(200),
        service.deploy_and_record(
            pkg.path(),
            &[resources::WEB_1],
            DeployOptions::default(),
            None,
        ),
    )
    .await;
    assert!(abandoned.is_err());

    let operations = database.list_operations().await.unwrap();
    assert_eq!(operations.len(), 1);
    let operation_id = operations[0].id;

    let mut operation = operations[0].clone();
    for _ in 0..100 {
        if operation.status != OperationStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        operation = database.get_operation(operation_id).await.unwrap().unwrap();
    }

    assert_eq!(operation.status, OperationStatus::Failed);
    assert_eq!(operation.failure_count, 1);
    assert!(operation
        .last_error
        .as_deref()
        .unwrap()
        .contains("Restart failed"));
    assert_eq!(database.count_executions(operation_id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_non_root_login_runs_commands_under_sudo() {
    let mut config = TestConfigBuilder::new()
        .with_resource(resources::WEB_1, "web-1", resources::WEB_1_IP)
        .build();
    if let Some(resource) = config.resources.get_mut(&resources::WEB_1) {
        resource.ssh_username = "deploy".to_string();
    }
    let h = deploy_harness(Arc::new(config));
    h.connector.set_live_files(resources::WEB_1_IP, &OLD_TREE);
    let pkg = site_package(".tar.gz");

    let results = h
        .pipeline
        .deploy(
            pkg.path(),
            &[h.resource(resources::WEB_1)],
            DeployOptions::default(),
        )
        .await
        .unwrap();

    assert!(results[0].success);
    let commands = h.connector.commands(resources::WEB_1_IP);
    assert!(commands.contains(&"sudo mkdir -p /usr/local/nginx/backup".to_string()));
    assert!(commands
        .iter()
        .any(|c| c.starts_with("sudo sh -c 'cd /usr/local/nginx && docker-compose restart")));
    assert!(commands
        .iter()
        .filter(|c| !c.starts_with("upload "))
        .all(|c| c.starts_with("sudo ")));
}

#[tokio::test]
async fn test_rollback_restores_named_backup() {
    let h = two_servers();
    h.connector.add_backup(
        resources::WEB_1_IP,
        "html_20240101_000000.tar.gz",
        &["index.html", "app.v0.js"],
    );

    let result = h
        .pipeline
        .rollback(
            &h.resource(resources::WEB_1),
            "html_20240101_000000.tar.gz",
            DeployOptions::default(),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(
        step_names(&result),
        vec![
            steps::CONNECT,
            steps::CHECK_BACKUP,
            steps::RESTORE,
            steps::RESTART
        ]
    );
    assert_eq!(
        h.live(resources::WEB_1_IP),
        tree(&["index.html", "app.v0.js"])
    );
}

#[tokio::test]
async fn test_rollback_to_missing_backup_leaves_tree() {
    let h = two_servers();

    let result = h
        .pipeline
        .rollback(
            &h.resource(resources::WEB_1),
            "html_20240101_000000.tar.gz",
            DeployOptions::default(),
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Backup html_20240101_000000.tar.gz not found")
    );
    assert_eq!(h.live(resources::WEB_1_IP), tree(&OLD_TREE));
}

#[tokio::test]
async fn test_rollback_rejects_bad_names_before_connecting() {
    let h = two_servers();

    for name in [
        "../html_20240101_000000.tar.gz",
        "backup/html_20240101_000000.tar.gz",
        "html_latest.tar.gz",
        "html_20240101_000000.tar.gz; reboot",
    ] {
        let err = h
            .pipeline
            .rollback(&h.resource(resources::WEB_1), name, DeployOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::InvalidBackupName { .. }));
    }

    assert_eq!(h.connector.connection_count(), 0);
}

#[tokio::test]
async fn test_list_backups_newest_first() {
    let h = two_servers();
    h.connector
        .add_backup(resources::WEB_1_IP, "html_20240101_000000.tar.gz", &OLD_TREE)
        .add_backup(resources::WEB_1_IP, "html_20240301_120000.zip", &OLD_TREE)
        .add_backup(resources::WEB_1_IP, "notes.txt", &[]);

    let backups = h
        .pipeline
        .list_backups(&h.resource(resources::WEB_1))
        .await
        .unwrap();

    let names: Vec<&str> = backups.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["html_20240301_120000.zip", "html_20240101_000000.tar.gz"]
    );
    assert_eq!(backups[0].size_bytes, 1024);
}
