// File: orchestrator/src/main.rs
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use orchestrator::constants::cleanup;
use orchestrator::remote::{
    CredentialResolver, SecretsCredentialResolver, SessionConnector, SshConnector,
};
use orchestrator::scheduler::{DispatchTrigger, ScheduleStore};
use orchestrator::web::{start_web_server, AppState};
use orchestrator::{
    Aggregator, ConfigManager, CronScheduleStore, Database, DeployPipeline, DeploymentService,
    Dispatcher, OperationService, RemoteExecutor, RunTracker, SchedulerSync, SecretsLoader,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with reduced verbosity
    let env_filter = EnvFilter::from_default_env()
        .add_directive("orchestrator=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting Fleet Operation Orchestrator");

    // Load configuration
    let config_manager = ConfigManager::new("config".to_string()).await?;
    let config = config_manager.get_current_config();
    info!(
        "Configuration loaded: {} resources, max {} concurrent sessions",
        config.resources.len(),
        config.execution.max_concurrent_sessions
    );

    let secrets = Arc::new(SecretsLoader::load(Path::new(&config.secrets_path))?);

    // Initialize database (interrupted runs are failed here)
    let database = Arc::new(Database::new(&config.database_path).await?);
    info!("Database initialized");

    let credentials: Arc<dyn CredentialResolver> =
        Arc::new(SecretsCredentialResolver::new(secrets));
    let connector: Arc<dyn SessionConnector> = Arc::new(SshConnector::default());

    let run_tracker = RunTracker::new();
    let executor = RemoteExecutor::new(
        config.clone(),
        database.clone(),
        credentials.clone(),
        connector.clone(),
    );
    let aggregator = Arc::new(Aggregator::new(database.clone()));
    let dispatcher = Dispatcher::new(
        database.clone(),
        executor,
        aggregator,
        run_tracker.clone(),
    );
    info!("Dispatcher initialized");

    // Rebuild schedule entries from stored operations before the scheduler ticks
    let schedule_store = Arc::new(CronScheduleStore::new().await?);
    let trigger: Arc<dyn DispatchTrigger> = Arc::new(dispatcher.clone());
    let store: Arc<dyn ScheduleStore> = schedule_store.clone();
    let scheduler_sync = Arc::new(SchedulerSync::new(store, trigger));

    let operations = database.list_operations().await?;
    let report = scheduler_sync.sync_all(&operations).await;
    if !report.failures.is_empty() {
        warn!(
            "{} operations could not be scheduled at startup",
            report.failures.len()
        );
    }

    schedule_store.start().await?;
    info!("Scheduler started with {} entries", report.scheduled);

    // Start periodic run cleanup
    let run_tracker_clone = run_tracker.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            cleanup::CLEANUP_INTERVAL_SECONDS,
        ));
        loop {
            interval.tick().await;
            let cleaned = run_tracker_clone
                .cleanup_old_runs(cleanup::RUN_CLEANUP_HOURS)
                .await;
            if cleaned > 0 {
                warn!(
                    "Cleaned up {} stuck runs older than {} hours",
                    cleaned,
                    cleanup::RUN_CLEANUP_HOURS
                );
            }
        }
    });

    let operation_service = Arc::new(OperationService::new(
        database.clone(),
        scheduler_sync.clone(),
    ));
    let pipeline = DeployPipeline::new(config.clone(), credentials, connector);
    let deployment_service = Arc::new(DeploymentService::new(
        config.clone(),
        database.clone(),
        pipeline,
    ));

    let state = AppState::new(
        config,
        database,
        dispatcher,
        run_tracker,
        operation_service,
        deployment_service,
    );

    // Start web server
    start_web_server(state).await?;

    Ok(())
}
