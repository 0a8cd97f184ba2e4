// File: orchestrator/src/web/mod.rs
pub mod handlers;
pub mod server;

pub use server::{create_router, start_web_server};

use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::dispatch::Dispatcher;
use crate::run_tracker::RunTracker;
use crate::services::{DeploymentService, OperationService};

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub run_tracker: RunTracker,
    pub operation_service: Arc<OperationService>,
    pub deployment_service: Arc<DeploymentService>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        database: Arc<Database>,
        dispatcher: Dispatcher,
        run_tracker: RunTracker,
        operation_service: Arc<OperationService>,
        deployment_service: Arc<DeploymentService>,
    ) -> Self {
        Self {
            config,
            database,
            dispatcher,
            run_tracker,
            operation_service,
            deployment_service,
        }
    }
}
