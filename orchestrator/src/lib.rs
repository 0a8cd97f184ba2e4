pub mod config;
pub mod constants;
pub mod database;
pub mod deploy;
pub mod dispatch;
pub mod errors;
pub mod remote;
pub mod run_tracker;
pub mod scheduler;
pub mod services;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigManager, Resource, SecretsLoader};
pub use database::Database;
pub use deploy::DeployPipeline;
pub use dispatch::{Aggregator, Dispatcher, RemoteExecutor};
pub use run_tracker::RunTracker;
pub use scheduler::{CronScheduleStore, SchedulerSync};
pub use services::{DeploymentService, OperationService};
