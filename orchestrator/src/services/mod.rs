// File: orchestrator/src/services/mod.rs

pub mod deployment_service;
pub mod operation_service;

pub use deployment_service::{DeploymentReport, DeploymentService};
pub use operation_service::OperationService;
