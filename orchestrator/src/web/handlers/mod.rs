//! HTTP request handlers for the orchestrator API.
//!
//! This module is organized by domain:
//! - `common` - Response envelope and error mapping
//! - `operations` - Operation lookup, execute-now and run history
//! - `deploy` - Frontend deployment, backups and rollback
//! - `scheduler` - Trigger store maintenance

pub mod common;
pub mod deploy;
pub mod operations;
pub mod scheduler;

pub use deploy::*;
pub use operations::*;
pub use scheduler::*;
