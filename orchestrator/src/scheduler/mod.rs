//! Cron-based scheduling of script operations
//!
//! This module keeps periodic triggers in step with the operations table:
//! - `cron` validates the five-field expressions administrators write
//! - `store` is the trigger registry (tokio-cron-scheduler in production)
//! - `sync` reconciles one operation, or all of them at startup
//!
//! # Features
//!
//! - **Five-field cron**: `minute hour day_of_month month day_of_week`,
//!   converted to the seconds-first dialect of the underlying scheduler
//! - **UTC**: all schedules are evaluated in UTC
//! - **Idempotent sync**: every sync deletes the entry before deciding whether
//!   to recreate it, so disabled or unscheduled operations never keep firing
//!
//! Entries are named `operation-{id}` and fire `Dispatcher::dispatch(id)`.

pub mod cron;
pub mod store;
pub mod sync;

pub use cron::validate_cron;
pub use store::{CronScheduleStore, DispatchTrigger, ScheduleEntry, ScheduleStore};
pub use sync::{SchedulerSync, SyncFailure, SyncOutcome, SyncReport};
