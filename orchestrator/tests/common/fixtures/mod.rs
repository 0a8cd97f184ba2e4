//! This module provides reusable test utilities:
//! - Scripted remote sessions with a simulated web root per host
//! - In-memory schedule store and recording dispatch trigger
//! - Test configuration builders and static credentials
//! - In-memory test databases
//! - Upload packages written as real archives
//! - Common test data

// Allow unused code in test fixtures - not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_schedule_store;
pub mod mock_session;
pub mod test_config;
pub mod test_data;
pub mod test_database;
pub mod test_package;

// Re-export commonly used items
pub use mock_schedule_store::{MemoryScheduleStore, RecordingTrigger};
pub use mock_session::{MockConnector, MockReply};
pub use test_config::{StaticCredentials, TestConfigBuilder};
pub use test_data::*;
pub use test_database::TestDatabase;
pub use test_package::{site_package, write_package, SITE_FILES};
