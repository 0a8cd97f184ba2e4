//! Common test data and constants

use orchestrator::database::{OperationConfig, OperationDraft};
use std::collections::BTreeMap;

/// Common test resources (id, name, address)
pub mod resources {
    pub const WEB_1: i64 = 1;
    pub const WEB_2: i64 = 2;
    pub const WEB_3: i64 = 3;
    pub const UNKNOWN: i64 = 99;

    pub const WEB_1_IP: &str = "10.0.0.1";
    pub const WEB_2_IP: &str = "10.0.0.2";
    pub const WEB_3_IP: &str = "10.0.0.3";
}

/// Common scripts
pub mod scripts {
    pub const ECHO_OK: &str = "echo ok";
    pub const DISK_USAGE: &str = "df -h /";
}

/// Common cron schedules
pub mod schedules {
    pub const EVERY_FIVE_MINUTES: &str = "*/5 * * * *";
    pub const NIGHTLY: &str = "0 3 * * *";
}

pub fn script_draft(name: &str, script: &str, targets: Vec<i64>) -> OperationDraft {
    OperationDraft {
        name: name.to_string(),
        description: None,
        config: OperationConfig::ScriptExec {
            script: script.to_string(),
            parameters: BTreeMap::new(),
        },
        target_resource_ids: targets,
        schedule: None,
        enabled: true,
        created_by: Some("tests".to_string()),
    }
}

pub fn scheduled_draft(name: &str, schedule: &str, targets: Vec<i64>) -> OperationDraft {
    OperationDraft {
        schedule: Some(schedule.to_string()),
        ..script_draft(name, scripts::ECHO_OK, targets)
    }
}
