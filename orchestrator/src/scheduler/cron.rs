// File: orchestrator/src/scheduler/cron.rs
//! Five-field cron validation (minute hour day-of-month month day-of-week).
//!
//! The trigger store runs a seconds-first dialect, so accepted expressions are
//! converted with [`to_six_field`] before they are registered.

use crate::errors::ScheduleError;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    // First value the `names` table maps to
    names_base: u32,
    allows_question_mark: bool,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec {
        name: "minute",
        min: 0,
        max: 59,
        names: &[],
        names_base: 0,
        allows_question_mark: false,
    },
    FieldSpec {
        name: "hour",
        min: 0,
        max: 23,
        names: &[],
        names_base: 0,
        allows_question_mark: false,
    },
    FieldSpec {
        name: "day_of_month",
        min: 1,
        max: 31,
        names: &[],
        names_base: 0,
        allows_question_mark: true,
    },
    FieldSpec {
        name: "month",
        min: 1,
        max: 12,
        names: &MONTH_NAMES,
        names_base: 1,
        allows_question_mark: false,
    },
    FieldSpec {
        name: "day_of_week",
        min: 0,
        max: 7,
        names: &WEEKDAY_NAMES,
        names_base: 0,
        allows_question_mark: true,
    },
];

/// Validates a five-field cron expression.
pub fn validate_cron(schedule: &str) -> Result<(), ScheduleError> {
    let trimmed = schedule.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::Empty);
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() != FIELDS.len() {
        return Err(ScheduleError::FieldCount { found: parts.len() });
    }

    for (part, spec) in parts.iter().zip(FIELDS.iter()) {
        validate_cron_field(part, spec).map_err(|reason| ScheduleError::InvalidField {
            field: spec.name,
            reason,
        })?;
    }

    Ok(())
}

/// Prefixes a zero seconds field. Callers validate first.
pub fn to_six_field(schedule: &str) -> String {
    let parts: Vec<&str> = schedule.split_whitespace().collect();
    format!("0 {}", parts.join(" "))
}

fn validate_cron_field(field: &str, spec: &FieldSpec) -> Result<(), String> {
    if field.is_empty() {
        return Err("empty value".to_string());
    }

    for item in field.split(',') {
        validate_list_item(item, spec)?;
    }

    Ok(())
}

fn validate_list_item(item: &str, spec: &FieldSpec) -> Result<(), String> {
    if item.is_empty() {
        return Err("empty list element".to_string());
    }

    if item == "?" {
        if spec.allows_question_mark {
            return Ok(());
        }
        return Err("'?' is only allowed in day_of_month and day_of_week".to_string());
    }

    // A bare value with a step (`5/15`) means "starting at 5"
    let base = match item.split_once('/') {
        Some((base, step_str)) => {
            let step = step_str
                .parse::<u32>()
                .map_err(|_| format!("invalid step value '{}'", step_str))?;
            if step == 0 {
                return Err("step value cannot be 0".to_string());
            }
            if step > spec.max {
                return Err(format!(
                    "step value {} exceeds maximum {}",
                    step, spec.max
                ));
            }
            base
        }
        None => item,
    };

    if base == "*" {
        return Ok(());
    }

    if let Some((start, end)) = base.split_once('-') {
        let start = parse_value(start, spec)?;
        let end = parse_value(end, spec)?;
        if start > end {
            return Err(format!("range {}-{} has start greater than end", start, end));
        }
        return Ok(());
    }

    parse_value(base, spec)?;
    Ok(())
}

fn parse_value(raw: &str, spec: &FieldSpec) -> Result<u32, String> {
    let value = match raw.parse::<u32>() {
        Ok(value) => value,
        Err(_) => {
            let lower = raw.to_ascii_lowercase();
            let index = spec
                .names
                .iter()
                .position(|name| *name == lower)
                .ok_or_else(|| format!("invalid value '{}'", raw))?;
            index as u32 + spec.names_base
        }
    };

    if value < spec.min || value > spec.max {
        return Err(format!(
            "value {} is outside valid range {}-{}",
            value, spec.min, spec.max
        ));
    }

    Ok(value)
}
