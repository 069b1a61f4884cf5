//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;
use voltlog_api::{BatteryType, ExportFormat};

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("{field} must be at most {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Unknown battery type in recommended_max_cycles: {0}")]
    UnknownBatteryType(String),

    #[error("Unknown export format: {0}")]
    UnknownExportFormat(String),

    #[error("Unknown log level: {0}")]
    UnknownLogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(level) = &config.service.log_level
        && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
    {
        errors.push(ValidationError::UnknownLogLevel(level.clone()));
    }

    if config.health.max_cycles == Some(0) {
        errors.push(ValidationError::MustBePositive {
            field: "health.max_cycles",
        });
    }

    let alerts = &config.alerts;
    if let Some(value) = alerts.health_warning_threshold
        && value > 100
    {
        errors.push(ValidationError::OutOfRange {
            field: "alerts.health_warning_threshold",
            value,
            max: 100,
        });
    }
    if alerts.maintenance_interval_days == Some(0) {
        errors.push(ValidationError::MustBePositive {
            field: "alerts.maintenance_interval_days",
        });
    }
    if alerts.maintenance_interval_cycles == Some(0) {
        errors.push(ValidationError::MustBePositive {
            field: "alerts.maintenance_interval_cycles",
        });
    }

    let mut keys: Vec<&String> = alerts.recommended_max_cycles.keys().collect();
    keys.sort();
    for key in keys {
        if key.parse::<BatteryType>().is_err() {
            errors.push(ValidationError::UnknownBatteryType(key.clone()));
        } else if alerts.recommended_max_cycles[key] == 0 {
            errors.push(ValidationError::MustBePositive {
                field: "alerts.recommended_max_cycles",
            });
        }
    }

    if let Some(format) = &config.export.format
        && format.parse::<ExportFormat>().is_err()
    {
        errors.push(ValidationError::UnknownExportFormat(format.clone()));
    }

    errors
}
