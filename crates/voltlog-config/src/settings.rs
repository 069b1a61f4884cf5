//! Validated settings

use crate::schema::{RawAlertConfig, RawConfig, RawExportConfig, RawServiceConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use voltlog_api::{BatteryType, ExportFormat};

/// Default health bucket threshold
pub const DEFAULT_MAX_CYCLES: u32 = 200;

/// Validated settings ready for use by the service
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub health: HealthSettings,
    pub alerts: AlertSettings,
    pub export: ExportSettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceSettings::from_raw(raw.service),
            health: HealthSettings {
                max_cycles: raw.health.max_cycles.unwrap_or(DEFAULT_MAX_CYCLES),
            },
            alerts: AlertSettings::from_raw(raw.alerts),
            export: ExportSettings::from_raw(raw.export),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub data_dir: PathBuf,
    pub log_level: String,
}

impl ServiceSettings {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(voltlog_util::default_data_dir),
            log_level: raw.log_level.unwrap_or_else(|| "info".to_string()),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HealthSettings {
    /// Cycle count treated as end of life; always > 0
    pub max_cycles: u32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

/// Thresholds used when evaluating battery alerts
#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub discharge_days_warning: u32,
    pub health_warning_threshold: u8,
    pub maintenance_interval_days: u32,
    pub maintenance_interval_cycles: u32,
    overrides: HashMap<BatteryType, u32>,
}

impl AlertSettings {
    fn from_raw(raw: RawAlertConfig) -> Self {
        let defaults = Self::default();
        let overrides = raw
            .recommended_max_cycles
            .iter()
            .filter_map(|(key, cycles)| Some((key.parse::<BatteryType>().ok()?, *cycles)))
            .collect();

        Self {
            discharge_days_warning: raw
                .discharge_days_warning
                .unwrap_or(defaults.discharge_days_warning),
            health_warning_threshold: raw
                .health_warning_threshold
                .map(|v| v.min(100) as u8)
                .unwrap_or(defaults.health_warning_threshold),
            maintenance_interval_days: raw
                .maintenance_interval_days
                .unwrap_or(defaults.maintenance_interval_days),
            maintenance_interval_cycles: raw
                .maintenance_interval_cycles
                .unwrap_or(defaults.maintenance_interval_cycles),
            overrides,
        }
    }

    /// Recommended maximum cycles for a battery chemistry
    pub fn recommended_max_cycles(&self, battery_type: BatteryType) -> u32 {
        if let Some(cycles) = self.overrides.get(&battery_type) {
            return *cycles;
        }
        match battery_type {
            BatteryType::Lipo => 300,
            BatteryType::LiIon => 500,
            BatteryType::Nimh => 800,
            BatteryType::Life => 1500,
            BatteryType::Other => 400,
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            discharge_days_warning: 7,
            health_warning_threshold: 20,
            maintenance_interval_days: 90,
            maintenance_interval_cycles: 50,
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExportSettings {
    pub format: ExportFormat,
    pub include_history: bool,
}

impl ExportSettings {
    fn from_raw(raw: RawExportConfig) -> Self {
        Self {
            format: raw
                .format
                .and_then(|f| f.parse().ok())
                .unwrap_or_default(),
            include_history: raw.include_history.unwrap_or(true),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Json,
            include_history: true,
        }
    }
}
