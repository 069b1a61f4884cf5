//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Storage and logging
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Health bucket threshold
    #[serde(default)]
    pub health: RawHealthConfig,

    /// Alert thresholds
    #[serde(default)]
    pub alerts: RawAlertConfig,

    /// Export defaults
    #[serde(default)]
    pub export: RawExportConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Directory holding the database
    pub data_dir: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawHealthConfig {
    /// Cycle count at which a battery is considered worn out
    pub max_cycles: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAlertConfig {
    /// Days a battery may stay discharged before an alert
    pub discharge_days_warning: Option<u32>,

    /// Health percentage at or below which an alert is raised
    pub health_warning_threshold: Option<u32>,

    /// Days between recommended maintenance checks
    pub maintenance_interval_days: Option<u32>,

    /// Cycles between recommended maintenance checks
    pub maintenance_interval_cycles: Option<u32>,

    /// Recommended maximum cycles, keyed by battery type ("lipo", "li_ion", ...)
    #[serde(default)]
    pub recommended_max_cycles: HashMap<String, u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawExportConfig {
    /// "json" or "csv"
    pub format: Option<String>,

    /// Include each battery's history in JSON exports
    pub include_history: Option<bool>,
}
