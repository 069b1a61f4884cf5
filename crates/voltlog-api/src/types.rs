//! Enumerations shared across the battery model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unrecognized enumeration text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

/// Battery chemistry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryType {
    Lipo,
    LiIon,
    Nimh,
    Life,
    Other,
}

impl BatteryType {
    pub const ALL: [BatteryType; 5] = [
        BatteryType::Lipo,
        BatteryType::LiIon,
        BatteryType::Nimh,
        BatteryType::Life,
        BatteryType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryType::Lipo => "LIPO",
            BatteryType::LiIon => "LI_ION",
            BatteryType::Nimh => "NIMH",
            BatteryType::Life => "LIFE",
            BatteryType::Other => "OTHER",
        }
    }

    /// Health percentage lost per completed cycle
    pub fn cycle_wear(&self) -> f64 {
        match self {
            BatteryType::Lipo => 0.25,
            BatteryType::LiIon => 0.15,
            BatteryType::Nimh => 0.10,
            BatteryType::Life => 0.05,
            BatteryType::Other => 0.20,
        }
    }

    /// Health percentage lost per year of age
    pub fn yearly_ageing(&self) -> f64 {
        match self {
            BatteryType::Lipo => 10.0,
            BatteryType::LiIon => 7.0,
            BatteryType::Nimh => 5.0,
            BatteryType::Life => 4.0,
            BatteryType::Other => 8.0,
        }
    }
}

impl fmt::Display for BatteryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatteryType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "LIPO" => Ok(BatteryType::Lipo),
            "LI_ION" | "LIION" => Ok(BatteryType::LiIon),
            "NIMH" => Ok(BatteryType::Nimh),
            "LIFE" | "LIFEPO4" => Ok(BatteryType::Life),
            "OTHER" => Ok(BatteryType::Other),
            _ => Err(ParseEnumError {
                kind: "battery type",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a battery.
///
/// Every status may follow every other; there is no terminal state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryStatus {
    #[default]
    Charged,
    Discharged,
    Storage,
    OutOfService,
}

impl BatteryStatus {
    pub const ALL: [BatteryStatus; 4] = [
        BatteryStatus::Charged,
        BatteryStatus::Discharged,
        BatteryStatus::Storage,
        BatteryStatus::OutOfService,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryStatus::Charged => "CHARGED",
            BatteryStatus::Discharged => "DISCHARGED",
            BatteryStatus::Storage => "STORAGE",
            BatteryStatus::OutOfService => "OUT_OF_SERVICE",
        }
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatteryStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "CHARGED" => Ok(BatteryStatus::Charged),
            "DISCHARGED" => Ok(BatteryStatus::Discharged),
            "STORAGE" => Ok(BatteryStatus::Storage),
            "OUT_OF_SERVICE" => Ok(BatteryStatus::OutOfService),
            _ => Err(ParseEnumError {
                kind: "battery status",
                value: s.to_string(),
            }),
        }
    }
}

/// Whole-fleet exchange format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// Infer the format from a file name's extension
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ParseEnumError {
                kind: "export format",
                value: s.to_string(),
            }),
        }
    }
}
