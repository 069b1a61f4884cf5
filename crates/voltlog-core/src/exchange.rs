//! Whole-fleet export and import
//!
//! Both formats share the flat battery record
//! `{id, brand, model, serialNumber, type, cells, capacity, purchaseDate,
//! status, cycleCount, notes}`. JSON is an array of such objects, each
//! optionally carrying its `history`; CSV is one header row plus one row per
//! battery and never includes history.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};
use voltlog_api::{
    Battery, BatteryStatus, BatteryType, ExportFormat, HistoryEntry, HistoryEvent,
    HistoryEventType, NewBattery, ValidationError,
};
use voltlog_store::{ImportRecord, InitialState};
use voltlog_util::BatteryId;

use crate::{BatteryService, LedgerError};

const DATE_FORMAT: &str = "%Y-%m-%d";

const CSV_HEADER: [&str; 11] = [
    "id",
    "brand",
    "model",
    "serialNumber",
    "type",
    "cells",
    "capacity",
    "purchaseDate",
    "status",
    "cycleCount",
    "notes",
];

/// Note on the creation entry of every imported battery
pub const IMPORT_NOTE: &str = "Imported from backup";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Store error: {0}")]
    Store(#[from] LedgerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Why an import was rejected. Nothing is written when any of these occur.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("File contains no batteries")]
    Empty,

    #[error("Store error: {0}")]
    Store(#[from] LedgerError),
}

/// One battery as it appears in an exchange file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub brand: String,
    pub model: String,
    pub serial_number: String,
    #[serde(rename = "type")]
    pub battery_type: String,
    pub cells: i64,
    pub capacity: i64,
    pub purchase_date: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cycle_count: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

impl From<&Battery> for BatteryRecord {
    fn from(battery: &Battery) -> Self {
        Self {
            id: Some(battery.id.get()),
            brand: battery.brand.clone(),
            model: battery.model.clone(),
            serial_number: battery.serial_number.clone(),
            battery_type: battery.battery_type.as_str().to_string(),
            cells: i64::from(battery.cells),
            capacity: i64::from(battery.capacity),
            purchase_date: battery.purchase_date.format(DATE_FORMAT).to_string(),
            status: Some(battery.status.as_str().to_string()),
            cycle_count: Some(i64::from(battery.cycle_count)),
            notes: battery.notes.clone(),
        }
    }
}

impl BatteryRecord {
    /// Validate and convert; `index` is the record's position in the file
    pub fn into_import(self, index: usize) -> Result<ImportRecord, ImportError> {
        let invalid = |reason: String| ImportError::InvalidRecord { index, reason };

        let battery_type = self
            .battery_type
            .parse::<BatteryType>()
            .map_err(|e| invalid(e.to_string()))?;
        let cells = positive("cells", self.cells).map_err(|e| invalid(e.to_string()))?;
        let capacity = positive("capacity", self.capacity).map_err(|e| invalid(e.to_string()))?;
        let purchase_date = parse_purchase_date(&self.purchase_date)
            .ok_or_else(|| invalid(format!("invalid purchase date '{}'", self.purchase_date)))?;

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => BatteryStatus::default(),
            Some(s) => s.parse().map_err(|e: voltlog_api::ParseEnumError| invalid(e.to_string()))?,
        };
        let cycle_count = match self.cycle_count {
            None => 0,
            Some(n) => u32::try_from(n)
                .map_err(|_| invalid(format!("cycle count out of range ({})", n)))?,
        };

        let battery = NewBattery {
            brand: self.brand,
            model: self.model,
            serial_number: self.serial_number,
            battery_type,
            cells,
            capacity,
            purchase_date,
            notes: self.notes,
        };
        battery.validate().map_err(|e| invalid(e.to_string()))?;

        Ok(ImportRecord {
            battery,
            initial: InitialState {
                status,
                cycle_count,
                note: IMPORT_NOTE.to_string(),
            },
        })
    }
}

fn positive(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ValidationError::NonPositive { field, value }),
    }
}

/// ISO date, or the date part of an RFC 3339 timestamp
fn parse_purchase_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// One ledger entry as it appears in a JSON export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub timestamp: DateTime<Local>,
    pub event_type: HistoryEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<BatteryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<BatteryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_number: Option<u32>,
    #[serde(default)]
    pub notes: String,
}

impl From<&HistoryEntry> for HistoryRecord {
    fn from(entry: &HistoryEntry) -> Self {
        let mut record = Self {
            timestamp: entry.timestamp,
            event_type: entry.event_type(),
            previous_status: None,
            new_status: None,
            voltage: None,
            cycle_number: None,
            notes: entry.notes.clone(),
        };
        match entry.event {
            HistoryEvent::StatusChange {
                previous_status,
                new_status,
            } => {
                record.previous_status = previous_status;
                record.new_status = Some(new_status);
            }
            HistoryEvent::CycleCompleted { cycle_number } => record.cycle_number = Some(cycle_number),
            HistoryEvent::VoltageReading { voltage } => record.voltage = Some(voltage),
            HistoryEvent::NoteAdded | HistoryEvent::Maintenance => {}
        }
        record
    }
}

#[derive(Serialize)]
struct ExportedBattery {
    #[serde(flatten)]
    record: BatteryRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<Vec<HistoryRecord>>,
}

/// Rendered export ready to be written out
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    pub content: String,
    pub file_name: String,
    pub battery_count: usize,
}

/// Outcome of an import; `total_in_file == imported_count + skipped_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub total_in_file: usize,
}

/// `voltlog_backup_<YYYYMMDD_HHMMSS>.<ext>`
pub fn export_file_name(format: ExportFormat, at: &DateTime<Local>) -> String {
    format!(
        "voltlog_backup_{}.{}",
        voltlog_util::format_file_stamp(at),
        format.extension()
    )
}

/// Serialize a fleet snapshot. `history` may hold entries of any battery.
pub fn render_export(
    batteries: &[Battery],
    history: &[HistoryEntry],
    format: ExportFormat,
    include_history: bool,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => {
            let mut by_battery: BTreeMap<BatteryId, Vec<HistoryRecord>> = BTreeMap::new();
            if include_history {
                for entry in history {
                    by_battery
                        .entry(entry.battery_id)
                        .or_default()
                        .push(HistoryRecord::from(entry));
                }
            }

            let exported: Vec<ExportedBattery> = batteries
                .iter()
                .map(|battery| ExportedBattery {
                    record: BatteryRecord::from(battery),
                    history: include_history
                        .then(|| by_battery.remove(&battery.id).unwrap_or_default()),
                })
                .collect();

            Ok(serde_json::to_string_pretty(&exported)?)
        }
        ExportFormat::Csv => {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(Vec::new());
            writer.write_record(CSV_HEADER)?;
            for battery in batteries {
                writer.serialize(BatteryRecord::from(battery))?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| csv::Error::from(e.into_error()))?;
            Ok(String::from_utf8(bytes)?)
        }
    }
}

/// Parse and validate every record of a file.
///
/// Any malformed record rejects the whole file. Text fields are kept exactly
/// as written in both formats, so serial numbers match the same way whether
/// a backup went through JSON or CSV.
pub fn parse_import(content: &str, format: ExportFormat) -> Result<Vec<ImportRecord>, ImportError> {
    // Strip UTF-8 BOM if present
    let content = content.trim_start_matches('\u{FEFF}');
    if content.trim().is_empty() {
        return Err(ImportError::Empty);
    }

    let records: Vec<BatteryRecord> = match format {
        ExportFormat::Json => serde_json::from_str(content)?,
        ExportFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .trim(csv::Trim::Headers)
                .from_reader(content.as_bytes());
            reader.deserialize().collect::<Result<_, _>>()?
        }
    };

    if records.is_empty() {
        return Err(ImportError::Empty);
    }

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| record.into_import(index))
        .collect()
}

/// Import and export against a live service
#[derive(Clone)]
pub struct DataExchange {
    service: BatteryService,
}

impl DataExchange {
    pub fn new(service: BatteryService) -> Self {
        Self { service }
    }

    pub async fn export(
        &self,
        format: ExportFormat,
        include_history: bool,
    ) -> Result<ExportResult, ExportError> {
        let batteries = self.service.list(None).await?;
        let history = if include_history && format == ExportFormat::Json {
            self.service.all_history().await?
        } else {
            Vec::new()
        };

        let content = render_export(&batteries, &history, format, include_history)?;
        let file_name = export_file_name(format, &voltlog_util::now());

        info!(
            %format,
            battery_count = batteries.len(),
            include_history,
            file = %file_name,
            "Fleet exported"
        );
        Ok(ExportResult {
            content,
            file_name,
            battery_count: batteries.len(),
        })
    }

    /// Merge a file into the fleet.
    ///
    /// Records whose serial number already exists are skipped. With
    /// `replace_existing` the current fleet is removed first, in the same
    /// transaction as the inserts.
    pub async fn import(
        &self,
        content: &str,
        format: ExportFormat,
        replace_existing: bool,
    ) -> Result<ImportSummary, ImportError> {
        let records = parse_import(content, format)?;
        let total_in_file = records.len();
        debug!(%format, total_in_file, "Import file parsed");

        let outcome = self.service.reconcile(records, replace_existing).await?;

        Ok(ImportSummary {
            imported_count: outcome.imported,
            skipped_count: outcome.skipped,
            total_in_file,
        })
    }
}
