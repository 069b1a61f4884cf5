//! Ledger entries recorded against a battery

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use voltlog_util::{BatteryId, HistoryEntryId};

use crate::{BatteryStatus, ValidationError, require_text};

/// Discriminant of a [`HistoryEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEventType {
    StatusChange,
    CycleCompleted,
    VoltageReading,
    NoteAdded,
    Maintenance,
}

impl HistoryEventType {
    pub const ALL: [HistoryEventType; 5] = [
        HistoryEventType::StatusChange,
        HistoryEventType::CycleCompleted,
        HistoryEventType::VoltageReading,
        HistoryEventType::NoteAdded,
        HistoryEventType::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEventType::StatusChange => "STATUS_CHANGE",
            HistoryEventType::CycleCompleted => "CYCLE_COMPLETED",
            HistoryEventType::VoltageReading => "VOLTAGE_READING",
            HistoryEventType::NoteAdded => "NOTE_ADDED",
            HistoryEventType::Maintenance => "MAINTENANCE",
        }
    }

    /// Whether entries of this type must carry non-blank notes
    pub fn requires_notes(&self) -> bool {
        matches!(self, HistoryEventType::NoteAdded | HistoryEventType::Maintenance)
    }
}

impl fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened, with the payload each kind of event needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEvent {
    /// Status asserted by the user. `previous_status` is `None` only for the
    /// entry written when the battery is created.
    #[serde(rename_all = "camelCase")]
    StatusChange {
        previous_status: Option<BatteryStatus>,
        new_status: BatteryStatus,
    },

    /// A full charge/discharge cycle; `cycle_number` is the new cycle count
    #[serde(rename_all = "camelCase")]
    CycleCompleted { cycle_number: u32 },

    /// Pack voltage measurement in volts
    VoltageReading { voltage: f64 },

    /// Free-form note, text lives in [`HistoryEntry::notes`]
    NoteAdded,

    /// Maintenance performed, description lives in [`HistoryEntry::notes`]
    Maintenance,
}

impl HistoryEvent {
    /// Marker written alongside a newly created battery
    pub fn created(status: BatteryStatus) -> Self {
        HistoryEvent::StatusChange {
            previous_status: None,
            new_status: status,
        }
    }

    pub fn event_type(&self) -> HistoryEventType {
        match self {
            HistoryEvent::StatusChange { .. } => HistoryEventType::StatusChange,
            HistoryEvent::CycleCompleted { .. } => HistoryEventType::CycleCompleted,
            HistoryEvent::VoltageReading { .. } => HistoryEventType::VoltageReading,
            HistoryEvent::NoteAdded => HistoryEventType::NoteAdded,
            HistoryEvent::Maintenance => HistoryEventType::Maintenance,
        }
    }

    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            HistoryEvent::StatusChange {
                previous_status: None,
                ..
            }
        )
    }

    /// Check the payload, and the notes for kinds that carry their text there.
    ///
    /// Voltages must be finite and positive; non-finite values cannot be
    /// stored as JSON numbers.
    pub fn validate(&self, notes: &str) -> Result<(), ValidationError> {
        if let HistoryEvent::VoltageReading { voltage } = *self
            && !(voltage.is_finite() && voltage > 0.0)
        {
            return Err(ValidationError::InvalidVoltage(voltage));
        }
        if self.event_type().requires_notes() {
            require_text("notes", notes)?;
        }
        Ok(())
    }
}

/// Effect of an event on the battery's wellbeing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventImpact {
    Positive,
    Neutral,
    Negative,
}

/// One immutable fact about one battery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub battery_id: BatteryId,
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub event: HistoryEvent,
    #[serde(default)]
    pub notes: String,
}

impl HistoryEntry {
    pub fn event_type(&self) -> HistoryEventType {
        self.event.event_type()
    }

    /// Human-readable one-line rendering of the event
    pub fn description(&self) -> String {
        match &self.event {
            HistoryEvent::StatusChange {
                previous_status: Some(previous),
                new_status,
            } => format!("Status changed from {} to {}", previous, new_status),
            HistoryEvent::StatusChange {
                previous_status: None,
                ..
            } => "Battery added".to_string(),
            HistoryEvent::CycleCompleted { cycle_number } => {
                format!("Cycle #{} completed", cycle_number)
            }
            HistoryEvent::VoltageReading { voltage } => {
                format!("Voltage reading: {:.2}V", voltage)
            }
            HistoryEvent::NoteAdded => "Note added".to_string(),
            HistoryEvent::Maintenance => "Maintenance performed".to_string(),
        }
    }

    /// Classify the event as good, neutral or bad for the battery.
    ///
    /// Moving into CHARGED or STORAGE is positive, into OUT_OF_SERVICE is
    /// negative, a completed cycle is wear. The creation marker is neutral.
    pub fn impact(&self) -> EventImpact {
        match &self.event {
            HistoryEvent::StatusChange {
                previous_status: None,
                ..
            } => EventImpact::Neutral,
            HistoryEvent::StatusChange { new_status, .. } => match new_status {
                BatteryStatus::Charged | BatteryStatus::Storage => EventImpact::Positive,
                BatteryStatus::OutOfService => EventImpact::Negative,
                BatteryStatus::Discharged => EventImpact::Neutral,
            },
            HistoryEvent::CycleCompleted { .. } => EventImpact::Negative,
            HistoryEvent::VoltageReading { .. }
            | HistoryEvent::NoteAdded
            | HistoryEvent::Maintenance => EventImpact::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(event: HistoryEvent) -> HistoryEntry {
        HistoryEntry {
            id: HistoryEntryId::new(1),
            battery_id: BatteryId::new(1),
            timestamp: Local::now(),
            event,
            notes: String::new(),
        }
    }

    #[test]
    fn descriptions() {
        let change = entry(HistoryEvent::StatusChange {
            previous_status: Some(BatteryStatus::Charged),
            new_status: BatteryStatus::Discharged,
        });
        assert_eq!(change.description(), "Status changed from CHARGED to DISCHARGED");

        let created = entry(HistoryEvent::created(BatteryStatus::Charged));
        assert_eq!(created.description(), "Battery added");

        let voltage = entry(HistoryEvent::VoltageReading { voltage: 15.2 });
        assert_eq!(voltage.description(), "Voltage reading: 15.20V");

        let cycle = entry(HistoryEvent::CycleCompleted { cycle_number: 23 });
        assert_eq!(cycle.description(), "Cycle #23 completed");

        assert_eq!(entry(HistoryEvent::NoteAdded).description(), "Note added");
        assert_eq!(
            entry(HistoryEvent::Maintenance).description(),
            "Maintenance performed"
        );
    }

    #[test]
    fn impacts() {
        let into = |status| {
            entry(HistoryEvent::StatusChange {
                previous_status: Some(BatteryStatus::Discharged),
                new_status: status,
            })
            .impact()
        };
        assert_eq!(into(BatteryStatus::Charged), EventImpact::Positive);
        assert_eq!(into(BatteryStatus::Storage), EventImpact::Positive);
        assert_eq!(into(BatteryStatus::OutOfService), EventImpact::Negative);
        assert_eq!(into(BatteryStatus::Discharged), EventImpact::Neutral);

        assert_eq!(
            entry(HistoryEvent::created(BatteryStatus::Charged)).impact(),
            EventImpact::Neutral
        );
        assert_eq!(
            entry(HistoryEvent::CycleCompleted { cycle_number: 1 }).impact(),
            EventImpact::Negative
        );
        assert_eq!(
            entry(HistoryEvent::VoltageReading { voltage: 3.7 }).impact(),
            EventImpact::Neutral
        );
        assert_eq!(entry(HistoryEvent::Maintenance).impact(), EventImpact::Neutral);
    }

    #[test]
    fn event_serializes_as_tagged_union() {
        let event = HistoryEvent::StatusChange {
            previous_status: Some(BatteryStatus::Charged),
            new_status: BatteryStatus::Storage,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "STATUS_CHANGE");
        assert_eq!(json["previousStatus"], "CHARGED");
        assert_eq!(json["newStatus"], "STORAGE");

        let parsed: HistoryEvent =
            serde_json::from_str(r#"{"eventType":"NOTE_ADDED"}"#).unwrap();
        assert_eq!(parsed, HistoryEvent::NoteAdded);

        // a voltage reading without a voltage is not representable
        assert!(serde_json::from_str::<HistoryEvent>(r#"{"eventType":"VOLTAGE_READING"}"#).is_err());
    }

    #[test]
    fn only_status_change_without_previous_is_creation() {
        assert!(HistoryEvent::created(BatteryStatus::Charged).is_creation());
        assert!(
            !HistoryEvent::StatusChange {
                previous_status: Some(BatteryStatus::Charged),
                new_status: BatteryStatus::Charged,
            }
            .is_creation()
        );
        assert!(!HistoryEvent::NoteAdded.is_creation());
    }

    #[test]
    fn notes_required_for_note_and_maintenance() {
        assert!(HistoryEventType::NoteAdded.requires_notes());
        assert!(HistoryEventType::Maintenance.requires_notes());
        assert!(!HistoryEventType::VoltageReading.requires_notes());
    }

    #[test]
    fn validate_rejects_unusable_voltages() {
        for voltage in [0.0, -3.7, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                HistoryEvent::VoltageReading { voltage }.validate(""),
                Err(ValidationError::InvalidVoltage(_))
            ));
        }
        assert!(HistoryEvent::VoltageReading { voltage: 16.8 }.validate("").is_ok());
    }

    #[test]
    fn validate_requires_notes_where_text_is_the_payload() {
        assert_eq!(
            HistoryEvent::NoteAdded.validate("  "),
            Err(ValidationError::BlankField { field: "notes" })
        );
        assert!(HistoryEvent::Maintenance.validate("").is_err());
        assert!(HistoryEvent::Maintenance.validate("new connector").is_ok());
        assert!(HistoryEvent::CycleCompleted { cycle_number: 1 }.validate("").is_ok());
    }
}
