//! Battery aggregate

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use voltlog_util::{BatteryId, days_between};

use crate::{BatteryStatus, BatteryType, HistoryEvent, ValidationError, require_text};

/// Input for creating a battery.
///
/// Status and cycle count are not part of the input: new batteries start
/// CHARGED with zero cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBattery {
    pub brand: String,
    pub model: String,
    pub serial_number: String,
    pub battery_type: BatteryType,
    pub cells: u32,
    pub capacity: u32,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

impl NewBattery {
    /// Check every construction invariant, reporting the first violation
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("brand", &self.brand)?;
        require_text("model", &self.model)?;
        require_text("serial_number", &self.serial_number)?;
        require_positive("cells", self.cells)?;
        require_positive("capacity", self.capacity)?;
        Ok(())
    }
}

fn require_positive(field: &'static str, value: u32) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::NonPositive {
            field,
            value: i64::from(value),
        });
    }
    Ok(())
}

/// A tracked battery pack with its current lifecycle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub id: BatteryId,
    pub brand: String,
    pub model: String,
    pub serial_number: String,
    pub battery_type: BatteryType,
    pub cells: u32,
    pub capacity: u32,
    pub purchase_date: NaiveDate,
    pub status: BatteryStatus,
    pub cycle_count: u32,
    pub notes: String,
}

impl Battery {
    /// Build a stored battery from validated input
    pub fn from_new(
        id: BatteryId,
        new: NewBattery,
        status: BatteryStatus,
        cycle_count: u32,
    ) -> Self {
        Self {
            id,
            brand: new.brand,
            model: new.model,
            serial_number: new.serial_number,
            battery_type: new.battery_type,
            cells: new.cells,
            capacity: new.capacity,
            purchase_date: new.purchase_date,
            status,
            cycle_count,
            notes: new.notes,
        }
    }

    /// "Brand Model", as shown in lists and alerts
    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    /// Printed label, e.g. `VL-042`
    pub fn short_label(&self) -> String {
        short_label(self.id)
    }

    /// Apply the state change carried by a ledger event.
    ///
    /// Only status changes and completed cycles alter the battery; the other
    /// events are pure observations.
    pub fn apply(&mut self, event: &HistoryEvent) {
        match event {
            HistoryEvent::StatusChange { new_status, .. } => self.status = *new_status,
            HistoryEvent::CycleCompleted { cycle_number } => self.cycle_count = *cycle_number,
            HistoryEvent::VoltageReading { .. }
            | HistoryEvent::NoteAdded
            | HistoryEvent::Maintenance => {}
        }
    }

    /// Age in whole days; zero for purchase dates in the future
    pub fn age_in_days(&self, today: NaiveDate) -> i64 {
        days_between(self.purchase_date, today).max(0)
    }

    /// Estimated health between 0 and 100, from cycle wear and calendar ageing
    pub fn health_percentage(&self, today: NaiveDate) -> u8 {
        let cycle_impact = f64::from(self.cycle_count) * self.battery_type.cycle_wear();
        let age_years = self.age_in_days(today) as f64 / 365.0;
        let age_impact = age_years * self.battery_type.yearly_ageing();

        let health = 100 - (cycle_impact + age_impact) as i64;
        health.clamp(0, 100) as u8
    }
}

/// Printed label for a battery id: `VL-` and the last three digits
pub fn short_label(id: BatteryId) -> String {
    format!("VL-{:03}", id.get().rem_euclid(1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new() -> NewBattery {
        NewBattery {
            brand: "DJI".into(),
            model: "Mavic 3".into(),
            serial_number: "SN001".into(),
            battery_type: BatteryType::Lipo,
            cells: 4,
            capacity: 5000,
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            notes: String::new(),
        }
    }

    #[test]
    fn valid_input_passes() {
        assert!(sample_new().validate().is_ok());
    }

    #[test]
    fn blank_strings_are_rejected() {
        let mut new = sample_new();
        new.brand = "   ".into();
        assert_eq!(
            new.validate(),
            Err(ValidationError::BlankField { field: "brand" })
        );

        let mut new = sample_new();
        new.serial_number = String::new();
        assert_eq!(
            new.validate(),
            Err(ValidationError::BlankField {
                field: "serial_number"
            })
        );
    }

    #[test]
    fn zero_cells_or_capacity_are_rejected() {
        let mut new = sample_new();
        new.cells = 0;
        assert!(matches!(
            new.validate(),
            Err(ValidationError::NonPositive { field: "cells", .. })
        ));

        let mut new = sample_new();
        new.capacity = 0;
        assert!(matches!(
            new.validate(),
            Err(ValidationError::NonPositive {
                field: "capacity",
                ..
            })
        ));
    }

    #[test]
    fn apply_updates_status_and_cycles_only() {
        let mut battery = Battery::from_new(BatteryId::new(1), sample_new(), BatteryStatus::Charged, 0);

        battery.apply(&HistoryEvent::StatusChange {
            previous_status: Some(BatteryStatus::Charged),
            new_status: BatteryStatus::OutOfService,
        });
        assert_eq!(battery.status, BatteryStatus::OutOfService);

        battery.apply(&HistoryEvent::CycleCompleted { cycle_number: 3 });
        assert_eq!(battery.cycle_count, 3);

        let before = battery.clone();
        battery.apply(&HistoryEvent::VoltageReading { voltage: 15.2 });
        battery.apply(&HistoryEvent::NoteAdded);
        battery.apply(&HistoryEvent::Maintenance);
        assert_eq!(battery, before);
    }

    #[test]
    fn health_declines_with_cycles_and_age() {
        let mut battery = Battery::from_new(BatteryId::new(1), sample_new(), BatteryStatus::Charged, 0);
        let purchase = battery.purchase_date;

        assert_eq!(battery.health_percentage(purchase), 100);

        // 100 LiPo cycles cost 25 points
        battery.cycle_count = 100;
        assert_eq!(battery.health_percentage(purchase), 75);

        // one more year costs another 10
        let a_year_later = purchase + chrono::Duration::days(365);
        assert_eq!(battery.health_percentage(a_year_later), 65);

        battery.cycle_count = 10_000;
        assert_eq!(battery.health_percentage(purchase), 0);
    }

    #[test]
    fn future_purchase_date_has_zero_age() {
        let battery = Battery::from_new(BatteryId::new(1), sample_new(), BatteryStatus::Charged, 0);
        let before_purchase = battery.purchase_date - chrono::Duration::days(30);
        assert_eq!(battery.age_in_days(before_purchase), 0);
        assert_eq!(battery.health_percentage(before_purchase), 100);
    }

    #[test]
    fn short_label_is_zero_padded() {
        assert_eq!(short_label(BatteryId::new(7)), "VL-007");
        assert_eq!(short_label(BatteryId::new(1042)), "VL-042");
    }
}
