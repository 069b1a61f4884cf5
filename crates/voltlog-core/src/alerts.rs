//! Battery alerts
//!
//! Alerts are derived on demand from a battery, its ledger and the alert
//! thresholds. Nothing is stored; dismissals are supplied by the caller.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use voltlog_api::{Battery, BatteryStatus, HistoryEntry, HistoryEvent, ParseEnumError};
use voltlog_config::AlertSettings;
use voltlog_util::{days_between, BatteryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Left discharged for too long
    NeedsCharging,
    /// Estimated health at or below the warning threshold
    LowHealth,
    /// Periodic inspection is due
    MaintenanceDue,
    /// Approaching or past the recommended cycle count
    HighCycleCount,
}

impl AlertKind {
    pub const ALL: [AlertKind; 4] = [
        AlertKind::NeedsCharging,
        AlertKind::LowHealth,
        AlertKind::MaintenanceDue,
        AlertKind::HighCycleCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::NeedsCharging => "NEEDS_CHARGING",
            AlertKind::LowHealth => "LOW_HEALTH",
            AlertKind::MaintenanceDue => "MAINTENANCE_DUE",
            AlertKind::HighCycleCount => "HIGH_CYCLE_COUNT",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        AlertKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                kind: "alert kind",
                value: s.to_string(),
            })
    }
}

/// Alert priority, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertPriority::Low => "LOW",
            AlertPriority::Medium => "MEDIUM",
            AlertPriority::High => "HIGH",
            AlertPriority::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub battery_id: BatteryId,
    pub battery_name: String,
    pub kind: AlertKind,
    pub priority: AlertPriority,
    pub message: String,
}

impl Alert {
    fn new(battery: &Battery, kind: AlertKind, priority: AlertPriority, message: String) -> Self {
        Self {
            battery_id: battery.id,
            battery_name: battery.display_name(),
            kind,
            priority,
            message,
        }
    }

    /// Key used to dismiss this alert
    pub fn key(&self) -> (BatteryId, AlertKind) {
        (self.battery_id, self.kind)
    }
}

/// Every alert that applies to one battery, given its ledger (any order)
pub fn battery_alerts(
    battery: &Battery,
    history: &[HistoryEntry],
    today: NaiveDate,
    settings: &AlertSettings,
) -> Vec<Alert> {
    [
        needs_charging(battery, history, today, settings),
        low_health(battery, today, settings),
        maintenance_due(battery, history, today, settings),
        high_cycle_count(battery, settings),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Alerts for a whole fleet, most urgent first, minus dismissed ones.
///
/// `history` may contain entries of any battery.
pub fn fleet_alerts(
    batteries: &[Battery],
    history: &[HistoryEntry],
    today: NaiveDate,
    settings: &AlertSettings,
    dismissed: &HashSet<(BatteryId, AlertKind)>,
) -> Vec<Alert> {
    let mut by_battery: HashMap<BatteryId, Vec<HistoryEntry>> = HashMap::new();
    for entry in history {
        by_battery
            .entry(entry.battery_id)
            .or_default()
            .push(entry.clone());
    }

    let mut alerts: Vec<Alert> = batteries
        .iter()
        .flat_map(|battery| {
            let entries = by_battery.get(&battery.id).map(Vec::as_slice).unwrap_or(&[]);
            battery_alerts(battery, entries, today, settings)
        })
        .filter(|alert| !dismissed.contains(&alert.key()))
        .collect();

    // Stable, so equal priorities keep fleet order
    alerts.sort_by(|a, b| b.priority.cmp(&a.priority));
    alerts
}

fn needs_charging(
    battery: &Battery,
    history: &[HistoryEntry],
    today: NaiveDate,
    settings: &AlertSettings,
) -> Option<Alert> {
    if battery.status != BatteryStatus::Discharged {
        return None;
    }

    let discharged_on = history
        .iter()
        .filter(|entry| {
            matches!(
                entry.event,
                HistoryEvent::StatusChange {
                    new_status: BatteryStatus::Discharged,
                    ..
                }
            )
        })
        .map(|entry| entry.timestamp.date_naive())
        .max()?;

    let days = days_between(discharged_on, today);
    if days < i64::from(settings.discharge_days_warning) {
        return None;
    }

    let priority = if days > 14 {
        AlertPriority::High
    } else {
        AlertPriority::Medium
    };
    Some(Alert::new(
        battery,
        AlertKind::NeedsCharging,
        priority,
        format!(
            "{} has been discharged for {} days. Charge it to avoid degradation.",
            battery.display_name(),
            days
        ),
    ))
}

fn low_health(battery: &Battery, today: NaiveDate, settings: &AlertSettings) -> Option<Alert> {
    let health = battery.health_percentage(today);
    if health > settings.health_warning_threshold {
        return None;
    }

    let priority = match health {
        0..10 => AlertPriority::Critical,
        10..15 => AlertPriority::High,
        _ => AlertPriority::Medium,
    };
    Some(Alert::new(
        battery,
        AlertKind::LowHealth,
        priority,
        format!(
            "{} is down to {}% health. Consider replacing it.",
            battery.display_name(),
            health
        ),
    ))
}

fn maintenance_due(
    battery: &Battery,
    history: &[HistoryEntry],
    today: NaiveDate,
    settings: &AlertSettings,
) -> Option<Alert> {
    let last_check = history
        .iter()
        .filter(|entry| matches!(entry.event, HistoryEvent::Maintenance))
        .map(|entry| entry.timestamp.date_naive())
        .max()
        .unwrap_or(battery.purchase_date);

    let days = days_between(last_check, today);
    let interval_cycles = settings.maintenance_interval_cycles;

    let reason = if days >= i64::from(settings.maintenance_interval_days) {
        format!("last check {} days ago", days)
    } else if interval_cycles > 0
        && battery.cycle_count > 0
        && battery.cycle_count % interval_cycles == 0
    {
        format!("reached {} cycles", battery.cycle_count)
    } else {
        return None;
    };

    Some(Alert::new(
        battery,
        AlertKind::MaintenanceDue,
        AlertPriority::Low,
        format!("{} is due for maintenance: {}.", battery.display_name(), reason),
    ))
}

fn high_cycle_count(battery: &Battery, settings: &AlertSettings) -> Option<Alert> {
    let recommended = u64::from(settings.recommended_max_cycles(battery.battery_type));
    let cycles = u64::from(battery.cycle_count);

    // cycles >= 0.8 * recommended
    if cycles * 10 < recommended * 8 {
        return None;
    }

    let priority = if cycles * 10 > recommended * 12 {
        AlertPriority::High
    } else if cycles > recommended {
        AlertPriority::Medium
    } else {
        AlertPriority::Low
    };
    Some(Alert::new(
        battery,
        AlertKind::HighCycleCount,
        priority,
        format!(
            "{} has {} cycles (recommended maximum {}).",
            battery.display_name(),
            cycles,
            recommended
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use voltlog_api::BatteryType;
    use voltlog_util::HistoryEntryId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn battery(cycles: u32, purchased: NaiveDate) -> Battery {
        Battery {
            id: BatteryId::new(1),
            brand: "DJI".into(),
            model: "Mavic 3".into(),
            serial_number: "SN001".into(),
            battery_type: BatteryType::Lipo,
            cells: 4,
            capacity: 5000,
            purchase_date: purchased,
            status: BatteryStatus::Charged,
            cycle_count: cycles,
            notes: String::new(),
        }
    }

    fn entry(id: i64, on: NaiveDate, event: HistoryEvent) -> HistoryEntry {
        HistoryEntry {
            id: HistoryEntryId::new(id),
            battery_id: BatteryId::new(1),
            timestamp: Local
                .from_local_datetime(&on.and_hms_opt(12, 0, 0).unwrap())
                .unwrap(),
            event,
            notes: String::new(),
        }
    }

    fn kinds(alerts: &[Alert]) -> Vec<AlertKind> {
        alerts.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("low-health".parse::<AlertKind>(), Ok(AlertKind::LowHealth));
        assert_eq!(
            "NEEDS_CHARGING".parse::<AlertKind>(),
            Ok(AlertKind::NeedsCharging)
        );
        assert!("sleepy".parse::<AlertKind>().is_err());
    }

    #[test]
    fn test_fresh_battery_has_no_alerts() {
        let today = date(2024, 6, 1);
        let b = battery(3, date(2024, 5, 1));
        assert!(battery_alerts(&b, &[], today, &AlertSettings::default()).is_empty());
    }

    #[test]
    fn test_needs_charging_uses_latest_discharge() {
        let settings = AlertSettings::default();
        let today = date(2024, 6, 30);
        let mut b = battery(1, date(2024, 6, 1));
        b.status = BatteryStatus::Discharged;

        let discharge = |new_status| HistoryEvent::StatusChange {
            previous_status: Some(BatteryStatus::Charged),
            new_status,
        };
        let recent = vec![
            entry(1, date(2024, 6, 1), discharge(BatteryStatus::Discharged)),
            entry(2, date(2024, 6, 27), discharge(BatteryStatus::Discharged)),
        ];
        assert!(needs_charging(&b, &recent, today, &settings).is_none());

        let old = vec![entry(1, date(2024, 6, 20), discharge(BatteryStatus::Discharged))];
        let alert = needs_charging(&b, &old, today, &settings).unwrap();
        assert_eq!(alert.priority, AlertPriority::Medium);

        let older = vec![entry(1, date(2024, 6, 1), discharge(BatteryStatus::Discharged))];
        let alert = needs_charging(&b, &older, today, &settings).unwrap();
        assert_eq!(alert.priority, AlertPriority::High);

        b.status = BatteryStatus::Charged;
        assert!(needs_charging(&b, &older, today, &settings).is_none());
    }

    #[test]
    fn test_low_health_priorities() {
        let settings = AlertSettings::default();
        let today = date(2024, 1, 1);

        // LiPo loses 0.25 per cycle
        let at_20 = battery(320, today);
        assert_eq!(
            low_health(&at_20, today, &settings).unwrap().priority,
            AlertPriority::Medium
        );
        let at_12 = battery(352, today);
        assert_eq!(
            low_health(&at_12, today, &settings).unwrap().priority,
            AlertPriority::High
        );
        let at_0 = battery(400, today);
        assert_eq!(
            low_health(&at_0, today, &settings).unwrap().priority,
            AlertPriority::Critical
        );
        assert!(low_health(&battery(310, today), today, &settings).is_none());
    }

    #[test]
    fn test_maintenance_due() {
        let settings = AlertSettings::default();
        let today = date(2024, 6, 1);

        let b = battery(10, date(2024, 1, 1));
        assert!(maintenance_due(&b, &[], today, &settings).is_some());

        let serviced = vec![entry(1, date(2024, 5, 1), HistoryEvent::Maintenance)];
        assert!(maintenance_due(&b, &serviced, today, &settings).is_none());

        let at_milestone = battery(50, date(2024, 5, 1));
        let alert = maintenance_due(&at_milestone, &[], today, &settings).unwrap();
        assert_eq!(alert.priority, AlertPriority::Low);
        assert!(alert.message.contains("50 cycles"));
    }

    #[test]
    fn test_high_cycle_count() {
        let settings = AlertSettings::default();
        // LiPo recommends 300
        assert!(high_cycle_count(&battery(239, date(2024, 1, 1)), &settings).is_none());
        assert_eq!(
            high_cycle_count(&battery(240, date(2024, 1, 1)), &settings)
                .unwrap()
                .priority,
            AlertPriority::Low
        );
        assert_eq!(
            high_cycle_count(&battery(301, date(2024, 1, 1)), &settings)
                .unwrap()
                .priority,
            AlertPriority::Medium
        );
        assert_eq!(
            high_cycle_count(&battery(361, date(2024, 1, 1)), &settings)
                .unwrap()
                .priority,
            AlertPriority::High
        );
    }

    #[test]
    fn test_fleet_sorted_and_dismissed() {
        let settings = AlertSettings::default();
        let today = date(2024, 6, 1);

        let mut worn = battery(400, today);
        worn.id = BatteryId::new(2);
        let stale = battery(5, date(2023, 1, 1));

        let alerts = fleet_alerts(
            &[stale.clone(), worn.clone()],
            &[],
            today,
            &settings,
            &HashSet::new(),
        );
        assert_eq!(alerts[0].priority, AlertPriority::Critical);
        assert_eq!(alerts[0].battery_id, worn.id);
        assert!(alerts.windows(2).all(|w| w[0].priority >= w[1].priority));

        let dismissed: HashSet<_> = alerts
            .iter()
            .filter(|a| a.battery_id == worn.id)
            .map(Alert::key)
            .collect();
        let remaining = fleet_alerts(&[stale, worn], &[], today, &settings, &dismissed);
        assert!(remaining.iter().all(|a| a.battery_id == BatteryId::new(1)));
        assert_eq!(kinds(&remaining), vec![AlertKind::MaintenanceDue]);
    }
}
