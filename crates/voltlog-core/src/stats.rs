//! Fleet statistics
//!
//! Everything here is a pure function of its input; nothing reads the clock.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use voltlog_api::{Battery, BatteryStatus, BatteryType, HistoryEntry, HistoryEvent, HistoryEventType};

/// Health bucket of a battery relative to a maximum cycle count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBucket {
    /// Below half of the maximum
    Healthy,
    /// Between half and 80 % of the maximum
    Warning,
    /// At or above 80 % of the maximum
    Critical,
}

impl HealthBucket {
    pub fn classify(cycle_count: u32, max_cycles: u32) -> Self {
        // Integer form of cycles < 0.5 * max and cycles < 0.8 * max
        let scaled = u64::from(cycle_count) * 10;
        let max = u64::from(max_cycles);
        if scaled < 5 * max {
            HealthBucket::Healthy
        } else if scaled < 8 * max {
            HealthBucket::Warning
        } else {
            HealthBucket::Critical
        }
    }
}

/// Number of batteries in each health bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthBuckets {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
}

impl HealthBuckets {
    pub fn count(batteries: &[Battery], max_cycles: u32) -> Self {
        let mut buckets = Self::default();
        for battery in batteries {
            match HealthBucket::classify(battery.cycle_count, max_cycles) {
                HealthBucket::Healthy => buckets.healthy += 1,
                HealthBucket::Warning => buckets.warning += 1,
                HealthBucket::Critical => buckets.critical += 1,
            }
        }
        buckets
    }

    pub fn total(&self) -> usize {
        self.healthy + self.warning + self.critical
    }
}

/// Fleet-wide metrics over one snapshot of batteries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryStatistics {
    pub total_count: usize,
    pub charged_count: usize,
    pub discharged_count: usize,
    pub storage_count: usize,
    pub out_of_service_count: usize,
    pub average_cycle_count: f64,
    pub cycles_by_brand: BTreeMap<String, f64>,
    pub cycles_by_type: BTreeMap<BatteryType, f64>,
    pub health: HealthBuckets,
    pub oldest_battery: Option<Battery>,
    pub most_used_battery: Option<Battery>,
}

impl BatteryStatistics {
    pub fn compute(batteries: &[Battery], max_cycles: u32) -> Self {
        let count = |status: BatteryStatus| batteries.iter().filter(|b| b.status == status).count();

        let total_cycles: u64 = batteries.iter().map(|b| u64::from(b.cycle_count)).sum();

        Self {
            total_count: batteries.len(),
            charged_count: count(BatteryStatus::Charged),
            discharged_count: count(BatteryStatus::Discharged),
            storage_count: count(BatteryStatus::Storage),
            out_of_service_count: count(BatteryStatus::OutOfService),
            average_cycle_count: mean(total_cycles, batteries.len()),
            cycles_by_brand: mean_cycles_by(batteries, |b| b.brand.clone()),
            cycles_by_type: mean_cycles_by(batteries, |b| b.battery_type),
            health: HealthBuckets::count(batteries, max_cycles),
            // min_by_key keeps the first of equal elements
            oldest_battery: batteries.iter().min_by_key(|b| b.purchase_date).cloned(),
            most_used_battery: batteries
                .iter()
                .reduce(|best, b| if b.cycle_count > best.cycle_count { b } else { best })
                .cloned(),
        }
    }

    pub fn count_for(&self, status: BatteryStatus) -> usize {
        match status {
            BatteryStatus::Charged => self.charged_count,
            BatteryStatus::Discharged => self.discharged_count,
            BatteryStatus::Storage => self.storage_count,
            BatteryStatus::OutOfService => self.out_of_service_count,
        }
    }

    /// Share of the fleet in `status`, 0..=100; 0 for an empty fleet
    pub fn percentage(&self, status: BatteryStatus) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.count_for(status) as f64 * 100.0 / self.total_count as f64
    }
}

fn mean(sum: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

fn mean_cycles_by<K, F>(batteries: &[Battery], key: F) -> BTreeMap<K, f64>
where
    K: Ord,
    F: Fn(&Battery) -> K,
{
    let mut groups: BTreeMap<K, (u64, usize)> = BTreeMap::new();
    for battery in batteries {
        let group = groups.entry(key(battery)).or_default();
        group.0 += u64::from(battery.cycle_count);
        group.1 += 1;
    }
    groups
        .into_iter()
        .map(|(k, (sum, count))| (k, mean(sum, count)))
        .collect()
}

/// Digest of one battery's ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub entry_count: usize,
    pub counts: BTreeMap<HistoryEventType, usize>,
    pub latest_voltage: Option<f64>,
    pub average_voltage: Option<f64>,
    pub last_maintenance: Option<DateTime<Local>>,
}

impl LedgerSummary {
    /// Summarize entries given oldest first
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let mut summary = Self {
            entry_count: entries.len(),
            ..Self::default()
        };
        let mut voltage_sum = 0.0;
        let mut voltage_count = 0usize;

        for entry in entries {
            *summary.counts.entry(entry.event_type()).or_default() += 1;
            match entry.event {
                HistoryEvent::VoltageReading { voltage } => {
                    summary.latest_voltage = Some(voltage);
                    voltage_sum += voltage;
                    voltage_count += 1;
                }
                HistoryEvent::Maintenance => summary.last_maintenance = Some(entry.timestamp),
                _ => {}
            }
        }

        if voltage_count > 0 {
            summary.average_voltage = Some(voltage_sum / voltage_count as f64);
        }
        summary
    }

    pub fn count(&self, event_type: HistoryEventType) -> usize {
        self.counts.get(&event_type).copied().unwrap_or(0)
    }
}
