//! Strongly-typed identifiers for voltlog

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Store-assigned identifier of a battery
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatteryId(i64);

impl BatteryId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BatteryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BatteryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for BatteryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Ledger-assigned identifier of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryEntryId(i64);

impl HistoryEntryId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for HistoryEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identifier of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(i64);

impl CategoryId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CategoryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Unique identifier for a live query subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_id_equality() {
        let id1 = BatteryId::new(7);
        let id2 = BatteryId::from(7);
        let id3 = BatteryId::new(8);

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert!(id1 < id3);
    }

    #[test]
    fn battery_id_parses_from_text() {
        assert_eq!("42".parse::<BatteryId>().unwrap(), BatteryId::new(42));
        assert!("forty-two".parse::<BatteryId>().is_err());
    }

    #[test]
    fn category_id_parses_from_text() {
        assert_eq!("3".parse::<CategoryId>().unwrap(), CategoryId::new(3));
        assert!("".parse::<CategoryId>().is_err());
    }

    #[test]
    fn subscription_id_uniqueness() {
        let s1 = SubscriptionId::new();
        let s2 = SubscriptionId::new();
        assert_ne!(s1, s2);
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let id = BatteryId::new(12);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "12");
        let parsed: BatteryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);

        let entry_id = HistoryEntryId::new(3);
        assert_eq!(serde_json::to_string(&entry_id).unwrap(), "3");
    }
}
