//! Shared utilities for voltlog
//!
//! This crate provides:
//! - ID types (BatteryId, HistoryEntryId, CategoryId, SubscriptionId)
//! - Wall-clock helpers with a debug-only mock clock
//! - Default paths for the config file and data directory

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
