//! Battery lifecycle ledger for voltlog
//!
//! This crate is the heart of voltlog, containing:
//! - The async battery service (validated mutations, one ledger entry each)
//! - Change notifications and live-updating queries
//! - Fleet statistics and per-battery alerts
//! - The identity token codec used on printed labels
//! - Whole-fleet export and import reconciliation

mod alerts;
mod codec;
mod error;
mod events;
mod exchange;
mod live;
mod service;
mod stats;

pub use alerts::*;
pub use codec::*;
pub use error::*;
pub use events::*;
pub use exchange::*;
pub use live::*;
pub use service::*;
pub use stats::*;
