//! Domain types for voltlog
//!
//! This crate defines the battery aggregate shared by every other crate:
//! - Battery identity, attributes and lifecycle status
//! - History entries (the per-battery ledger) and their presentation helpers
//! - Categories that group batteries
//! - Validation rules applied before anything is persisted

mod battery;
mod category;
mod history;
mod types;

pub use battery::*;
pub use category::*;
pub use history::*;
pub use types::*;

use thiserror::Error;

/// A battery or ledger invariant was violated by caller-supplied data
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },

    #[error("{field} must be greater than zero (got {value})")]
    NonPositive { field: &'static str, value: i64 },

    #[error("voltage must be a finite value greater than zero (got {0})")]
    InvalidVoltage(f64),

    #[error("invalid color '{0}', expected #RRGGBB or #AARRGGBB")]
    InvalidColor(String),
}

/// Reject blank (empty or whitespace-only) text for a required field
pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField { field });
    }
    Ok(())
}
