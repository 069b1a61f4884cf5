//! Identity token codec
//!
//! A token is one line of text: `v1|<batteryId>|<serialNumber>|<brand>|<model>`.
//! The delimiter and line breaks are reserved and may not occur in any field.

use thiserror::Error;
use voltlog_api::Battery;
use voltlog_util::BatteryId;

/// Version marker written at the start of every token
pub const TOKEN_VERSION: &str = "v1";

/// Field separator; never allowed inside a field
pub const TOKEN_DELIMITER: char = '|';

const FIELD_COUNT: usize = 5;

/// Errors from encoding or decoding an identity token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Unsupported token version: '{0}'")]
    UnsupportedVersion(String),

    #[error("Expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid battery id: '{0}'")]
    InvalidId(String),

    #[error("Field {field} contains a reserved character")]
    ReservedCharacter { field: &'static str },
}

/// The four values carried by a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryIdentity {
    pub battery_id: BatteryId,
    pub serial_number: String,
    pub brand: String,
    pub model: String,
}

impl From<&Battery> for BatteryIdentity {
    fn from(battery: &Battery) -> Self {
        Self {
            battery_id: battery.id,
            serial_number: battery.serial_number.clone(),
            brand: battery.brand.clone(),
            model: battery.model.clone(),
        }
    }
}

impl BatteryIdentity {
    pub fn encode(&self) -> Result<String, CodecError> {
        encode(self.battery_id, &self.serial_number, &self.brand, &self.model)
    }
}

/// Build the token for a battery identity
pub fn encode(
    battery_id: BatteryId,
    serial_number: &str,
    brand: &str,
    model: &str,
) -> Result<String, CodecError> {
    let fields = [
        ("serial_number", serial_number),
        ("brand", brand),
        ("model", model),
    ];

    for (name, value) in fields {
        if value.is_empty() {
            return Err(CodecError::MissingField(name));
        }
        if value.contains([TOKEN_DELIMITER, '\n', '\r']) {
            return Err(CodecError::ReservedCharacter { field: name });
        }
    }

    Ok(format!(
        "{TOKEN_VERSION}{d}{battery_id}{d}{serial_number}{d}{brand}{d}{model}",
        d = TOKEN_DELIMITER
    ))
}

/// Parse a token, rejecting anything that is not a complete v1 token
pub fn decode(token: &str) -> Result<BatteryIdentity, CodecError> {
    // Scanners commonly append a line break
    let token = token
        .strip_suffix("\r\n")
        .or_else(|| token.strip_suffix('\n'))
        .unwrap_or(token);

    if token.is_empty() {
        return Err(CodecError::MissingField("version"));
    }

    let fields: Vec<&str> = token.split(TOKEN_DELIMITER).collect();
    if fields[0] != TOKEN_VERSION {
        return Err(CodecError::UnsupportedVersion(fields[0].to_string()));
    }
    if fields.len() != FIELD_COUNT {
        return Err(CodecError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let names = ["version", "battery_id", "serial_number", "brand", "model"];
    for (name, value) in names.into_iter().zip(&fields) {
        if value.is_empty() {
            return Err(CodecError::MissingField(name));
        }
    }

    let battery_id = fields[1]
        .parse::<BatteryId>()
        .map_err(|_| CodecError::InvalidId(fields[1].to_string()))?;

    Ok(BatteryIdentity {
        battery_id,
        serial_number: fields[2].to_string(),
        brand: fields[3].to_string(),
        model: fields[4].to_string(),
    })
}
