//! Named groups of batteries
//!
//! A battery may belong to any number of categories. Membership is plain
//! metadata: assigning or removing a category writes no ledger entry.

use serde::{Deserialize, Serialize};
use voltlog_util::CategoryId;

use crate::{ValidationError, require_text};

/// Icon name used when none is given
pub const DEFAULT_CATEGORY_ICON: &str = "folder";

/// Colors handed out to new categories in turn (ARGB)
pub const CATEGORY_PALETTE: [u32; 10] = [
    0xFF4CAF50, // green
    0xFF2196F3, // blue
    0xFFFF9800, // orange
    0xFF9C27B0, // purple
    0xFFE91E63, // pink
    0xFF00BCD4, // cyan
    0xFFFF5722, // deep orange
    0xFF607D8B, // blue grey
    0xFF795548, // brown
    0xFF3F51B5, // indigo
];

/// Palette color for the `index`-th category, wrapping around
pub fn palette_color(index: usize) -> u32 {
    CATEGORY_PALETTE[index % CATEGORY_PALETTE.len()]
}

/// Parse `#RRGGBB` or `#AARRGGBB` (the `#` is optional). Six digits are opaque.
pub fn parse_color(s: &str) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidColor(s.to_string());
    let digits = s.trim().trim_start_matches('#');
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
    match digits.len() {
        6 => Ok(0xFF00_0000 | value),
        8 => Ok(value),
        _ => Err(invalid()),
    }
}

/// `#RRGGBB`, or `#AARRGGBB` when not fully opaque
pub fn format_color(color: u32) -> String {
    if color >> 24 == 0xFF {
        format!("#{:06X}", color & 0x00FF_FFFF)
    } else {
        format!("#{:08X}", color)
    }
}

/// Input for creating or replacing a category.
///
/// A `None` color picks the next palette color on creation and keeps the
/// current color on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub description: String,
}

fn default_icon() -> String {
    DEFAULT_CATEGORY_ICON.to_string()
}

impl NewCategory {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            icon: default_icon(),
            description: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("icon", &self.icon)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub color: u32,
    pub icon: String,
    pub description: String,
    /// Batteries currently assigned, computed when the category is read
    pub battery_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_wraps() {
        assert_eq!(palette_color(0), 0xFF4CAF50);
        assert_eq!(palette_color(10), palette_color(0));
        assert_eq!(palette_color(13), 0xFF9C27B0);
    }

    #[test]
    fn colors_parse_and_format() {
        assert_eq!(parse_color("#4CAF50").unwrap(), 0xFF4CAF50);
        assert_eq!(parse_color("80ff0000").unwrap(), 0x80FF0000);
        assert_eq!(format_color(0xFF4CAF50), "#4CAF50");
        assert_eq!(format_color(0x80FF0000), "#80FF0000");

        for bad in ["", "#12345", "#GGGGGG", "#+12345", "#123456789"] {
            assert!(
                matches!(parse_color(bad), Err(ValidationError::InvalidColor(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn blank_name_rejected() {
        assert!(NewCategory::named("Racing").validate().is_ok());
        assert_eq!(
            NewCategory::named("  ").validate(),
            Err(ValidationError::BlankField { field: "name" })
        );
    }

    #[test]
    fn missing_icon_defaults_when_deserialized() {
        let parsed: NewCategory = serde_json::from_str(r#"{"name": "Spares"}"#).unwrap();
        assert_eq!(parsed, NewCategory::named("Spares"));
    }
}
