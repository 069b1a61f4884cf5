//! Time utilities for voltlog
//!
//! History entries are stamped with wall-clock time. Derived values that
//! depend on "today" (battery age, alerts) take the date as a parameter so
//! they stay pure; callers obtain it from [`today`].
//!
//! # Mock Time for Development
//!
//! In debug builds, the `VOLTLOG_MOCK_TIME` environment variable overrides
//! the system time. Format: `YYYY-MM-DD HH:MM:SS`.
//!
//! ```bash
//! VOLTLOG_MOCK_TIME="2025-12-25 14:30:00" voltlog alerts
//! ```

use chrono::{DateTime, Local, NaiveDate};
#[cfg(debug_assertions)]
use chrono::{NaiveDateTime, TimeZone};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "VOLTLOG_MOCK_TIME";

/// Offset between mock time and real time at process start.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => {
                        if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                            let offset = mock_dt.signed_duration_since(Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Today's local calendar date.
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// Format a timestamp for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Compact timestamp used in generated file names, e.g. `20250314_091502`.
pub fn format_file_stamp(dt: &DateTime<Local>) -> String {
    dt.format("%Y%m%d_%H%M%S").to_string()
}

/// Whole days from `earlier` to `later`; negative when `earlier` is in the future.
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    later.signed_duration_since(earlier).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_file_stamp() {
        let dt = Local.with_ymd_and_hms(2025, 3, 14, 9, 15, 2).unwrap();
        assert_eq!(format_file_stamp(&dt), "20250314_091502");
        assert_eq!(format_datetime_full(&dt), "2025-03-14 09:15:02");
    }

    #[test]
    fn test_days_between() {
        let a = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(days_between(a, b), 59);
        assert_eq!(days_between(b, a), -59);
        assert_eq!(days_between(a, a), 0);
    }

    #[test]
    fn test_now_is_close_to_system_time_without_mock() {
        if is_mock_time_active() {
            return;
        }
        let delta = (now() - Local::now()).num_seconds().abs();
        assert!(delta < 2);
    }
}
