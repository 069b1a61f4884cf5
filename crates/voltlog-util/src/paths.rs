//! Default paths for voltlog
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/voltlog/config.toml` or `~/.config/voltlog/config.toml`
//! - Data: `$XDG_DATA_HOME/voltlog` or `~/.local/share/voltlog`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const VOLTLOG_CONFIG_ENV: &str = "VOLTLOG_CONFIG";

/// Environment variable for overriding the data directory
pub const VOLTLOG_DATA_DIR_ENV: &str = "VOLTLOG_DATA_DIR";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "voltlog.db";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Application subdirectory name
const APP_DIR: &str = "voltlog";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$VOLTLOG_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/voltlog/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/voltlog/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(VOLTLOG_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/tmp").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$VOLTLOG_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/voltlog` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/voltlog` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(VOLTLOG_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    xdg_data_dir()
}

/// XDG data directory for voltlog, ignoring `$VOLTLOG_DATA_DIR`
fn xdg_data_dir() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Path of the database file inside a data directory
pub fn database_path(data_dir: impl Into<PathBuf>) -> PathBuf {
    data_dir.into().join(DATABASE_FILENAME)
}
