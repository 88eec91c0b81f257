//! Platform-specific path utilities.

use crate::config::RegistryConfig;
use crate::error::{LocatorError, Result};
use std::path::PathBuf;

/// Get the locator's directory under the platform config dir.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/xproc`
/// - **Windows**: `%APPDATA%\xproc`
/// - **macOS**: `~/Library/Application Support/xproc`
pub fn locator_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| LocatorError::Config {
        message: "Could not determine platform config directory".to_string(),
    })?;
    Ok(config_dir.join(RegistryConfig::APP_CONFIG_DIR_NAME))
}

/// Get the path to the directory registry database.
///
/// Returns `{locator_config_dir}/directory.db`.
pub fn registry_db_path() -> Result<PathBuf> {
    Ok(locator_config_dir()?.join(RegistryConfig::DB_FILENAME))
}
