//! Settings parser for .djiconnect/config.toml

use std::path::Path;

use djiconnect_core::prelude::*;

use super::types::Settings;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const CONFIG_DIR: &str = ".djiconnect";

/// Load settings from .djiconnect/config.toml
///
/// Returns default settings if file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(CONFIG_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match load_settings_file(&config_path) {
        Ok(settings) => {
            debug!("Loaded settings from {:?}", config_path);
            settings
        }
        Err(e) => {
            warn!("Failed to load {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Load settings from an explicit path
///
/// Unlike [`load_settings`] this fails loudly: the caller asked for this file.
pub fn load_settings_file(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::config_not_found(path));
    }
    let content = std::fs::read_to_string(path)?;
    let settings = toml::from_str(&content)?;
    Ok(settings)
}

/// Create default config file in .djiconnect/ directory
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let config_dir = project_path.join(CONFIG_DIR);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .map_err(|e| Error::config(format!("Failed to create .djiconnect dir: {}", e)))?;
    }

    let config_path = config_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let default_content = r#"# djiconnect Configuration

[permissions]
# Capabilities that must be granted before SDK registration.
# Omit to use the built-in Android list.
# required = ["android.permission.INTERNET", "android.permission.BLUETOOTH"]
install_time_grants_sufficient = false  # Register even if runtime requests are unsupported

[notifications]
debounce_ms = 500       # Quiet period before "dji_sdk_connection_change" fires

[connection]
discard_stale_component_events = false  # Drop flips from a previous product connection
"#;
        std::fs::write(&config_path, default_content)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
    }

    Ok(())
}
