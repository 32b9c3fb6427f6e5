//! Configuration types for djiconnect
//!
//! Defines `Settings` and its sections as read from `.djiconnect/config.toml`.

use std::time::Duration;

use djiconnect_core::PermissionSet;
use serde::{Deserialize, Serialize};

use crate::debouncer::DEFAULT_DEBOUNCE_MS;

/// Capabilities the host application needs before it may register
pub const DEFAULT_REQUIRED_PERMISSIONS: [&str; 13] = [
    "android.permission.VIBRATE",
    "android.permission.INTERNET",
    "android.permission.ACCESS_WIFI_STATE",
    "android.permission.WAKE_LOCK",
    "android.permission.ACCESS_COARSE_LOCATION",
    "android.permission.ACCESS_NETWORK_STATE",
    "android.permission.ACCESS_FINE_LOCATION",
    "android.permission.CHANGE_WIFI_STATE",
    "android.permission.WRITE_EXTERNAL_STORAGE",
    "android.permission.BLUETOOTH",
    "android.permission.BLUETOOTH_ADMIN",
    "android.permission.READ_EXTERNAL_STORAGE",
    "android.permission.READ_PHONE_STATE",
];

/// Application settings (.djiconnect/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub permissions: PermissionSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub connection: ConnectionSettings,
}

/// Permission gate settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PermissionSettings {
    /// Capability identifiers that must be granted before registration
    #[serde(default = "default_required_permissions")]
    pub required: Vec<String>,

    /// Register anyway when permissions are missing and the platform cannot
    /// request them at runtime (grants were fixed at install time)
    #[serde(default)]
    pub install_time_grants_sufficient: bool,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            required: default_required_permissions(),
            install_time_grants_sufficient: false,
        }
    }
}

impl PermissionSettings {
    pub fn permission_set(&self) -> PermissionSet {
        PermissionSet::new(self.required.iter().cloned())
    }
}

/// Connection-change notification settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotificationSettings {
    /// Quiescence window before a coalesced change is emitted
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl NotificationSettings {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Connectivity tracking settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Drop component flips that belong to an earlier product connection
    #[serde(default)]
    pub discard_stale_component_events: bool,
}

fn default_required_permissions() -> Vec<String> {
    DEFAULT_REQUIRED_PERMISSIONS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
