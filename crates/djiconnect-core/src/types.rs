//! Core domain types shared by every djiconnect crate

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Broadcast tag carried by every coalesced connection-change notification
pub const CONNECTION_CHANGE_FLAG: &str = "dji_sdk_connection_change";

// ─────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────

/// Ordered set of capability identifiers required before registration
///
/// Built once at startup and read-only afterwards. Duplicates in the input
/// are dropped, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionSet {
    permissions: Vec<String>,
}

impl PermissionSet {
    pub fn new(permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for permission in permissions {
            let permission = permission.into();
            if !unique.contains(&permission) {
                unique.push(permission);
            }
        }
        Self {
            permissions: unique,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

// ─────────────────────────────────────────────────────────────────
// Product / Components
// ─────────────────────────────────────────────────────────────────

/// Sub-unit of a connected product with its own connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKey {
    FlightController,
    Camera,
    Gimbal,
    Battery,
    RemoteController,
    AirLink,
    Payload,
    Rtk,
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKey::FlightController => "FlightController",
            ComponentKey::Camera => "Camera",
            ComponentKey::Gimbal => "Gimbal",
            ComponentKey::Battery => "Battery",
            ComponentKey::RemoteController => "RemoteController",
            ComponentKey::AirLink => "AirLink",
            ComponentKey::Payload => "Payload",
            ComponentKey::Rtk => "RTK",
        };
        f.write_str(name)
    }
}

/// Identity of an attached product as reported by the SDK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Model name (e.g. "Mavic 3")
    pub model: String,

    /// Serial number, when the SDK has read it
    #[serde(default)]
    pub serial: Option<String>,
}

impl ProductInfo {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            serial: None,
        }
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }
}

impl fmt::Display for ProductInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.serial {
            Some(serial) => write!(f, "{} ({})", self.model, serial),
            None => f.write_str(&self.model),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────

/// Lifecycle of the one-shot SDK registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    #[default]
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
}

impl RegistrationState {
    /// Whether `self -> next` is a legal transition
    ///
    /// There is no edge out of `Failed`: re-registration needs a new process.
    pub fn can_transition_to(self, next: RegistrationState) -> bool {
        matches!(
            (self, next),
            (RegistrationState::NotStarted, RegistrationState::InProgress)
                | (RegistrationState::InProgress, RegistrationState::Succeeded)
                | (RegistrationState::InProgress, RegistrationState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RegistrationState::Succeeded | RegistrationState::Failed)
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationState::NotStarted => "NotStarted",
            RegistrationState::InProgress => "InProgress",
            RegistrationState::Succeeded => "Succeeded",
            RegistrationState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Result code reported by the SDK's registration callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationCode {
    Success,
    InvalidAppKey,
    BundleIdMismatch,
    NetworkUnreachable,
    ServerRejected,
    Unknown,
}

/// Payload of the SDK registration callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub code: RegistrationCode,
    pub description: String,
}

impl RegistrationResult {
    pub fn success() -> Self {
        Self {
            code: RegistrationCode::Success,
            description: "Registration success".to_string(),
        }
    }

    pub fn failure(code: RegistrationCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == RegistrationCode::Success
    }
}

/// SDK initialization progress stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitEvent {
    StartToInitialize,
    InitializeComplete,
}

// ─────────────────────────────────────────────────────────────────
// Device Snapshot
// ─────────────────────────────────────────────────────────────────

/// Point-in-time view of product and component connectivity
///
/// `generation` advances on every product disconnect, letting component
/// events be tagged with the product session they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceSnapshot {
    pub product_present: bool,
    pub product: Option<ProductInfo>,
    pub component_connectivity: BTreeMap<ComponentKey, bool>,
    pub generation: u64,
}

impl DeviceSnapshot {
    pub fn is_component_connected(&self, key: ComponentKey) -> bool {
        self.component_connectivity
            .get(&key)
            .copied()
            .unwrap_or(false)
    }

    pub fn connected_component_count(&self) -> usize {
        self.component_connectivity.values().filter(|c| **c).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_set_keeps_order_and_drops_duplicates() {
        let set = PermissionSet::new(["B", "A", "B", "C"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["B", "A", "C"]);
        assert_eq!(set.len(), 3);
        assert!(set.contains("A"));
        assert!(!set.contains("D"));
    }

    #[test]
    fn test_registration_transitions() {
        use RegistrationState::*;

        assert!(NotStarted.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Succeeded));
        assert!(InProgress.can_transition_to(Failed));

        assert!(!Failed.can_transition_to(InProgress));
        assert!(!Succeeded.can_transition_to(InProgress));
        assert!(!NotStarted.can_transition_to(Succeeded));
        assert!(!InProgress.can_transition_to(InProgress));
    }

    #[test]
    fn test_registration_terminal_states() {
        assert!(RegistrationState::Succeeded.is_terminal());
        assert!(RegistrationState::Failed.is_terminal());
        assert!(!RegistrationState::InProgress.is_terminal());
        assert!(!RegistrationState::NotStarted.is_terminal());
    }

    #[test]
    fn test_registration_result_success() {
        assert!(RegistrationResult::success().is_success());
        assert!(
            !RegistrationResult::failure(RegistrationCode::NetworkUnreachable, "offline")
                .is_success()
        );
    }

    #[test]
    fn test_snapshot_component_queries() {
        let mut snapshot = DeviceSnapshot::default();
        snapshot
            .component_connectivity
            .insert(ComponentKey::Camera, true);
        snapshot
            .component_connectivity
            .insert(ComponentKey::Gimbal, false);

        assert!(snapshot.is_component_connected(ComponentKey::Camera));
        assert!(!snapshot.is_component_connected(ComponentKey::Gimbal));
        assert!(!snapshot.is_component_connected(ComponentKey::Battery));
        assert_eq!(snapshot.connected_component_count(), 1);
    }

    #[test]
    fn test_snapshot_serializes_component_keys_as_strings() {
        let mut snapshot = DeviceSnapshot {
            product_present: true,
            product: Some(ProductInfo::new("Mavic 3")),
            ..Default::default()
        };
        snapshot
            .component_connectivity
            .insert(ComponentKey::FlightController, true);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["component_connectivity"]["flight_controller"], true);
        assert_eq!(json["product"]["model"], "Mavic 3");
    }

    #[test]
    fn test_product_display() {
        assert_eq!(ProductInfo::new("Mini 4").to_string(), "Mini 4");
        assert_eq!(
            ProductInfo::new("Mini 4").with_serial("SN1").to_string(),
            "Mini 4 (SN1)"
        );
    }
}
