//! Domain events emitted by the Engine for external consumers
//!
//! Events are broadcast from the main context after each message is
//! processed, via `Engine::subscribe()`.

use djiconnect_core::{Advisory, RegistrationState};

use crate::permission::GateStatus;

/// Domain events emitted by the Engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A user-visible advisory was presented
    Advisory(Advisory),

    /// Coalesced connectivity change. Carries no payload beyond the tag;
    /// consumers re-query `Engine::snapshot()`.
    ConnectionChanged { tag: &'static str },

    /// Registration moved to a new state
    RegistrationStateChanged(RegistrationState),

    /// A permission check pass completed
    PermissionsChecked(GateStatus),

    /// Engine is shutting down
    Shutdown,
}

impl EngineEvent {
    /// Returns a short string label for this event type (for logging/debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Advisory(_) => "advisory",
            Self::ConnectionChanged { .. } => "connection_changed",
            Self::RegistrationStateChanged(_) => "registration_state",
            Self::PermissionsChecked(_) => "permissions_checked",
            Self::Shutdown => "shutdown",
        }
    }
}
