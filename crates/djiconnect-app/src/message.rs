//! Messages delivered to the main context

use djiconnect_core::{Advisory, RegistrationState};

/// Everything the main context is asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Present an advisory to the user
    Advisory(Advisory),

    /// Coalesced connectivity change; consumers re-query the snapshot
    ConnectionChanged,

    /// Registration moved to a new state
    RegistrationStateChanged(RegistrationState),

    /// Platform delivered the outcome of a runtime permission request.
    /// The two vectors are index-aligned.
    PermissionResult {
        requested: Vec<String>,
        grants: Vec<bool>,
    },

    /// Stop the main loop (signal handler, host shutdown)
    Quit,
}
