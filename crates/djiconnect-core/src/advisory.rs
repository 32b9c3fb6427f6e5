//! Short-lived user-facing advisory messages
//!
//! Advisories are the only channel through which permission and registration
//! outcomes reach the user. They are presented on the main context regardless
//! of which thread raised them.

use std::fmt;

use serde::Serialize;

/// A user-visible advisory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Runtime permission request issued
    RequestingPermissions,
    /// One or more required permissions are still missing
    MissingPermissions,
    /// Registration handshake started
    Registering,
    /// Registration accepted by the SDK
    RegisterSuccess,
    /// Registration rejected by the SDK
    RegisterFailed { description: String },
    /// A product attached
    ProductConnected,
    /// The product detached
    ProductDisconnected,
}

impl Advisory {
    /// Text shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            Advisory::RequestingPermissions => "Need to grant the permissions!",
            Advisory::MissingPermissions => "Missing permissions!!!",
            Advisory::Registering => "registering, pls wait...",
            Advisory::RegisterSuccess => "Register Success",
            Advisory::RegisterFailed { .. } => {
                "Register sdk fails, please check the bundle id and network connection!"
            }
            Advisory::ProductConnected => "Product Connected",
            Advisory::ProductDisconnected => "Product Disconnected",
        }
    }

    /// Whether this advisory reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Advisory::MissingPermissions | Advisory::RegisterFailed { .. }
        )
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
