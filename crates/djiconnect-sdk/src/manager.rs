//! SDK entry points and the host permission platform

use std::sync::Arc;

use crate::listener::SdkManagerCallback;

/// Entry points of the device SDK
///
/// Both calls return immediately; results arrive later through the callback.
pub trait DeviceSdk: Send + Sync {
    /// Start the asynchronous registration handshake.
    ///
    /// The SDK keeps `callback` and uses it for the registration result and
    /// all product/component events that follow.
    fn register_app(&self, callback: Arc<dyn SdkManagerCallback>);

    /// Begin discovering and connecting to a product.
    ///
    /// Returns `false` if the SDK refused to start (e.g. not registered).
    fn start_connection_to_product(&self) -> bool;
}

/// Host platform permission queries and requests
pub trait PermissionPlatform: Send + Sync {
    /// Whether `permission` is currently granted
    fn is_granted(&self, permission: &str) -> bool;

    /// Whether permissions can be requested at runtime
    fn supports_runtime_requests(&self) -> bool;

    /// Issue one batched request. The outcome is delivered back to the host
    /// later as parallel arrays of identifiers and grant flags.
    fn request_permissions(&self, permissions: &[String]);
}
