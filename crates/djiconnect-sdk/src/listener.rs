//! Callback interfaces the device SDK invokes
//!
//! The SDK delivers every callback on threads it owns, possibly concurrently.
//! Implementations must return quickly and never block on the caller's thread.

use std::sync::Arc;

use djiconnect_core::{ComponentKey, InitEvent, ProductInfo, RegistrationResult};

use crate::component::Component;

/// Receives connectivity flips for a single component
pub trait ComponentListener: Send + Sync {
    fn on_connectivity_change(&self, is_connected: bool);
}

/// Product and component attach/detach events
pub trait ConnectionListener: Send + Sync {
    /// A product attached
    fn on_product_connect(&self, product: ProductInfo);

    /// The product detached
    fn on_product_disconnect(&self);

    /// A component slot changed. `old` is the component previously in the
    /// slot, `new` the one now in it; either may be absent.
    fn on_component_change(
        &self,
        key: ComponentKey,
        old: Option<Arc<dyn Component>>,
        new: Option<Arc<dyn Component>>,
    );
}

/// Callback object handed to [`crate::DeviceSdk::register_app`]
///
/// Extends [`ConnectionListener`] because the SDK uses the same object for
/// the registration result and for every later product event.
pub trait SdkManagerCallback: ConnectionListener {
    /// Registration finished, successfully or not
    fn on_register(&self, result: RegistrationResult);

    /// SDK initialization progress
    fn on_init_process(&self, _event: InitEvent, _total_process: u32) {}

    /// Flight-database download progress in bytes
    fn on_database_download_progress(&self, _current: u64, _total: u64) {}
}
