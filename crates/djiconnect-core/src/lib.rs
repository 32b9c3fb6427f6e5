//! # djiconnect-core - Core Domain Types
//!
//! Foundation crate for djiconnect. Provides domain types, error handling,
//! user advisories and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, toml, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`PermissionSet`] - Ordered, immutable set of required capabilities
//! - [`RegistrationState`] - One-shot registration lifecycle
//! - [`RegistrationResult`] - Payload of the SDK registration callback
//! - [`DeviceSnapshot`] - Product and component connectivity view
//! - [`ComponentKey`], [`ProductInfo`] - Identity of attached hardware
//!
//! ### Advisories (`advisory`)
//! - [`Advisory`] - User-visible short messages
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use djiconnect_core::prelude::*;
//! ```

pub mod advisory;
pub mod error;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all djiconnect crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use advisory::Advisory;
pub use error::{Error, Result, ResultExt};
pub use types::{
    ComponentKey, DeviceSnapshot, InitEvent, PermissionSet, ProductInfo, RegistrationCode,
    RegistrationResult, RegistrationState, CONNECTION_CHANGE_FLAG,
};
