//! # djiconnect-sdk - Device SDK Boundary
//!
//! Interfaces at the edge between djiconnect and the vendor device SDK plus
//! the host permission platform. Nothing here implements vendor behaviour;
//! the [`simulated`] module provides a scenario-driven stand-in.
//!
//! Depends on [`djiconnect_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### SDK Entry Points
//! - [`DeviceSdk`] - `register_app` / `start_connection_to_product`
//! - [`PermissionPlatform`] - Grant queries and batched runtime requests
//!
//! ### Callbacks
//! - [`SdkManagerCallback`] - Registration result plus product events
//! - [`ConnectionListener`] - Product connect/disconnect, component changes
//! - [`ComponentListener`] - Per-component connectivity flips
//! - [`Component`] - Handle to a product sub-unit
//!
//! ### Simulation
//! - [`SimulatedSdk`] - Replays a [`Scenario`] on SDK-owned threads
//! - [`SimulatedPermissions`] - In-memory permission platform

pub mod component;
pub mod listener;
pub mod manager;
pub mod simulated;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use component::Component;
pub use listener::{ComponentListener, ConnectionListener, SdkManagerCallback};
pub use manager::{DeviceSdk, PermissionPlatform};
pub use simulated::{
    PermissionResponse, RegistrationOutcome, Scenario, ScenarioEvent, ScenarioStep,
    SimulatedComponent, SimulatedPermissions, SimulatedSdk,
};
