//! djiconnect-app - Registration, connection tracking and orchestration
//!
//! This crate gates SDK registration behind a permission check, performs the
//! one-shot registration handshake, aggregates product and component
//! connectivity into a single snapshot and republishes changes as one
//! debounced notification. The [`Engine`] ties these together for host
//! runners.

pub mod aggregator;
pub mod config;
pub mod context;
pub mod debouncer;
pub mod engine;
pub mod engine_event;
pub mod message;
pub mod permission;
pub mod registration;
pub mod shutdown;

// Re-export primary types
pub use aggregator::ConnectionStateAggregator;
pub use config::Settings;
pub use context::{ExecutionContexts, MainContext};
pub use debouncer::{NotificationDebouncer, DEFAULT_DEBOUNCE_MS};
pub use engine::Engine;
pub use engine_event::EngineEvent;
pub use message::Message;
pub use permission::{GateStatus, GrantOutcome, PermissionGate};
pub use registration::{RegistrationController, RegistrationGuard};
pub use shutdown::{ShutdownHandle, ShutdownReason};
