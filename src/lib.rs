//! djiconnect Library
//!
//! Headless host for the djiconnect engine: runs permission gating,
//! registration and connection tracking against the simulated SDK and
//! reports progress as NDJSON.

pub mod headless;

// Re-export main entry points
pub use headless::runner::{build_engine, run_headless, HeadlessOptions};
pub use headless::HeadlessEvent;
