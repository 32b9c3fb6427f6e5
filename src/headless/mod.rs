//! Headless mode - NDJSON event output
//!
//! Runs the engine against the simulated SDK and writes one JSON object per
//! line to stdout, so scripts can follow registration and connectivity
//! without parsing log text.
//!
//! # Example Output
//!
//! ```json
//! {"event":"registration_state","state":"in_progress","timestamp":1704700001000}
//! {"event":"advisory","advisory":{"kind":"register_success"},"message":"Register Success","timestamp":1704700001200}
//! {"event":"connection_changed","tag":"dji_sdk_connection_change","snapshot":{...},"timestamp":1704700001900}
//! ```

pub mod runner;

use std::io::{self, Write};

use chrono::Utc;
use djiconnect_app::{EngineEvent, GateStatus};
use djiconnect_core::{Advisory, DeviceSnapshot, RegistrationState};
use serde::Serialize;
use tracing::error;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Permission check pass finished
    PermissionsChecked { status: GateStatus, timestamp: i64 },

    /// User-facing advisory
    Advisory {
        advisory: Advisory,
        message: String,
        timestamp: i64,
    },

    /// Registration state transition
    RegistrationState {
        state: RegistrationState,
        timestamp: i64,
    },

    /// Coalesced connectivity change with the re-queried snapshot
    ConnectionChanged {
        tag: String,
        snapshot: DeviceSnapshot,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    /// Engine is shutting down
    Shutdown { timestamp: i64 },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write headless event to stdout: {}", e);
        }
    }

    /// Write this event as one NDJSON line and flush
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let json = serde_json::to_string(self)?;
        writeln!(out, "{}", json)?;
        out.flush()
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Translate an engine event, reading the snapshot only when needed
    pub fn from_engine_event(
        event: &EngineEvent,
        snapshot: impl FnOnce() -> DeviceSnapshot,
    ) -> Self {
        match event {
            EngineEvent::PermissionsChecked(status) => Self::PermissionsChecked {
                status: *status,
                timestamp: Self::now(),
            },
            EngineEvent::Advisory(advisory) => Self::advisory(advisory),
            EngineEvent::RegistrationStateChanged(state) => Self::RegistrationState {
                state: *state,
                timestamp: Self::now(),
            },
            EngineEvent::ConnectionChanged { tag } => Self::ConnectionChanged {
                tag: tag.to_string(),
                snapshot: snapshot(),
                timestamp: Self::now(),
            },
            EngineEvent::Shutdown => Self::Shutdown {
                timestamp: Self::now(),
            },
        }
    }

    pub fn advisory(advisory: &Advisory) -> Self {
        Self::Advisory {
            advisory: advisory.clone(),
            message: advisory.message().to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}
