//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Signal handling error: {message}")]
    Signal { message: String },

    // ─────────────────────────────────────────────────────────────
    // Permission Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Required permissions not granted: {}", missing.join(", "))]
    PermissionDenied { missing: Vec<String> },

    #[error("Permission result arrays differ in length: {requested} requested, {outcomes} outcomes")]
    PermissionResultMismatch { requested: usize, outcomes: usize },

    // ─────────────────────────────────────────────────────────────
    // Registration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("SDK registration failed: {description}")]
    RegistrationFailed { description: String },

    #[error("Illegal registration state transition: {from} -> {to}")]
    RegistrationTransition { from: String, to: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn signal(message: impl Into<String>) -> Self {
        Self::Signal {
            message: message.into(),
        }
    }

    pub fn permission_denied(missing: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::PermissionDenied {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    pub fn registration_failed(description: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            description: description.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Permission and registration failures end the current attempt but never
    /// the process; a fresh external trigger may start a new attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::PermissionDenied { .. }
                | Error::PermissionResultMismatch { .. }
                | Error::RegistrationFailed { .. }
                | Error::ChannelSend { .. }
        )
    }

    /// Check if this error should trigger application exit
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ConfigNotFound { .. } | Error::Signal { .. })
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
