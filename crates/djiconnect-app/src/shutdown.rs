//! Graceful shutdown from outside the main loop
//!
//! A [`ShutdownHandle`] tears the connection side down where the trigger
//! happens: the aggregator is detached from every component it listens to
//! and the pending connection-change notification is cancelled before the
//! main loop is asked to stop. Nothing queued behind the quit request can
//! therefore produce a late `dji_sdk_connection_change`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use djiconnect_core::prelude::*;
use tokio::task::JoinHandle;

use crate::aggregator::ConnectionStateAggregator;
use crate::context::MainContext;
use crate::message::Message;

/// What asked the engine to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    ExitTimer,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::Terminate => write!(f, "terminate"),
            ShutdownReason::ExitTimer => write!(f, "exit timer"),
        }
    }
}

/// Cloneable trigger for tearing down an engine's connection tracking
#[derive(Clone)]
pub struct ShutdownHandle {
    aggregator: Arc<ConnectionStateAggregator>,
    main: MainContext,
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("detached", &self.aggregator.is_detached())
            .finish()
    }
}

impl ShutdownHandle {
    pub fn new(aggregator: Arc<ConnectionStateAggregator>, main: MainContext) -> Self {
        Self { aggregator, main }
    }

    /// Detach from the SDK, cancel any pending notification and ask the
    /// main loop to quit. Later triggers only repeat the quit request.
    pub fn trigger(&self, reason: ShutdownReason) {
        info!("Shutting down ({})", reason);
        self.aggregator.detach();
        if !self.main.post(Message::Quit) {
            debug!("Main loop already gone");
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.aggregator.is_detached()
    }
}

/// Trigger `handle` once `wait` resolves
pub fn spawn_shutdown_on<F>(handle: ShutdownHandle, wait: F) -> JoinHandle<()>
where
    F: Future<Output = Result<ShutdownReason>> + Send + 'static,
{
    tokio::spawn(async move {
        match wait.await {
            Ok(reason) => handle.trigger(reason),
            Err(e) => error!("Shutdown listener failed: {}", e),
        }
    })
}

/// Trigger `handle` on SIGINT/SIGTERM (Ctrl+C on Windows)
pub fn spawn_signal_handler(handle: ShutdownHandle) -> JoinHandle<()> {
    spawn_shutdown_on(handle, wait_for_signal())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<ShutdownReason> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())
        .map_err(|e| Error::signal(format!("SIGINT handler: {}", e)))?;
    let mut terminate = signal(SignalKind::terminate())
        .map_err(|e| Error::signal(format!("SIGTERM handler: {}", e)))?;

    Ok(tokio::select! {
        _ = interrupt.recv() => ShutdownReason::Interrupt,
        _ = terminate.recv() => ShutdownReason::Terminate,
    })
}

#[cfg(windows)]
async fn wait_for_signal() -> Result<ShutdownReason> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::signal(format!("Ctrl+C handler: {}", e)))?;
    Ok(ShutdownReason::Interrupt)
}
