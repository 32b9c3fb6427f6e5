//! Engine - orchestration of the permission, registration and connection flow
//!
//! The Engine owns the main context's receiving end. Everything user-visible
//! (advisories, the coalesced connection change, registration state) flows
//! through [`Engine::process_message`] and is rebroadcast as an
//! [`EngineEvent`] to any number of subscribers.

use std::sync::Arc;

use djiconnect_core::prelude::*;
use djiconnect_core::{DeviceSnapshot, RegistrationState, CONNECTION_CHANGE_FLAG};
use djiconnect_sdk::{DeviceSdk, PermissionPlatform};
use tokio::sync::{broadcast, mpsc, watch};

use crate::aggregator::ConnectionStateAggregator;
use crate::config::Settings;
use crate::context::ExecutionContexts;
use crate::debouncer::NotificationDebouncer;
use crate::engine_event::EngineEvent;
use crate::message::Message;
use crate::permission::{GateStatus, GrantOutcome, PermissionGate};
use crate::registration::{RegistrationController, RegistrationGuard};
use crate::shutdown::ShutdownHandle;

/// Orchestration engine for djiconnect.
///
/// Wires together:
/// - the permission gate
/// - the one-shot registration controller
/// - the connection state aggregator and its debouncer
/// - event broadcasting for external consumers
pub struct Engine {
    /// Loaded settings
    pub settings: Settings,

    contexts: ExecutionContexts,
    msg_rx: mpsc::UnboundedReceiver<Message>,

    gate: PermissionGate,
    registration: RegistrationController,
    aggregator: Arc<ConnectionStateAggregator>,

    /// Event broadcaster for external consumers.
    event_tx: broadcast::Sender<EngineEvent>,

    quit: bool,
}

impl Engine {
    /// Create an Engine with its own registration guard.
    ///
    /// Must be called inside a Tokio runtime; its handle becomes the
    /// background context and runs the debounce timer.
    pub fn new(
        settings: Settings,
        sdk: Arc<dyn DeviceSdk>,
        platform: Arc<dyn PermissionPlatform>,
    ) -> Result<Self> {
        let guard = Arc::new(RegistrationGuard::new());
        Self::with_registration_guard(settings, sdk, platform, guard)
    }

    /// Create an Engine that shares `guard` with other owners.
    ///
    /// Engines sharing a guard register with the SDK at most once between
    /// them.
    pub fn with_registration_guard(
        settings: Settings,
        sdk: Arc<dyn DeviceSdk>,
        platform: Arc<dyn PermissionPlatform>,
        guard: Arc<RegistrationGuard>,
    ) -> Result<Self> {
        let (contexts, msg_rx) = ExecutionContexts::current()?;

        let debouncer = NotificationDebouncer::new(
            settings.notifications.debounce_window(),
            contexts.background.clone(),
            contexts.main.clone(),
        );
        let aggregator = ConnectionStateAggregator::new(
            debouncer,
            contexts.main.clone(),
            settings.connection.discard_stale_component_events,
        );
        let registration = RegistrationController::new(
            guard,
            sdk,
            aggregator.clone(),
            contexts.main.clone(),
            contexts.background.clone(),
        );
        let gate = PermissionGate::new(
            settings.permissions.permission_set(),
            platform,
            contexts.main.clone(),
        );

        let (event_tx, _) = broadcast::channel(256);

        debug!(
            "Engine created: {} required permissions, {}ms debounce",
            gate.required().len(),
            settings.notifications.debounce_ms
        );

        Ok(Self {
            settings,
            contexts,
            msg_rx,
            gate,
            registration,
            aggregator,
            event_tx,
            quit: false,
        })
    }

    /// Subscribe to engine events.
    ///
    /// If the subscriber falls behind (buffer full), older events are
    /// dropped. Use `broadcast::error::RecvError::Lagged` to detect this.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Run the startup permission check and, when possible, registration.
    pub fn start(&mut self) -> GateStatus {
        let status = self.gate.check_and_request();
        self.emit(EngineEvent::PermissionsChecked(status));

        match status {
            GateStatus::AllGranted => self.registration.start_registration(),
            GateStatus::Unsupported if self.settings.permissions.install_time_grants_sufficient => {
                info!("Runtime permission requests unsupported, registering anyway");
                self.registration.start_registration();
            }
            GateStatus::Unsupported => {
                warn!("Missing permissions: {:?}", self.gate.missing());
            }
            GateStatus::Requesting => {}
        }
        status
    }

    /// Deliver a platform permission response.
    ///
    /// Starts registration once nothing is missing.
    pub fn on_permission_result(
        &mut self,
        requested: &[String],
        grants: &[bool],
    ) -> Result<GrantOutcome> {
        let outcome = self.gate.on_permission_result(requested, grants)?;
        if outcome == GrantOutcome::ReadyToRegister {
            self.registration.start_registration();
        }
        Ok(outcome)
    }

    /// Process a single message on the main context.
    pub fn process_message(&mut self, msg: Message) {
        match msg {
            Message::Advisory(advisory) => {
                if advisory.is_failure() {
                    warn!("Advisory: {}", advisory);
                } else {
                    info!("Advisory: {}", advisory);
                }
                self.emit(EngineEvent::Advisory(advisory));
            }
            Message::ConnectionChanged => {
                debug!("Broadcasting {}", CONNECTION_CHANGE_FLAG);
                self.emit(EngineEvent::ConnectionChanged {
                    tag: CONNECTION_CHANGE_FLAG,
                });
            }
            Message::RegistrationStateChanged(state) => {
                self.emit(EngineEvent::RegistrationStateChanged(state));
            }
            Message::PermissionResult { requested, grants } => {
                if let Err(e) = self.on_permission_result(&requested, &grants) {
                    warn!("Ignoring permission result: {}", e);
                }
            }
            Message::Quit => {
                info!("Quit requested");
                self.quit = true;
            }
        }
    }

    /// Wait for the next message posted to the main context.
    pub async fn next_message(&mut self) -> Option<Message> {
        self.msg_rx.recv().await
    }

    /// Drain and process all pending messages from the channel.
    ///
    /// Returns the number of messages processed.
    pub fn drain_pending_messages(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg);
            count += 1;
        }
        count
    }

    /// Process messages until a quit is requested.
    pub async fn run(&mut self) {
        while !self.should_quit() {
            match self.next_message().await {
                Some(msg) => self.process_message(msg),
                None => break,
            }
        }
    }

    /// Get a clone of the main context sender for spawning input sources.
    pub fn msg_sender(&self) -> mpsc::UnboundedSender<Message> {
        self.contexts.main.sender()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Current device view. Consumers call this after a connection change.
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.aggregator.snapshot()
    }

    /// Shared handle for reading snapshots from other tasks
    pub fn snapshot_source(&self) -> Arc<ConnectionStateAggregator> {
        self.aggregator.clone()
    }

    /// Trigger for stopping this engine from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.aggregator.clone(), self.contexts.main.clone())
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.registration.state()
    }

    pub fn subscribe_registration(&self) -> watch::Receiver<RegistrationState> {
        self.registration.subscribe_state()
    }

    pub fn missing_permissions(&self) -> &[String] {
        self.gate.missing()
    }

    /// Tear down: detach from the SDK, cancel any pending notification and
    /// stop the main loop.
    pub fn shutdown(&mut self) {
        self.emit(EngineEvent::Shutdown);
        self.aggregator.detach();
        self.quit = true;
    }

    fn emit(&self, event: EngineEvent) {
        trace!("Emitting {}", event.event_type());
        let _ = self.event_tx.send(event);
    }
}
