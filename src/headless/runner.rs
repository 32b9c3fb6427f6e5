//! Headless mode runner - engine event loop with NDJSON output
//!
//! Drives the [`Engine`] against the simulated SDK and permission platform.
//! Permission responses from the platform are routed back through the main
//! context, exactly as a host would deliver them.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use djiconnect_app::shutdown::{self, ShutdownHandle, ShutdownReason};
use djiconnect_app::{ConnectionStateAggregator, Engine, EngineEvent, Message, Settings};
use djiconnect_core::prelude::*;
use djiconnect_sdk::{PermissionResponse, Scenario, SimulatedPermissions, SimulatedSdk};

use super::HeadlessEvent;

/// Everything a headless run needs
#[derive(Debug, Clone, Default)]
pub struct HeadlessOptions {
    pub settings: Settings,
    pub scenario: Scenario,
    /// Required permissions the simulated user refuses
    pub denied: Vec<String>,
    /// Simulate a platform that cannot request permissions at runtime
    pub no_runtime_requests: bool,
    /// Stop on our own after this long
    pub exit_after: Option<Duration>,
}

/// Run in headless mode, writing NDJSON events to stdout
pub async fn run_headless(options: HeadlessOptions) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("djiconnect starting in HEADLESS mode");
    info!("═══════════════════════════════════════════════════════");

    let mut engine = build_engine(&options)?;
    shutdown::spawn_signal_handler(engine.shutdown_handle());
    spawn_exit_timer(engine.shutdown_handle(), options.exit_after);

    let printer = spawn_event_printer(engine.subscribe(), engine.snapshot_source(), || {
        std::io::stdout()
    });

    engine.start();
    engine.run().await;
    engine.shutdown();

    if let Err(e) = printer.await {
        warn!("Event printer task failed: {}", e);
    }

    info!("djiconnect headless mode exiting");
    Ok(())
}

/// Build an engine wired to the simulated SDK and permission platform
pub fn build_engine(options: &HeadlessOptions) -> Result<Engine> {
    let sdk = SimulatedSdk::new(options.scenario.clone());

    let grant_on_request: Vec<String> = options
        .settings
        .permissions
        .required
        .iter()
        .filter(|p| !options.denied.contains(p))
        .cloned()
        .collect();
    let (platform, responses) = SimulatedPermissions::new(
        Vec::<String>::new(),
        grant_on_request,
        !options.no_runtime_requests,
    );

    let engine = Engine::new(options.settings.clone(), Arc::new(sdk), Arc::new(platform))?;
    spawn_permission_bridge(responses, engine.msg_sender());
    Ok(engine)
}

/// Forward platform permission responses into the main context
fn spawn_permission_bridge(
    mut responses: mpsc::UnboundedReceiver<PermissionResponse>,
    tx: mpsc::UnboundedSender<Message>,
) {
    tokio::spawn(async move {
        while let Some(response) = responses.recv().await {
            debug!("Permission response: {:?}", response);
            let msg = Message::PermissionResult {
                requested: response.requested,
                grants: response.grants,
            };
            if tx.send(msg).is_err() {
                break;
            }
        }
    });
}

fn spawn_exit_timer(handle: ShutdownHandle, exit_after: Option<Duration>) {
    let Some(after) = exit_after else {
        return;
    };
    shutdown::spawn_shutdown_on(handle, async move {
        tokio::time::sleep(after).await;
        debug!("Exit timer elapsed after {:?}", after);
        Ok(ShutdownReason::ExitTimer)
    });
}

/// Print engine events until shutdown
///
/// Connection changes are printed together with a freshly read snapshot.
pub fn spawn_event_printer<W, F>(
    mut events: broadcast::Receiver<EngineEvent>,
    source: Arc<ConnectionStateAggregator>,
    writer: F,
) -> JoinHandle<()>
where
    W: Write + Send,
    F: Fn() -> W + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let shutdown = event == EngineEvent::Shutdown;
                    let line = HeadlessEvent::from_engine_event(&event, || source.snapshot());
                    if let Err(e) = line.write_to(&mut writer()) {
                        warn!("Failed to write headless event: {}", e);
                    }
                    if shutdown {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    let line = HeadlessEvent::error(format!("Dropped {} events", n), false);
                    if let Err(e) = line.write_to(&mut writer()) {
                        warn!("Failed to write headless event: {}", e);
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
