//! End-to-end connection flow against the simulated SDK
//!
//! Drives the Engine the way a host does: start, pump the main context, and
//! watch the broadcast events. Timing assertions only use lower bounds, since
//! the simulated SDK sleeps on real threads.

use std::sync::Arc;
use std::time::Duration;

use djiconnect_app::{Engine, EngineEvent, Settings};
use djiconnect_core::{Advisory, ComponentKey, RegistrationCode, RegistrationState};
use djiconnect_sdk::test_utils::{flip, instant_outcome};
use djiconnect_sdk::{Scenario, ScenarioEvent, ScenarioStep, SimulatedPermissions, SimulatedSdk};
use tempfile::tempdir;
use tokio::sync::broadcast;
use tokio::time::Instant;

struct Recorded {
    at: Duration,
    event: EngineEvent,
}

fn engine(settings: Settings, sdk: &SimulatedSdk) -> Engine {
    let (platform, _responses) =
        SimulatedPermissions::new(Vec::<String>::new(), Vec::<String>::new(), true);
    Engine::new(settings, Arc::new(sdk.clone()), Arc::new(platform)).unwrap()
}

fn no_permissions() -> Settings {
    let mut settings = Settings::default();
    settings.permissions.required.clear();
    settings
}

/// Pump the main context for `window`, recording every broadcast event
async fn record_for(
    engine: &mut Engine,
    events: &mut broadcast::Receiver<EngineEvent>,
    started: Instant,
    window: Duration,
) -> Vec<Recorded> {
    let deadline = started + window;
    let mut recorded = Vec::new();
    loop {
        while let Ok(event) = events.try_recv() {
            recorded.push(Recorded {
                at: started.elapsed(),
                event,
            });
        }
        match tokio::time::timeout_at(deadline, engine.next_message()).await {
            Ok(Some(msg)) => engine.process_message(msg),
            Ok(None) | Err(_) => break,
        }
    }
    recorded
}

fn connection_changes(recorded: &[Recorded]) -> Vec<&Recorded> {
    recorded
        .iter()
        .filter(|r| matches!(r.event, EngineEvent::ConnectionChanged { .. }))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_and_flips_produce_one_debounced_notification() {
    let sdk = SimulatedSdk::new(
        Scenario::manual()
            .with_registration(instant_outcome(RegistrationCode::Success))
            .with_steps(vec![
                ScenarioStep::new(0, ScenarioEvent::product_connect("Mavic 3")),
                ScenarioStep::new(
                    0,
                    ScenarioEvent::ComponentAttached {
                        key: ComponentKey::FlightController,
                        connected: false,
                    },
                ),
                ScenarioStep::new(
                    0,
                    ScenarioEvent::ComponentAttached {
                        key: ComponentKey::Camera,
                        connected: false,
                    },
                ),
                ScenarioStep::new(
                    0,
                    ScenarioEvent::ComponentAttached {
                        key: ComponentKey::Gimbal,
                        connected: false,
                    },
                ),
                flip(50, ComponentKey::FlightController, true),
                flip(50, ComponentKey::Camera, true),
                flip(50, ComponentKey::Gimbal, true),
            ]),
    );
    let mut engine = engine(no_permissions(), &sdk);
    let mut events = engine.subscribe();

    let started = Instant::now();
    engine.start();
    let recorded = record_for(&mut engine, &mut events, started, Duration::from_millis(2000)).await;

    let changes = connection_changes(&recorded);
    assert_eq!(changes.len(), 1, "expected one coalesced notification");
    // Last flip lands no earlier than 150ms in; the window is 500ms.
    assert!(changes[0].at >= Duration::from_millis(650), "fired at {:?}", changes[0].at);
    assert_eq!(
        changes[0].event,
        EngineEvent::ConnectionChanged {
            tag: "dji_sdk_connection_change"
        }
    );

    let snapshot = engine.snapshot();
    assert!(snapshot.product_present);
    assert_eq!(snapshot.connected_component_count(), 3);
    assert_eq!(sdk.register_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_clears_snapshot() {
    let sdk = SimulatedSdk::new(
        Scenario::manual()
            .with_registration(instant_outcome(RegistrationCode::Success))
            .with_steps(vec![
                ScenarioStep::new(0, ScenarioEvent::product_connect("Mini 4")),
                ScenarioStep::new(
                    0,
                    ScenarioEvent::ComponentAttached {
                        key: ComponentKey::Battery,
                        connected: true,
                    },
                ),
                ScenarioStep::new(20, ScenarioEvent::ProductDisconnect),
            ]),
    );
    let mut settings = no_permissions();
    settings.notifications.debounce_ms = 100;
    let mut engine = engine(settings, &sdk);
    let mut events = engine.subscribe();

    let started = Instant::now();
    engine.start();
    let recorded = record_for(&mut engine, &mut events, started, Duration::from_millis(800)).await;

    let advisories: Vec<&Advisory> = recorded
        .iter()
        .filter_map(|r| match &r.event {
            EngineEvent::Advisory(advisory) => Some(advisory),
            _ => None,
        })
        .collect();
    assert!(advisories.contains(&&Advisory::ProductConnected));
    assert!(advisories.contains(&&Advisory::ProductDisconnected));
    assert_eq!(connection_changes(&recorded).len(), 1);

    let snapshot = engine.snapshot();
    assert!(!snapshot.product_present);
    assert!(snapshot.product.is_none());
    assert!(snapshot.component_connectivity.is_empty());
    assert_eq!(snapshot.generation, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_registration_from_scenario_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("offline.toml");
    std::fs::write(
        &path,
        r#"
[registration]
code = "network_unreachable"
description = "No network"
delay_ms = 0

[[steps]]
event = { kind = "product_connect", model = "Mavic 3" }
"#,
    )
    .unwrap();
    let sdk = SimulatedSdk::new(Scenario::load(&path).unwrap());
    let mut engine = engine(no_permissions(), &sdk);
    let mut events = engine.subscribe();

    let started = Instant::now();
    engine.start();
    let recorded = record_for(&mut engine, &mut events, started, Duration::from_millis(300)).await;

    assert!(recorded
        .iter()
        .any(|r| r.event == EngineEvent::RegistrationStateChanged(RegistrationState::Failed)));
    assert!(recorded.iter().any(|r| r.event
        == EngineEvent::Advisory(Advisory::RegisterFailed {
            description: "No network".to_string()
        })));
    assert!(connection_changes(&recorded).is_empty());
    assert!(!sdk.connection_started());

    // Not retried
    engine.start();
    record_for(&mut engine, &mut events, Instant::now(), Duration::from_millis(100)).await;
    assert_eq!(sdk.register_calls(), 1);
    assert_eq!(engine.registration_state(), RegistrationState::Failed);
}
