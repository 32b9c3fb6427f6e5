//! In-process device SDK driven by a [`Scenario`]
//!
//! Stands in for the vendor SDK in headless mode and tests. Like the real
//! SDK, every callback is delivered from threads the simulator owns, never
//! from the caller's thread.

pub mod scenario;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use djiconnect_core::prelude::*;
use djiconnect_core::{ComponentKey, InitEvent, RegistrationResult};
use tokio::sync::mpsc;

use crate::component::Component;
use crate::listener::{ComponentListener, SdkManagerCallback};
use crate::manager::{DeviceSdk, PermissionPlatform};

pub use scenario::{RegistrationOutcome, Scenario, ScenarioEvent, ScenarioStep};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────

/// Component object created by the simulator
pub struct SimulatedComponent {
    key: ComponentKey,
    id: String,
    connected: AtomicBool,
    listener: Mutex<Option<Arc<dyn ComponentListener>>>,
}

impl std::fmt::Debug for SimulatedComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedComponent")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("has_listener", &self.has_listener())
            .finish()
    }
}

impl SimulatedComponent {
    pub fn new(key: ComponentKey, id: impl Into<String>, connected: bool) -> Self {
        Self {
            key,
            id: id.into(),
            connected: AtomicBool::new(connected),
            listener: Mutex::new(None),
        }
    }

    /// Flip connectivity and notify the attached listener, if any
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        let listener = lock(&self.listener).clone();
        match listener {
            Some(listener) => listener.on_connectivity_change(connected),
            None => trace!("{} connectivity -> {} (no listener)", self.id, connected),
        }
    }

    pub fn has_listener(&self) -> bool {
        lock(&self.listener).is_some()
    }
}

impl Component for SimulatedComponent {
    fn key(&self) -> ComponentKey {
        self.key
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_component_listener(&self, listener: Option<Arc<dyn ComponentListener>>) {
        *lock(&self.listener) = listener;
    }
}

// ─────────────────────────────────────────────────────────────────
// SDK
// ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SdkInner {
    callback: Mutex<Option<Arc<dyn SdkManagerCallback>>>,
    components: Mutex<HashMap<ComponentKey, Arc<SimulatedComponent>>>,
    register_calls: AtomicUsize,
    connection_started: AtomicBool,
    next_component_id: AtomicUsize,
}

impl SdkInner {
    fn callback(&self) -> Option<Arc<dyn SdkManagerCallback>> {
        lock(&self.callback).clone()
    }

    fn apply(&self, event: &ScenarioEvent) {
        let Some(callback) = self.callback() else {
            warn!("Simulated SDK has no callback, dropping {:?}", event);
            return;
        };

        match event {
            ScenarioEvent::ProductConnect { model, serial } => {
                callback.on_product_connect(ScenarioEvent::product_info(model, serial));
            }
            ScenarioEvent::ProductDisconnect => callback.on_product_disconnect(),
            ScenarioEvent::ComponentAttached { key, connected } => {
                let n = self.next_component_id.fetch_add(1, Ordering::SeqCst);
                let component = Arc::new(SimulatedComponent::new(
                    *key,
                    format!("{}-{}", key, n),
                    *connected,
                ));
                let old = lock(&self.components).insert(*key, component.clone());
                callback.on_component_change(
                    *key,
                    old.map(|c| c as Arc<dyn Component>),
                    Some(component.clone() as Arc<dyn Component>),
                );
                // The real SDK reports the initial link state once a
                // listener is in place.
                component.set_connected(*connected);
            }
            ScenarioEvent::ComponentDetached { key } => {
                let old = lock(&self.components).remove(key);
                callback.on_component_change(*key, old.map(|c| c as Arc<dyn Component>), None);
            }
            ScenarioEvent::ComponentConnectivity { key, connected } => {
                let component = lock(&self.components).get(key).cloned();
                match component {
                    Some(component) => component.set_connected(*connected),
                    None => warn!("No simulated {} component to flip", key),
                }
            }
        }
    }
}

/// Scenario-driven [`DeviceSdk`]
#[derive(Clone)]
pub struct SimulatedSdk {
    scenario: Arc<Scenario>,
    inner: Arc<SdkInner>,
}

impl SimulatedSdk {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario: Arc::new(scenario),
            inner: Arc::new(SdkInner::default()),
        }
    }

    /// Simulator that delivers nothing on its own
    pub fn manual() -> Self {
        Self::new(Scenario::manual())
    }

    /// Number of times `register_app` was invoked
    pub fn register_calls(&self) -> usize {
        self.inner.register_calls.load(Ordering::SeqCst)
    }

    pub fn connection_started(&self) -> bool {
        self.inner.connection_started.load(Ordering::SeqCst)
    }

    /// Component currently occupying `key`
    pub fn component(&self, key: ComponentKey) -> Option<Arc<SimulatedComponent>> {
        lock(&self.inner.components).get(&key).cloned()
    }

    /// Deliver a registration result on an SDK-owned thread
    pub fn deliver_registration(
        &self,
        result: RegistrationResult,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        let inner = self.inner.clone();
        thread::Builder::new()
            .name("sdk-register".to_string())
            .spawn(move || match inner.callback() {
                Some(callback) => callback.on_register(result),
                None => warn!("Registration result delivered before register_app"),
            })
    }

    /// Apply one raw event synchronously on the calling thread
    pub fn apply(&self, event: &ScenarioEvent) {
        self.inner.apply(event);
    }

    /// Apply one raw event on a fresh SDK-owned thread
    pub fn apply_on_sdk_thread(
        &self,
        event: ScenarioEvent,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        let inner = self.inner.clone();
        thread::Builder::new()
            .name("sdk-event".to_string())
            .spawn(move || inner.apply(&event))
    }
}

impl DeviceSdk for SimulatedSdk {
    fn register_app(&self, callback: Arc<dyn SdkManagerCallback>) {
        let call = self.inner.register_calls.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Simulated SDK: register_app (call #{})", call);
        *lock(&self.inner.callback) = Some(callback.clone());

        let Some(outcome) = self.scenario.registration.clone() else {
            debug!("Simulated SDK in manual mode, awaiting registration result");
            return;
        };

        let spawned = thread::Builder::new()
            .name("sdk-register".to_string())
            .spawn(move || {
                callback.on_init_process(InitEvent::StartToInitialize, 2);
                thread::sleep(outcome.delay());
                callback.on_init_process(InitEvent::InitializeComplete, 2);
                callback.on_register(outcome.result());
            });
        if let Err(e) = spawned {
            error!("Simulated SDK failed to spawn registration thread: {}", e);
        }
    }

    fn start_connection_to_product(&self) -> bool {
        if self.inner.callback().is_none() {
            warn!("start_connection_to_product called before register_app");
            return false;
        }
        if self.inner.connection_started.swap(true, Ordering::SeqCst) {
            debug!("Simulated SDK connection already started");
            return true;
        }

        let inner = self.inner.clone();
        let scenario = self.scenario.clone();
        let spawned = thread::Builder::new()
            .name("sdk-events".to_string())
            .spawn(move || {
                for step in &scenario.steps {
                    thread::sleep(step.delay());
                    inner.apply(&step.event);
                }
                debug!("Simulated SDK scenario finished");
            });
        match spawned {
            Ok(_) => true,
            Err(e) => {
                error!("Simulated SDK failed to spawn event thread: {}", e);
                false
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────

/// Grant outcome produced by the simulated permission dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionResponse {
    pub requested: Vec<String>,
    pub grants: Vec<bool>,
}

/// [`PermissionPlatform`] backed by in-memory grant sets
///
/// `request_permissions` answers immediately through the channel returned by
/// [`SimulatedPermissions::new`], granting whatever is in `grant_on_request`.
pub struct SimulatedPermissions {
    granted: Mutex<HashSet<String>>,
    grant_on_request: HashSet<String>,
    runtime_requests: bool,
    response_tx: mpsc::UnboundedSender<PermissionResponse>,
    request_count: AtomicUsize,
}

impl SimulatedPermissions {
    pub fn new(
        granted: impl IntoIterator<Item = impl Into<String>>,
        grant_on_request: impl IntoIterator<Item = impl Into<String>>,
        runtime_requests: bool,
    ) -> (Self, mpsc::UnboundedReceiver<PermissionResponse>) {
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let platform = Self {
            granted: Mutex::new(granted.into_iter().map(Into::into).collect()),
            grant_on_request: grant_on_request.into_iter().map(Into::into).collect(),
            runtime_requests,
            response_tx,
            request_count: AtomicUsize::new(0),
        };
        (platform, response_rx)
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

impl PermissionPlatform for SimulatedPermissions {
    fn is_granted(&self, permission: &str) -> bool {
        lock(&self.granted).contains(permission)
    }

    fn supports_runtime_requests(&self) -> bool {
        self.runtime_requests
    }

    fn request_permissions(&self, permissions: &[String]) {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let grants: Vec<bool> = permissions
            .iter()
            .map(|p| self.grant_on_request.contains(p))
            .collect();
        {
            let mut granted = lock(&self.granted);
            for (permission, ok) in permissions.iter().zip(&grants) {
                if *ok {
                    granted.insert(permission.clone());
                }
            }
        }

        let response = PermissionResponse {
            requested: permissions.to_vec(),
            grants,
        };
        if self.response_tx.send(response).is_err() {
            warn!("Permission response receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djiconnect_core::{ProductInfo, RegistrationCode};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Register(bool),
        Connect(String),
        Disconnect,
        Change(ComponentKey, Option<String>, Option<String>),
    }

    struct Recorder {
        tx: Mutex<std_mpsc::Sender<Seen>>,
    }

    impl crate::listener::ConnectionListener for Recorder {
        fn on_product_connect(&self, product: ProductInfo) {
            let _ = lock(&self.tx).send(Seen::Connect(product.model));
        }

        fn on_product_disconnect(&self) {
            let _ = lock(&self.tx).send(Seen::Disconnect);
        }

        fn on_component_change(
            &self,
            key: ComponentKey,
            old: Option<Arc<dyn Component>>,
            new: Option<Arc<dyn Component>>,
        ) {
            let _ = lock(&self.tx).send(Seen::Change(
                key,
                old.map(|c| c.id().to_string()),
                new.map(|c| c.id().to_string()),
            ));
        }
    }

    impl SdkManagerCallback for Recorder {
        fn on_register(&self, result: RegistrationResult) {
            let _ = lock(&self.tx).send(Seen::Register(result.is_success()));
        }
    }

    fn recorder() -> (Arc<Recorder>, std_mpsc::Receiver<Seen>) {
        let (tx, rx) = std_mpsc::channel();
        (Arc::new(Recorder { tx: Mutex::new(tx) }), rx)
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn test_register_app_counts_calls_and_delivers_result() {
        let sdk = SimulatedSdk::new(Scenario::manual().with_registration(RegistrationOutcome {
            code: RegistrationCode::BundleIdMismatch,
            description: Some("bad bundle".to_string()),
            delay_ms: 0,
        }));
        let (callback, rx) = recorder();

        sdk.register_app(callback);
        assert_eq!(sdk.register_calls(), 1);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Seen::Register(false));
    }

    #[test]
    fn test_manual_mode_waits_for_host() {
        let sdk = SimulatedSdk::manual();
        let (callback, rx) = recorder();

        sdk.register_app(callback);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        sdk.deliver_registration(RegistrationResult::success())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Seen::Register(true));
    }

    #[test]
    fn test_start_connection_requires_registration() {
        let sdk = SimulatedSdk::manual();
        assert!(!sdk.start_connection_to_product());
        assert!(!sdk.connection_started());
    }

    #[test]
    fn test_scenario_steps_replay_in_order() {
        let sdk = SimulatedSdk::new(Scenario::manual().with_steps(vec![
            ScenarioStep::new(0, ScenarioEvent::product_connect("Mini 4")),
            ScenarioStep::new(
                0,
                ScenarioEvent::ComponentAttached {
                    key: ComponentKey::Camera,
                    connected: false,
                },
            ),
            ScenarioStep::new(0, ScenarioEvent::ProductDisconnect),
        ]));
        let (callback, rx) = recorder();
        sdk.register_app(callback);

        assert!(sdk.start_connection_to_product());
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Seen::Connect("Mini 4".into()));
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            Seen::Change(ComponentKey::Camera, None, Some("Camera-0".into()))
        );
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Seen::Disconnect);
    }

    #[test]
    fn test_component_replacement_reports_old_and_new() {
        let sdk = SimulatedSdk::manual();
        let (callback, rx) = recorder();
        sdk.register_app(callback);

        let attach = ScenarioEvent::ComponentAttached {
            key: ComponentKey::Gimbal,
            connected: true,
        };
        sdk.apply(&attach);
        sdk.apply(&attach);
        sdk.apply(&ScenarioEvent::ComponentDetached {
            key: ComponentKey::Gimbal,
        });

        assert_eq!(
            rx.recv().unwrap(),
            Seen::Change(ComponentKey::Gimbal, None, Some("Gimbal-0".into()))
        );
        assert_eq!(
            rx.recv().unwrap(),
            Seen::Change(
                ComponentKey::Gimbal,
                Some("Gimbal-0".into()),
                Some("Gimbal-1".into())
            )
        );
        assert_eq!(
            rx.recv().unwrap(),
            Seen::Change(ComponentKey::Gimbal, Some("Gimbal-1".into()), None)
        );
        assert!(sdk.component(ComponentKey::Gimbal).is_none());
    }

    #[test]
    fn test_component_listener_receives_flips() {
        struct Flips(Mutex<Vec<bool>>);
        impl ComponentListener for Flips {
            fn on_connectivity_change(&self, is_connected: bool) {
                lock(&self.0).push(is_connected);
            }
        }

        let component = SimulatedComponent::new(ComponentKey::Battery, "Battery-0", false);
        let flips = Arc::new(Flips(Mutex::new(Vec::new())));
        component.set_component_listener(Some(flips.clone()));
        assert!(component.has_listener());

        component.set_connected(true);
        component.set_connected(false);
        component.set_component_listener(None);
        component.set_connected(true);

        assert_eq!(*lock(&flips.0), vec![true, false]);
        assert!(component.is_connected());
    }

    #[test]
    fn test_simulated_permissions_grant_on_request() {
        let (platform, mut rx) = SimulatedPermissions::new(["A"], ["B"], true);
        assert!(platform.is_granted("A"));
        assert!(!platform.is_granted("B"));

        platform.request_permissions(&["B".to_string(), "C".to_string()]);
        let response = rx.try_recv().unwrap();
        assert_eq!(response.requested, vec!["B", "C"]);
        assert_eq!(response.grants, vec![true, false]);
        assert!(platform.is_granted("B"));
        assert!(!platform.is_granted("C"));
        assert_eq!(platform.request_count(), 1);
    }
}
