//! One-shot, concurrency-safe SDK registration
//!
//! Any number of callers on any threads may call
//! [`RegistrationController::start_registration`]; exactly one of them wins
//! the [`RegistrationGuard`] and talks to the SDK. The guard is never reset,
//! so a failed registration stays failed until the process restarts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use djiconnect_core::prelude::*;
use djiconnect_core::{
    Advisory, ComponentKey, InitEvent, ProductInfo, RegistrationResult, RegistrationState,
};
use djiconnect_sdk::{Component, ConnectionListener, DeviceSdk, SdkManagerCallback};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::context::MainContext;
use crate::message::Message;

/// Process-scoped "registration has been started" flag
#[derive(Debug, Default)]
pub struct RegistrationGuard {
    started: AtomicBool,
}

impl RegistrationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag from unset to set. Only one caller ever gets `true`.
    pub fn try_begin(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// State shared between the controller and the SDK callback
struct RegistrationShared {
    state_tx: watch::Sender<RegistrationState>,
    sdk: Arc<dyn DeviceSdk>,
    main: MainContext,
}

impl RegistrationShared {
    fn transition(&self, next: RegistrationState) -> bool {
        let changed = self.state_tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                debug!("Registration state {} -> {}", state, next);
                *state = next;
                true
            } else {
                warn!(
                    "{}",
                    Error::RegistrationTransition {
                        from: state.to_string(),
                        to: next.to_string(),
                    }
                );
                false
            }
        });
        if changed {
            self.main.post(Message::RegistrationStateChanged(next));
        }
        changed
    }
}

/// Performs the at-most-once registration handshake
pub struct RegistrationController {
    guard: Arc<RegistrationGuard>,
    shared: Arc<RegistrationShared>,
    listener: Arc<dyn ConnectionListener>,
    background: Handle,
}

impl RegistrationController {
    /// `listener` receives every product and component event the SDK
    /// reports after registration.
    pub fn new(
        guard: Arc<RegistrationGuard>,
        sdk: Arc<dyn DeviceSdk>,
        listener: Arc<dyn ConnectionListener>,
        main: MainContext,
        background: Handle,
    ) -> Self {
        let (state_tx, _) = watch::channel(RegistrationState::NotStarted);
        Self {
            guard,
            shared: Arc::new(RegistrationShared {
                state_tx,
                sdk,
                main,
            }),
            listener,
            background,
        }
    }

    /// Start registration unless someone already has
    ///
    /// Returns immediately; the outcome is reported through advisories, the
    /// state channel and, on success, the connectivity events that follow.
    pub fn start_registration(&self) {
        if !self.guard.try_begin() {
            debug!("Registration already started, ignoring request");
            return;
        }

        self.shared.transition(RegistrationState::InProgress);

        let shared = self.shared.clone();
        let callback: Arc<dyn SdkManagerCallback> = Arc::new(RegistrationCallback {
            shared: shared.clone(),
            listener: self.listener.clone(),
            delivered: AtomicBool::new(false),
        });

        self.background.spawn_blocking(move || {
            shared.main.present(Advisory::Registering);
            info!("Registering with device SDK");
            shared.sdk.register_app(callback);
        });
    }

    pub fn state(&self) -> RegistrationState {
        *self.shared.state_tx.borrow()
    }

    /// Watch the registration state
    pub fn subscribe_state(&self) -> watch::Receiver<RegistrationState> {
        self.shared.state_tx.subscribe()
    }

    pub fn guard(&self) -> &Arc<RegistrationGuard> {
        &self.guard
    }
}

/// Callback object handed to the SDK
///
/// Handles the registration result itself and forwards product and component
/// events to the controller's listener.
struct RegistrationCallback {
    shared: Arc<RegistrationShared>,
    listener: Arc<dyn ConnectionListener>,
    delivered: AtomicBool,
}

impl ConnectionListener for RegistrationCallback {
    fn on_product_connect(&self, product: ProductInfo) {
        self.listener.on_product_connect(product);
    }

    fn on_product_disconnect(&self) {
        self.listener.on_product_disconnect();
    }

    fn on_component_change(
        &self,
        key: ComponentKey,
        old: Option<Arc<dyn Component>>,
        new: Option<Arc<dyn Component>>,
    ) {
        self.listener.on_component_change(key, old, new);
    }
}

impl SdkManagerCallback for RegistrationCallback {
    fn on_register(&self, result: RegistrationResult) {
        trace!("onRegister: {}", result.description);
        if self.delivered.swap(true, Ordering::SeqCst) {
            warn!("Ignoring repeated registration result: {}", result.description);
            return;
        }

        // Side effects go first so that observing a terminal state implies
        // they have happened.
        if result.is_success() {
            self.shared.main.present(Advisory::RegisterSuccess);
            info!("Registration succeeded, connecting to product");
            if !self.shared.sdk.start_connection_to_product() {
                warn!("SDK refused to start product connection");
            }
            self.shared.transition(RegistrationState::Succeeded);
        } else {
            warn!(
                "{} ({:?})",
                Error::registration_failed(result.description.clone()),
                result.code
            );
            self.shared.main.present(Advisory::RegisterFailed {
                description: result.description,
            });
            self.shared.transition(RegistrationState::Failed);
        }
    }

    fn on_init_process(&self, event: InitEvent, total_process: u32) {
        debug!("SDK init process: {:?} ({})", event, total_process);
    }

    fn on_database_download_progress(&self, current: u64, total: u64) {
        trace!("SDK database download: {}/{}", current, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ConnectionStateAggregator;
    use crate::debouncer::NotificationDebouncer;
    use djiconnect_core::RegistrationCode;
    use djiconnect_sdk::test_utils::{failing_sdk, instant_sdk};
    use djiconnect_sdk::{ScenarioEvent, ScenarioStep, SimulatedSdk};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Listener that only remembers what it was told
    #[derive(Default)]
    struct RecordingListener {
        seen: Mutex<Vec<String>>,
    }

    impl RecordingListener {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl ConnectionListener for RecordingListener {
        fn on_product_connect(&self, product: ProductInfo) {
            self.seen.lock().unwrap().push(format!("connect {}", product));
        }

        fn on_product_disconnect(&self) {
            self.seen.lock().unwrap().push("disconnect".to_string());
        }

        fn on_component_change(
            &self,
            key: ComponentKey,
            _old: Option<Arc<dyn Component>>,
            new: Option<Arc<dyn Component>>,
        ) {
            let state = if new.is_some() { "attached" } else { "removed" };
            self.seen.lock().unwrap().push(format!("{} {}", key, state));
        }
    }

    struct Fixture {
        controller: Arc<RegistrationController>,
        rx: mpsc::UnboundedReceiver<Message>,
    }

    fn fixture(sdk: SimulatedSdk) -> Fixture {
        let (main, rx) = MainContext::new();
        let debouncer =
            NotificationDebouncer::new(Duration::from_millis(500), Handle::current(), main.clone());
        let aggregator = ConnectionStateAggregator::new(debouncer, main.clone(), false);
        let controller = RegistrationController::new(
            Arc::new(RegistrationGuard::new()),
            Arc::new(sdk),
            aggregator,
            main,
            Handle::current(),
        );
        Fixture {
            controller: Arc::new(controller),
            rx,
        }
    }

    async fn wait_for_terminal(controller: &RegistrationController) -> RegistrationState {
        let mut state_rx = controller.subscribe_state();
        let state = tokio::time::timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| s.is_terminal()),
        )
        .await
        .expect("registration did not finish")
        .expect("state channel closed");
        *state
    }

    fn advisories(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Advisory> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Advisory(advisory) = msg {
                out.push(advisory);
            }
        }
        out
    }

    #[test]
    fn test_guard_only_one_winner() {
        let guard = RegistrationGuard::new();
        assert!(!guard.is_started());
        assert!(guard.try_begin());
        assert!(!guard.try_begin());
        assert!(guard.is_started());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_register_once() {
        let sdk = instant_sdk(Vec::new());
        let Fixture { controller, .. } = fixture(sdk.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let controller = controller.clone();
                std::thread::spawn(move || controller.start_registration())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(wait_for_terminal(&controller).await, RegistrationState::Succeeded);
        assert_eq!(sdk.register_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_success_starts_product_connection() {
        let sdk = instant_sdk(Vec::new());
        let Fixture { controller, mut rx } = fixture(sdk.clone());

        controller.start_registration();
        assert_eq!(wait_for_terminal(&controller).await, RegistrationState::Succeeded);
        assert!(sdk.connection_started());

        let advisories = advisories(&mut rx);
        assert_eq!(
            advisories,
            vec![Advisory::Registering, Advisory::RegisterSuccess]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_is_terminal_and_second_start_is_noop() {
        let sdk = failing_sdk(RegistrationCode::BundleIdMismatch, "bundle id mismatch");
        let Fixture { controller, mut rx } = fixture(sdk.clone());

        controller.start_registration();
        assert_eq!(wait_for_terminal(&controller).await, RegistrationState::Failed);
        assert!(!sdk.connection_started());

        controller.start_registration();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sdk.register_calls(), 1);
        assert_eq!(controller.state(), RegistrationState::Failed);

        let advisories = advisories(&mut rx);
        assert_eq!(
            advisories.last(),
            Some(&Advisory::RegisterFailed {
                description: "bundle id mismatch".to_string()
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_changes_are_posted_to_main_context() {
        let sdk = instant_sdk(Vec::new());
        let Fixture { controller, mut rx } = fixture(sdk);

        controller.start_registration();
        wait_for_terminal(&controller).await;

        let mut states = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::RegistrationStateChanged(state) = msg {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![RegistrationState::InProgress, RegistrationState::Succeeded]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manual_sdk_stays_in_progress_without_callback() {
        let sdk = SimulatedSdk::manual();
        let Fixture { controller, .. } = fixture(sdk.clone());

        controller.start_registration();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.state(), RegistrationState::InProgress);
        assert_eq!(sdk.register_calls(), 1);

        sdk.deliver_registration(RegistrationResult::success())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(wait_for_terminal(&controller).await, RegistrationState::Succeeded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sdk_events_reach_injected_listener() {
        let sdk = instant_sdk(vec![
            ScenarioStep::new(0, ScenarioEvent::product_connect("Mavic 3")),
            ScenarioStep::new(
                0,
                ScenarioEvent::ComponentAttached {
                    key: ComponentKey::Camera,
                    connected: false,
                },
            ),
            ScenarioStep::new(0, ScenarioEvent::ProductDisconnect),
        ]);
        let (main, _rx) = MainContext::new();
        let listener = Arc::new(RecordingListener::default());
        let controller = RegistrationController::new(
            Arc::new(RegistrationGuard::new()),
            Arc::new(sdk),
            listener.clone(),
            main,
            Handle::current(),
        );

        controller.start_registration();
        assert_eq!(wait_for_terminal(&controller).await, RegistrationState::Succeeded);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while listener.seen().len() < 3 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let seen = listener.seen();
        assert_eq!(seen.len(), 3, "seen: {:?}", seen);
        assert!(seen[0].starts_with("connect "));
        assert_eq!(seen[2], "disconnect");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_duplicate_result_is_ignored() {
        let sdk = SimulatedSdk::manual();
        let Fixture { controller, mut rx } = fixture(sdk.clone());

        controller.start_registration();
        tokio::time::sleep(Duration::from_millis(50)).await;

        sdk.deliver_registration(RegistrationResult::success())
            .unwrap()
            .join()
            .unwrap();
        sdk.deliver_registration(RegistrationResult::failure(
            RegistrationCode::ServerRejected,
            "late",
        ))
        .unwrap()
        .join()
        .unwrap();

        assert_eq!(controller.state(), RegistrationState::Succeeded);
        assert!(!advisories(&mut rx)
            .iter()
            .any(|a| matches!(a, Advisory::RegisterFailed { .. })));
    }
}
