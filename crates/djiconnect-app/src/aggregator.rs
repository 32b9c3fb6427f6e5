//! Aggregates raw SDK connectivity events into one [`DeviceSnapshot`]
//!
//! Events arrive on SDK-owned threads, possibly concurrently. Every write to
//! the snapshot happens under one lock and readers only ever receive clones,
//! so nobody observes a half-applied event.
//!
//! The snapshot generation counts product disconnects. Component listeners
//! are stamped with the generation current when they were attached, so a
//! flip from an older generation comes from a component of a product that
//! has since disconnected. Such a flip is applied anyway under the default
//! last-write-wins policy, or dropped when `discard_stale` is set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use djiconnect_core::prelude::*;
use djiconnect_core::{Advisory, ComponentKey, DeviceSnapshot, ProductInfo};
use djiconnect_sdk::{Component, ComponentListener, ConnectionListener};

use crate::context::MainContext;
use crate::debouncer::NotificationDebouncer;

#[derive(Default)]
struct AggregatorState {
    snapshot: DeviceSnapshot,
    /// Components we have attached a listener to, by slot
    attached: HashMap<ComponentKey, Arc<dyn Component>>,
}

/// Single logical writer of the [`DeviceSnapshot`]
pub struct ConnectionStateAggregator {
    state: Mutex<AggregatorState>,
    debouncer: NotificationDebouncer,
    main: MainContext,
    discard_stale: bool,
    detached: AtomicBool,
    weak_self: Weak<ConnectionStateAggregator>,
}

impl std::fmt::Debug for ConnectionStateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStateAggregator")
            .field("snapshot", &self.snapshot())
            .field("discard_stale", &self.discard_stale)
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl ConnectionStateAggregator {
    pub fn new(
        debouncer: NotificationDebouncer,
        main: MainContext,
        discard_stale: bool,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            state: Mutex::new(AggregatorState::default()),
            debouncer,
            main,
            discard_stale,
            detached: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent copy of the current view
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn debouncer(&self) -> &NotificationDebouncer {
        &self.debouncer
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Stop reacting to SDK events
    ///
    /// Removes every component listener this aggregator attached and cancels
    /// any pending notification. Events delivered afterwards are ignored.
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        let attached: Vec<_> = self.lock().attached.drain().collect();
        for (key, component) in attached {
            trace!("Detaching listener from {} ({})", key, component.id());
            component.set_component_listener(None);
        }
        self.debouncer.shutdown();
        info!("Connection state aggregator detached");
    }

    /// A component reported a connectivity flip
    ///
    /// Entry point for flips that do not come through a listener this
    /// aggregator attached; such flips carry no generation.
    pub fn on_component_connectivity_change(&self, key: ComponentKey, is_connected: bool) {
        self.apply_connectivity(key, is_connected, None);
    }

    fn apply_connectivity(&self, key: ComponentKey, is_connected: bool, generation: Option<u64>) {
        if self.is_detached() {
            return;
        }

        {
            let mut state = self.lock();
            if let Some(generation) = generation {
                let current = state.snapshot.generation;
                if generation != current {
                    if self.discard_stale {
                        warn!(
                            "Discarding stale {} connectivity={} (generation {} != {})",
                            key, is_connected, generation, current
                        );
                        return;
                    }
                    warn!(
                        "Applying stale {} connectivity={} (generation {} != {})",
                        key, is_connected, generation, current
                    );
                }
            }
            state
                .snapshot
                .component_connectivity
                .insert(key, is_connected);
        }

        debug!("onComponentConnectivityChanged: {} -> {}", key, is_connected);
        self.debouncer.request_notify();
    }

    fn component_listener(
        &self,
        key: ComponentKey,
        generation: u64,
    ) -> Arc<dyn ComponentListener> {
        Arc::new(ComponentConnectivityListener {
            key,
            generation,
            aggregator: self.weak_self.clone(),
        })
    }
}

impl ConnectionListener for ConnectionStateAggregator {
    fn on_product_connect(&self, product: ProductInfo) {
        if self.is_detached() {
            return;
        }
        debug!("onProductConnect newProduct: {}", product);
        {
            let mut state = self.lock();
            state.snapshot.product_present = true;
            state.snapshot.product = Some(product);
        }
        self.main.present(Advisory::ProductConnected);
        self.debouncer.request_notify();
    }

    fn on_product_disconnect(&self) {
        if self.is_detached() {
            return;
        }
        debug!("onProductDisconnect");
        {
            let mut state = self.lock();
            state.snapshot.product_present = false;
            state.snapshot.product = None;
            state.snapshot.component_connectivity.clear();
            state.snapshot.generation += 1;
        }
        self.main.present(Advisory::ProductDisconnected);
        self.debouncer.request_notify();
    }

    fn on_component_change(
        &self,
        key: ComponentKey,
        old: Option<Arc<dyn Component>>,
        new: Option<Arc<dyn Component>>,
    ) {
        if self.is_detached() {
            return;
        }
        debug!(
            "onComponentChange key: {}, old: {:?}, new: {:?}",
            key,
            old.as_ref().map(|c| c.id()),
            new.as_ref().map(|c| c.id())
        );

        if let Some(old) = &old {
            old.set_component_listener(None);
        }

        let Some(new) = new else {
            self.lock().attached.remove(&key);
            return;
        };

        let generation = self.lock().snapshot.generation;
        new.set_component_listener(Some(self.component_listener(key, generation)));

        let mut state = self.lock();
        // detach() flips the flag before draining under this lock
        if self.is_detached() {
            drop(state);
            trace!("Detached while attaching {}, clearing listener", key);
            new.set_component_listener(None);
            return;
        }
        state.attached.insert(key, new);
    }
}

/// Listener attached to one component object
struct ComponentConnectivityListener {
    key: ComponentKey,
    generation: u64,
    aggregator: Weak<ConnectionStateAggregator>,
}

impl ComponentListener for ComponentConnectivityListener {
    fn on_connectivity_change(&self, is_connected: bool) {
        match self.aggregator.upgrade() {
            Some(aggregator) => {
                aggregator.apply_connectivity(self.key, is_connected, Some(self.generation))
            }
            None => trace!("Aggregator dropped, ignoring {} flip", self.key),
        }
    }
}
