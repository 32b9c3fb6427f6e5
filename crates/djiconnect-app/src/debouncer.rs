//! Trailing-edge debounce for connection-change notifications
//!
//! Raw connectivity events may arrive in bursts. Each request cancels the
//! pending emission and schedules a new one a full window later, so a stream
//! of requests spaced closer than the window emits nothing until it pauses,
//! then emits exactly once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use djiconnect_core::prelude::*;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::context::MainContext;
use crate::message::Message;

/// Default quiescence window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// The single pending-emission slot
///
/// `seq` identifies the live emission. A timer that wakes up and finds a
/// different `seq` has been superseded and must not emit.
#[derive(Debug, Default)]
struct PendingSlot {
    seq: u64,
    handle: Option<JoinHandle<()>>,
    closed: bool,
    emitted: u64,
}

fn lock(slot: &Mutex<PendingSlot>) -> MutexGuard<'_, PendingSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coalesces notification requests into one [`Message::ConnectionChanged`]
/// per quiescence window
#[derive(Debug)]
pub struct NotificationDebouncer {
    window: Duration,
    runtime: Handle,
    main: MainContext,
    slot: Arc<Mutex<PendingSlot>>,
}

impl NotificationDebouncer {
    /// Create a debouncer whose timers run on `runtime`
    ///
    /// Requests may come from any thread; the timer is always spawned on the
    /// given runtime.
    pub fn new(window: Duration, runtime: Handle, main: MainContext) -> Self {
        Self {
            window,
            runtime,
            main,
            slot: Arc::new(Mutex::new(PendingSlot::default())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Cancel any pending emission and schedule a fresh one
    pub fn request_notify(&self) {
        let mut slot = lock(&self.slot);
        if slot.closed {
            trace!("Debouncer closed, ignoring notify request");
            return;
        }

        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }
        slot.seq += 1;

        let seq = slot.seq;
        let shared = self.slot.clone();
        let main = self.main.clone();
        let window = self.window;

        slot.handle = Some(self.runtime.spawn(async move {
            tokio::time::sleep(window).await;

            let mut slot = lock(&shared);
            if slot.closed || slot.seq != seq {
                return;
            }
            slot.handle = None;
            slot.emitted += 1;
            debug!("Emitting coalesced connection change #{}", slot.emitted);
            // Posted under the slot lock so a concurrent request cannot
            // interleave between the check and the emission.
            main.post(Message::ConnectionChanged);
        }));
    }

    /// Whether an emission is scheduled
    pub fn is_pending(&self) -> bool {
        lock(&self.slot).handle.is_some()
    }

    /// Total emissions so far
    pub fn emitted_count(&self) -> u64 {
        lock(&self.slot).emitted
    }

    /// Cancel the pending emission and refuse further requests
    pub fn shutdown(&self) {
        let mut slot = lock(&self.slot);
        if slot.closed {
            return;
        }
        slot.closed = true;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
            debug!("Cancelled pending connection-change emission");
        }
    }
}

impl Drop for NotificationDebouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
