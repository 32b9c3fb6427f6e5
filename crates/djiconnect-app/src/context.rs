//! Named execution contexts
//!
//! Two contexts exist: the **main** context, a single consumer draining
//! [`Message`]s (it owns advisory presentation and the connection-change
//! broadcast), and the **background** context, the runtime's blocking pool
//! used for registration work. SDK callbacks arrive on neither; they hop onto
//! the main context by posting messages.

use djiconnect_core::prelude::*;
use djiconnect_core::Advisory;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::message::Message;

/// Sending half of the main context
///
/// Cheap to clone and safe to use from any thread, including threads the
/// Tokio runtime does not own.
#[derive(Debug, Clone)]
pub struct MainContext {
    tx: mpsc::UnboundedSender<Message>,
}

impl MainContext {
    /// Create the context and the receiver its owner drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post a message. Returns `false` once the main loop has gone away.
    pub fn post(&self, msg: Message) -> bool {
        match self.tx.send(msg) {
            Ok(()) => true,
            Err(e) => {
                debug!("Main context closed, dropping {:?}", e.0);
                false
            }
        }
    }

    /// Marshal an advisory onto the main context for presentation
    pub fn present(&self, advisory: Advisory) {
        trace!("Queueing advisory: {}", advisory);
        self.post(Message::Advisory(advisory));
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.tx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Both contexts, handed to components at construction
#[derive(Debug, Clone)]
pub struct ExecutionContexts {
    pub main: MainContext,
    pub background: Handle,
}

impl ExecutionContexts {
    /// Build contexts on the current Tokio runtime
    pub fn current() -> Result<(Self, mpsc::UnboundedReceiver<Message>)> {
        let background = Handle::try_current()
            .map_err(|e| Error::config(format!("No Tokio runtime available: {}", e)))?;
        let (main, rx) = MainContext::new();
        Ok((Self { main, background }, rx))
    }
}
