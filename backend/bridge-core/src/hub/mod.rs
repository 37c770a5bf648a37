//! Event fan-out hub.
//!
//! Every inbound frame (event or response) and every bridge diagnostic is
//! re-broadcast to all listeners attached at publish time:
//!
//! - Listeners attach with [`EventHub::subscribe`] and detach by dropping
//!   their [`Subscription`]
//! - A message published with no listener attached is dropped, never buffered
//! - Each listener has its own unbounded queue, so per-listener order matches
//!   publish order and a slow or vanished listener never blocks the others

mod subscription;

pub use subscription::Subscription;

use models::InboundMessage;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

/// What listeners receive.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeMessage {
    /// A frame from the companion, untouched.
    Inbound(InboundMessage),
    /// Something the bridge itself noticed.
    Diagnostic(Diagnostic),
}

impl BridgeMessage {
    pub fn as_inbound(&self) -> Option<&InboundMessage> {
        match self {
            BridgeMessage::Inbound(message) => Some(message),
            BridgeMessage::Diagnostic(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A complete frame that did not decode as an inbound message.
    MalformedMessage,
    /// The byte stream can no longer be split into frames; the connection was dropped.
    FramingLost,
    /// A start was refused because a job is already active.
    ConflictingJobStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl Display for ListenerId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "listener-{}", self.0)
    }
}

type ListenerTable = Vec<(ListenerId, UnboundedSender<BridgeMessage>)>;

#[derive(Default)]
pub(crate) struct HubInner {
    listeners: Mutex<ListenerTable>,
    next_listener: AtomicU64,
}

impl HubInner {
    fn listeners(&self) -> MutexGuard<'_, ListenerTable> {
        // A panicking listener cannot corrupt a Vec of senders; keep serving.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn remove(&self, id: ListenerId) {
        let mut listeners = self.listeners();
        listeners.retain(|(listener, _)| *listener != id);
        debug!("Detached {id} ({} remaining)", listeners.len());
    }
}

/// Live broadcast of bridge messages. Cloning shares the same listener set.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener. It receives every message published from now on.
    pub fn subscribe(&self) -> Subscription {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = unbounded_channel();

        let mut listeners = self.inner.listeners();
        listeners.push((id, tx));
        debug!("Attached {id} ({} listening)", listeners.len());

        Subscription::new(id, rx, Arc::downgrade(&self.inner))
    }

    /// Deliver `message` to every attached listener.
    ///
    /// Returns how many listeners received it. Listeners whose receiving side
    /// is gone are pruned without affecting the rest.
    pub fn publish(&self, message: BridgeMessage) -> usize {
        let mut listeners = self.inner.listeners();
        let mut delivered = 0;

        listeners.retain(|(id, tx)| match tx.send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                debug!("{id} went away, pruning it");
                false
            }
        });

        trace!("Published to {delivered} listener(s)");
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }
}
