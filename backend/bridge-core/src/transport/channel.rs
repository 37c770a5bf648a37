use crate::error::transport::TransportError;
use crate::hub::{BridgeMessage, Diagnostic, DiagnosticKind, EventHub};
use crate::transport::connector::{BoxedReader, BoxedWriter, Connector};
use crate::transport::framing::{decode_message, encode_request, read_frame, write_frame};

use models::OutboundRequest;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{debug, error, info, trace, warn};
use tokio::process::Child as TokioChild;
use tokio::spawn as TokioSpawn;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Identity of a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub identity: String,
    /// Starts at 1 and grows by one for every connection the channel opens.
    pub generation: u64,
}

struct Connection {
    info: ConnectionInfo,
    alive: Arc<AtomicBool>,
    writer: BoxedWriter,
    reader_task: JoinHandle<()>,
    _child: Option<TokioChild>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

type Slot = Mutex<Option<Connection>>;

/// Owner of the single connection to the companion.
///
/// All writes go through one lock so frames never interleave, and so only one
/// reconnect can be in flight at a time. When the companion closes its end the
/// reader task empties the slot, which also releases the child process.
pub struct TransportChannel {
    connector: Arc<dyn Connector>,
    hub: EventHub,
    slot: Arc<Slot>,
    generation: AtomicU64,
}

impl TransportChannel {
    pub fn new(connector: Arc<dyn Connector>, hub: EventHub) -> Self {
        Self {
            connector,
            hub,
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the live connection, opening a new one if there is none.
    ///
    /// Concurrent callers queue on the slot lock, so at most one connect runs.
    pub async fn ensure_connection(&self) -> Result<ConnectionInfo, TransportError> {
        let mut slot = self.slot.lock().await;
        self.ensure_in(&mut slot).await
    }

    /// Write `request` on the current connection without reconnecting.
    pub async fn send(&self, request: &OutboundRequest) -> Result<(), TransportError> {
        let frame = encode_request(request)?;
        let mut slot = self.slot.lock().await;
        Self::write_in(&mut slot, &frame).await?;
        trace!("Sent {} ({})", request.id, request.command);
        Ok(())
    }

    /// Ensure a connection, then write `request` on it.
    pub async fn deliver(&self, request: &OutboundRequest) -> Result<ConnectionInfo, TransportError> {
        let frame = encode_request(request)?;
        let mut slot = self.slot.lock().await;
        let info = self.ensure_in(&mut slot).await?;
        Self::write_in(&mut slot, &frame).await?;
        trace!(
            "Delivered {} ({}) to {}",
            request.id, request.command, info.identity
        );
        Ok(info)
    }

    /// Generation of the live connection, if there is one.
    pub async fn live_generation(&self) -> Option<u64> {
        self.slot
            .lock()
            .await
            .as_ref()
            .filter(|connection| connection.is_alive())
            .map(|connection| connection.info.generation)
    }

    pub async fn is_connected(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(Connection::is_alive)
    }

    /// Drop the current connection, if any. The companion process is killed with it.
    pub async fn disconnect(&self) {
        if let Some(connection) = self.slot.lock().await.take() {
            info!("Disconnecting from {}", connection.info.identity);
        }
    }

    async fn ensure_in(
        &self,
        slot: &mut Option<Connection>,
    ) -> Result<ConnectionInfo, TransportError> {
        if let Some(connection) = slot.as_ref() {
            if connection.is_alive() {
                return Ok(connection.info.clone());
            }
            debug!(
                "Connection to {} (generation {}) is gone, reconnecting",
                connection.info.identity, connection.info.generation
            );
        }
        *slot = None;

        let stream = self.connector.connect().await?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let info = ConnectionInfo {
            identity: stream.identity,
            generation,
        };

        let alive = Arc::new(AtomicBool::new(true));
        let reader_task = TokioSpawn(read_loop(
            stream.reader,
            self.hub.clone(),
            Arc::clone(&alive),
            info.clone(),
            Arc::downgrade(&self.slot),
        ));

        info!(
            "Connected to {} (generation {})",
            info.identity, info.generation
        );

        *slot = Some(Connection {
            info: info.clone(),
            alive,
            writer: stream.writer,
            reader_task,
            _child: stream.child,
        });

        Ok(info)
    }

    async fn write_in(slot: &mut Option<Connection>, frame: &[u8]) -> Result<(), TransportError> {
        let Some(connection) = slot.as_mut().filter(|c| c.is_alive()) else {
            return Err(TransportError::SendFailed {
                message: String::from("No live connection to the companion"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        if let Err(e) = write_frame(&mut connection.writer, frame).await {
            warn!("Write failed, dropping connection: {e}");
            *slot = None;
            return Err(e);
        }

        Ok(())
    }
}

async fn read_loop(
    mut reader: BoxedReader,
    hub: EventHub,
    alive: Arc<AtomicBool>,
    info: ConnectionInfo,
    slot: Weak<Slot>,
) {
    let identity = &info.identity;
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(body)) => match decode_message(&body) {
                Ok(message) => {
                    trace!("Received {} byte frame from {identity}", body.len());
                    hub.publish(BridgeMessage::Inbound(message));
                }
                Err(e) => {
                    warn!("Malformed message from {identity}: {e}");
                    hub.publish(BridgeMessage::Diagnostic(Diagnostic::new(
                        DiagnosticKind::MalformedMessage,
                        format!("Malformed message from {identity}: {e}"),
                    )));
                }
            },
            Ok(None) => {
                info!("{identity} closed the connection");
                break;
            }
            Err(e) => {
                error!("Lost framing with {identity}: {e}");
                alive.store(false, Ordering::SeqCst);
                hub.publish(BridgeMessage::Diagnostic(Diagnostic::new(
                    DiagnosticKind::FramingLost,
                    e.to_string(),
                )));
                break;
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    release(&slot, &info).await;
}

/// Empty the slot if it still holds the connection described by `info`.
///
/// Dropping the connection aborts the calling reader task, so nothing may
/// be awaited after the drop.
async fn release(slot: &Weak<Slot>, info: &ConnectionInfo) {
    let Some(slot) = slot.upgrade() else {
        return;
    };

    let mut guard = slot.lock().await;
    if guard
        .as_ref()
        .is_some_and(|connection| connection.info.generation == info.generation)
    {
        let connection = guard.take();
        drop(guard);
        debug!(
            "Released connection to {} (generation {})",
            info.identity, info.generation
        );
        drop(connection);
    }
}
