use crate::error::transport::TransportError;
use crate::transport::{ConnectionInfo, TransportChannel};

use models::{CommandType, CorrelationId, OutboundRequest};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use serde_json::Value;

/// Process-wide id counter. Ids start at `"1"` and are never reused.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU64,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> CorrelationId {
        CorrelationId::new(self.next.fetch_add(1, Ordering::SeqCst).to_string())
    }
}

/// Stamps outbound commands with ids and hands them to the transport.
pub struct CorrelationRegistry {
    ids: IdSequence,
    transport: Arc<TransportChannel>,
}

impl CorrelationRegistry {
    pub fn new(transport: Arc<TransportChannel>) -> Self {
        Self {
            ids: IdSequence::new(),
            transport,
        }
    }

    pub fn next_id(&self) -> CorrelationId {
        self.ids.next_id()
    }

    /// Build a request with a fresh id without sending it.
    pub fn stamp(&self, command: CommandType, payload: Value) -> OutboundRequest {
        OutboundRequest {
            id: self.next_id(),
            command,
            payload,
        }
    }

    /// Stamp and deliver. Returns as soon as the frame is written.
    pub async fn issue(
        &self,
        command: CommandType,
        payload: Value,
    ) -> Result<CorrelationId, TransportError> {
        let request = self.stamp(command, payload);
        self.dispatch(&request).await?;
        Ok(request.id)
    }

    /// Deliver a request produced by [`CorrelationRegistry::stamp`].
    ///
    /// Returns the connection the frame was written on.
    pub async fn dispatch(&self, request: &OutboundRequest) -> Result<ConnectionInfo, TransportError> {
        let connection = self.transport.deliver(request).await?;
        debug!(
            "Issued {} as request {} (generation {})",
            request.command, request.id, connection.generation
        );
        Ok(connection)
    }
}
