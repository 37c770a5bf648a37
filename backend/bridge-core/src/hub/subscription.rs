use crate::hub::{BridgeMessage, HubInner, ListenerId};

use std::sync::Weak;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

/// A listener's end of the hub. Dropping it detaches the listener.
pub struct Subscription {
    id: ListenerId,
    receiver: UnboundedReceiver<BridgeMessage>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub(crate) fn new(
        id: ListenerId,
        receiver: UnboundedReceiver<BridgeMessage>,
        hub: Weak<HubInner>,
    ) -> Self {
        Self { id, receiver, hub }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Next message in publish order, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<BridgeMessage> {
        self.receiver.recv().await
    }

    /// Next already-delivered message, without waiting.
    pub fn try_recv(&mut self) -> Option<BridgeMessage> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}
