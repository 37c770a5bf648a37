use crate::error::correlation::CorrelationError;
use crate::hub::{BridgeMessage, Subscription};

use models::{CorrelationId, InboundMessage, ResponseMessage};

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use log::debug;
use tokio::time::timeout;

/// Consume `subscription` until the response to `id` arrives.
///
/// Everything else received in the meantime is skipped, so use a subscription
/// dedicated to this wait. Subscribe before issuing the request or a fast
/// response can be missed.
pub async fn await_response(
    subscription: &mut Subscription,
    id: &CorrelationId,
    window: Duration,
) -> Result<ResponseMessage, CorrelationError> {
    let wait = async {
        while let Some(message) = subscription.recv().await {
            if let BridgeMessage::Inbound(InboundMessage::Response(response)) = message
                && response.answers(id)
            {
                return Some(response);
            }
        }
        None
    };

    match timeout(window, wait).await {
        Ok(Some(response)) => Ok(response),
        Ok(None) => Err(CorrelationError::Closed {
            message: format!("Hub closed while waiting for request {id}"),
            location: ErrorLocation::from(Location::caller()),
        }),
        Err(_) => {
            debug!("Request {id} timed out after {window:?}");
            Err(CorrelationError::Timeout {
                id: id.to_string(),
                window_ms: window.as_millis(),
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }
}
