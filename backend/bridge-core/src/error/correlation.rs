use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CorrelationError {
    #[error("Response Timeout Error: no response to request {id} within {window_ms}ms {location}")]
    Timeout {
        id: String,
        window_ms: u128,
        location: ErrorLocation,
    },

    #[error("Subscription Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },
}
