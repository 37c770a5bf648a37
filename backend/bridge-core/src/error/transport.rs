use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    /// The companion could not be spawned or reached. Retry `ensure_connection` later.
    #[error("Transport Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// No live connection, or the write failed. Re-ensure the connection and resend.
    #[error("Send Failed Error: {message} {location}")]
    SendFailed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Framing Error: {message} {location}")]
    Framing {
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TransportError::Unavailable { .. })
    }

    pub fn is_send_failed(&self) -> bool {
        matches!(self, TransportError::SendFailed { .. })
    }
}
