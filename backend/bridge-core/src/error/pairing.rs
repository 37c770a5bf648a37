use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

/// Caller mistakes only. An unreachable or silent candidate is never an error.
#[derive(Debug, ThisError)]
pub enum PairingError {
    #[error("HTTP Client Error: {message} {location}")]
    Client {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },
}
