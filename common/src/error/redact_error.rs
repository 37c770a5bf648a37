use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a credential is about to leave the process through a path
/// that did not ask for the raw value.
#[derive(Debug, ThisError)]
pub enum RedactError {
    /// A `RedactedSecret` was handed to serde without `serialize_exposed`.
    #[error("Refused to serialize redacted value ({redacted_len} bytes): {message} {location}")]
    ImplicitExposure {
        message: String,
        redacted_len: usize,
        location: ErrorLocation,
    },
}
