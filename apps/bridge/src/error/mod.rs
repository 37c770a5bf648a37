pub mod config;

pub use config::ConfigError;

use bridge_core::BridgeError;

use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the host binary.
///
/// Serializable so they can be forwarded to a UI surface as-is.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum AppError {
    /// Error from this app
    #[error("App Error: {message} {location}")]
    App {
        message: String,
        location: ErrorLocation,
    },

    /// Error from bridge-core operations (transport, pairing, jobs)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },
}

impl From<BridgeError> for AppError {
    #[track_caller]
    fn from(error: BridgeError) -> Self {
        AppError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for AppError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        AppError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
