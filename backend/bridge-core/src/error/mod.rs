pub mod correlation;
pub mod job;
pub mod pairing;
pub mod transport;

pub use correlation::CorrelationError;
pub use job::JobError;
pub use pairing::PairingError;
pub use transport::TransportError;

use models::ModelError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
