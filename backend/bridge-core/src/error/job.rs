use models::CorrelationId;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum JobError {
    #[error("No Active Job Error: {message} {location}")]
    NoActiveJob {
        message: String,
        location: ErrorLocation,
    },

    #[error("Conflicting Job Start Error: job {active_job_id} is already running {location}")]
    ConflictingJobStart {
        active_job_id: String,
        location: ErrorLocation,
    },

    #[error("Start Pending Error: start {correlation_id} has not been answered yet {location}")]
    StartPending {
        correlation_id: CorrelationId,
        location: ErrorLocation,
    },
}
