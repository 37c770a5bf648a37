//! Job lifecycle tracking.
//!
//! [`JobTracker`] is the plain state machine for the single current job.
//! [`JobState`] runs it as an actor fed by a hub subscription so every
//! inbound message is applied in arrival order, and hands out
//! [`JobSnapshot`]s for reads.

mod auth;
mod diagnostics;
mod state;
mod tracker;

pub use auth::choose_auth;
pub use diagnostics::DiagnosticLog;
pub use state::{JobSnapshot, JobState};
pub use tracker::{AuthMode, Job, JobOutcome, JobPhase, JobTracker, PendingStart};

/// Diagnostic lines kept when no other bound is configured.
pub const DEFAULT_MAX_DIAGNOSTIC_LINES: usize = 500;
