//! Shared building blocks for the SERP bridge workspace.
//!
//! This crate has no knowledge of the companion protocol. It only carries
//! the pieces every layer needs:
//!
//! - [`ErrorLocation`] for `#[track_caller]` error sites
//! - [`RedactedSecret`] for credentials that must never reach a log line
//! - [`HttpStatusCode`] for categorising pairing probe replies

pub mod error;
pub mod http_status;
pub mod redacted_secret;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_secret::RedactedSecret;
