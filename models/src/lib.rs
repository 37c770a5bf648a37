//! Wire models for the SERP companion bridge.
//!
//! This crate contains pure data structures: the commands sent to the
//! companion process, the events and responses it sends back, the
//! `udemy.start` payload and the pairing handshake replies. Nothing here
//! performs I/O.
//!
//! ## Architecture
//!
//! - **common**: error locations, redacted secrets
//! - **models** (this crate): protocol data
//! - **bridge-core**: transport, correlation, fan-out, job tracking, pairing
//! - **serp-bridge**: host binary wiring everything together

pub mod command;
pub mod error;
pub mod message;
pub mod pairing;
pub mod start_download;

#[cfg(test)]
mod tests;

pub use command::{CancelPayload, CommandType, CorrelationId, OpenLogPayload, OutboundRequest};
pub use error::model_error::ModelError;
pub use message::{
    CompanionEvent, EventEnvelope, InboundMessage, ResponseMessage, UnrecognizedEvent,
};
pub use pairing::{HealthResponse, PairResponse};
pub use start_download::builder::StartDownloadPayloadBuilder;
pub use start_download::{
    AuthChoice, COOKIE_FILE_BROWSER, CookieJar, DEFAULT_CAPTION_LANG, StartDownloadPayload,
    StartJobRequest,
};
