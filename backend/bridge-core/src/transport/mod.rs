//! Transport channel to the companion process.
//!
//! This module provides:
//! - Native-messaging framing (length prefix + UTF-8 JSON)
//! - A pluggable [`Connector`] that produces a duplex stream, with
//!   [`ProcessConnector`] spawning the real companion executable
//! - [`TransportChannel`], the owner of the single live connection
//!
//! # Reconnection
//!
//! The channel never reconnects eagerly. When the companion closes the pipe
//! the connection is only marked dead; the next `deliver` (or
//! `ensure_connection`) replaces it. There are no retries at this layer.

mod channel;
mod connector;
pub mod framing;

pub use channel::{ConnectionInfo, TransportChannel};
pub use connector::{BoxedReader, BoxedWriter, CompanionStream, Connector, ProcessConnector};
