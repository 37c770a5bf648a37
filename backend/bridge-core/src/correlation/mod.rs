//! Request ids and response matching.
//!
//! Correlation is purely by echo: every request carries a fresh id and the
//! companion repeats it on the response, which then reaches callers through
//! the hub like any other inbound message. Nothing here tracks outstanding
//! requests. A caller that wants to wait uses [`await_response`] with a
//! window of its own choosing.

mod registry;
mod waiter;

pub use registry::{CorrelationRegistry, IdSequence};
pub use waiter::await_response;
