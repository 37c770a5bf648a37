//! Discovery of the companion's local pair server.
//!
//! Candidates are probed one at a time, in list order, and the first
//! affirmative handshake wins. Every pairing attempt rescans from the top of
//! the list. A candidate that refuses, times out or answers with anything but
//! `{ok: true, manifest}` is skipped; running out of candidates is reported as
//! `Ok(None)`, not as an error.

mod prober;

pub(crate) use prober::pair_url;
pub use prober::{CandidateEndpoint, DEFAULT_PROBE_TIMEOUT, PairProber, Pairing};

pub(crate) const PAIR_ENDPOINT: &str = "/pair";
pub(crate) const HEALTH_ENDPOINT: &str = "/health";
pub(crate) const IDENTITY_PARAM: &str = "extId";
