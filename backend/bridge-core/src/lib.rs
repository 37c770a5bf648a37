pub mod bridge;
pub mod correlation;
pub mod error;
pub mod hub;
pub mod job;
pub mod pairing;
pub mod transport;

#[cfg(test)]
mod tests;

pub use bridge::{Bridge, BridgeSettings, StartOutcome};
pub use error::BridgeError;

/// Native-messaging host name the companion registers under.
pub const COMPANION_HOST_NAME: &str = "com.serp.companion";
/// Executable launched when no companion program is configured.
pub const COMPANION_BINARY: &str = "serp-companion";
/// Log target for lines the companion writes to stderr.
pub const COMPANION_STDERR_TARGET: &str = "companion";
pub const PAIR_SERVER_HOSTNAME: &str = "127.0.0.1";
/// Pair server ports in preference order; first affirmative reply wins.
pub const DEFAULT_PAIR_PORTS: [u16; 8] = [60123, 53123, 54123, 55123, 56123, 47123, 42123, 23123];
