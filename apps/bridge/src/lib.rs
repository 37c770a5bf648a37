// Library exports for testing
// The binary (main.rs) imports these as well

pub mod config;
pub mod error;
pub mod logger;


/// Directory name used under the platform config and data directories.
pub const APP_DIR_NAME: &str = "serp-bridge";
