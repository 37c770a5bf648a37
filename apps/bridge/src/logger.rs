//! Logging for the bridge host.
//!
//! Coloured stdout plus a plain-text log file, initialized once. Companion
//! stderr goes through its own target so it can be silenced independently.

use crate::error::AppError;

use bridge_core::COMPANION_STDERR_TARGET;

use common::ErrorLocation;

use std::io::stdout;
use std::panic::Location;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, info, warn};

static INIT_LOGGER_LOCK: Mutex<()> = Mutex::new(());

static LOGGER_INSTALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "serp-bridge.log";

#[cfg(debug_assertions)]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    /// Level for companion stderr lines, which are emitted at trace.
    pub companion_stderr: LevelFilter,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            companion_stderr: LevelFilter::Off,
        }
    }
}

/// Initialize the logger with stdout and `<log_dir>/serp-bridge.log`.
///
/// Safe to call more than once: once a logger is installed, later calls log a
/// warning and return Ok. A failed call installs nothing and may be retried.
///
/// # Errors
///
/// Returns [`AppError::App`] if the log file cannot be created or a global
/// logger is already installed by someone else.
pub fn initialize(log_dir: &Path, settings: LogSettings) -> Result<(), AppError> {
    let _guard = INIT_LOGGER_LOCK
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if LOGGER_INSTALLED.load(Ordering::SeqCst) {
        warn!("Logger already initialized");
        return Ok(());
    }

    initialize_internal(log_dir, settings)?;
    LOGGER_INSTALLED.store(true, Ordering::SeqCst);

    info!(
        "Logger initialized with level: {:?} (companion stderr: {:?})",
        settings.level, settings.companion_stderr
    );
    Ok(())
}

#[track_caller]
fn initialize_internal(log_dir: &Path, settings: LogSettings) -> Result<(), AppError> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{target}]",
                date = format_rfc3339(SystemTime::now()),
                level = colors.color(record.level()),
                target = record.target(),
            ))
        })
        .chain(stdout());

    let log_file = fern::log_file(&log_file_path).map_err(|e| AppError::App {
        message: format!(
            "Failed to create log file {}: {e}",
            log_file_path.display()
        ),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let file_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = record.level(),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        })
        .chain(log_file);

    Dispatch::new()
        .level(settings.level)
        .level_for(COMPANION_STDERR_TARGET, settings.companion_stderr)
        // reqwest and its pool are chatty at debug
        .level_for("hyper_util", settings.level.min(LevelFilter::Info))
        .level_for("reqwest", settings.level.min(LevelFilter::Info))
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| AppError::App {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
