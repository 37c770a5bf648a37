//! Persisted settings of the bridge host, stored as pretty JSON at
//! `<config_dir>/serp-bridge/config.json`.

use crate::APP_DIR_NAME;
use crate::error::ConfigError;
use crate::logger::{DEFAULT_LOG_LEVEL, LogSettings};

use bridge_core::job::DEFAULT_MAX_DIAGNOSTIC_LINES;
use bridge_core::pairing::{CandidateEndpoint, DEFAULT_PROBE_TIMEOUT};
use bridge_core::transport::ProcessConnector;
use bridge_core::{
    BridgeSettings, COMPANION_BINARY, COMPANION_HOST_NAME, DEFAULT_PAIR_PORTS,
    PAIR_SERVER_HOSTNAME,
};

use models::DEFAULT_CAPTION_LANG;

use common::ErrorLocation;

use std::fs::{create_dir_all, read_to_string, rename, write};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;
const MAX_PROBE_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_host_name")]
    pub host_name: String,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            host_name: default_host_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingConfig {
    #[serde(default = "default_pair_host")]
    pub host: String,
    /// Probed in this order; first affirmative reply wins.
    #[serde(default = "default_pair_ports")]
    pub ports: Vec<u16>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Identity sent as `extId`. Generated and saved on first start.
    #[serde(default)]
    pub self_identity: Option<String>,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            host: default_pair_host(),
            ports: default_pair_ports(),
            probe_timeout_ms: default_probe_timeout_ms(),
            self_identity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_fallback_browser")]
    pub fallback_browser: String,
    #[serde(default = "default_caption_lang")]
    pub caption_lang: String,
    #[serde(default = "default_max_diagnostic_lines")]
    pub max_diagnostic_lines: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            fallback_browser: default_fallback_browser(),
            caption_lang: default_caption_lang(),
            max_diagnostic_lines: default_max_diagnostic_lines(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`. Build default when unset.
    #[serde(default)]
    pub level: Option<String>,
    /// Level for companion stderr. Unset means off.
    #[serde(default)]
    pub companion_stderr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub companion: CompanionConfig,

    #[serde(default)]
    pub pairing: PairingConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            companion: CompanionConfig::default(),
            pairing: PairingConfig::default(),
            jobs: JobsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_program() -> String {
    COMPANION_BINARY.to_string()
}
fn default_host_name() -> String {
    COMPANION_HOST_NAME.to_string()
}
fn default_pair_host() -> String {
    PAIR_SERVER_HOSTNAME.to_string()
}
fn default_pair_ports() -> Vec<u16> {
    DEFAULT_PAIR_PORTS.to_vec()
}
fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}
fn default_fallback_browser() -> String {
    bridge_core::bridge::DEFAULT_FALLBACK_BROWSER.to_string()
}
fn default_caption_lang() -> String {
    DEFAULT_CAPTION_LANG.to_string()
}
fn default_max_diagnostic_lines() -> usize {
    DEFAULT_MAX_DIAGNOSTIC_LINES
}

/// `<platform config dir>/serp-bridge`.
#[track_caller]
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| no_directory("config"))
}

/// `<platform local data dir>/serp-bridge/logs`.
#[track_caller]
pub fn default_log_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("logs"))
        .ok_or_else(|| no_directory("local data"))
}

impl AppConfig {
    /// Load config from `{config_dir}/config.json`.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: AppConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/config.json` via temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(invalid(format!(
                "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                self.version
            )));
        }

        if self.companion.program.trim().is_empty() {
            return Err(invalid("companion.program cannot be empty"));
        }

        if self.pairing.ports.is_empty() {
            return Err(invalid("pairing.ports needs at least one port"));
        }

        if self.pairing.ports.contains(&0) {
            return Err(invalid("pairing.ports cannot contain port 0"));
        }

        if self.pairing.probe_timeout_ms == 0 || self.pairing.probe_timeout_ms > MAX_PROBE_TIMEOUT_MS
        {
            return Err(invalid(format!(
                "Invalid probe timeout: {}ms (must be 1-{MAX_PROBE_TIMEOUT_MS})",
                self.pairing.probe_timeout_ms
            )));
        }

        if self.jobs.fallback_browser.trim().is_empty() {
            return Err(invalid("jobs.fallback_browser cannot be empty"));
        }

        if self.jobs.max_diagnostic_lines == 0 {
            return Err(invalid("jobs.max_diagnostic_lines must be at least 1"));
        }

        self.log_settings()?;

        Ok(())
    }

    /// Resolve the `logging` section into logger settings.
    pub fn log_settings(&self) -> Result<LogSettings, ConfigError> {
        Ok(LogSettings {
            level: parse_level("logging.level", self.logging.level.as_deref())?
                .unwrap_or(DEFAULT_LOG_LEVEL),
            companion_stderr: parse_level(
                "logging.companion_stderr",
                self.logging.companion_stderr.as_deref(),
            )?
            .unwrap_or(LevelFilter::Off),
        })
    }

    /// Generate a pairing identity if there is none. Returns true when one was created.
    pub fn ensure_self_identity(&mut self) -> bool {
        if self
            .pairing
            .self_identity
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
        {
            return false;
        }
        self.pairing.self_identity = Some(Uuid::new_v4().simple().to_string());
        true
    }

    pub fn connector(&self) -> ProcessConnector {
        ProcessConnector::new(
            &self.companion.program,
            self.companion.args.clone(),
            &self.companion.host_name,
        )
    }

    pub fn candidates(&self) -> Vec<CandidateEndpoint> {
        self.pairing
            .ports
            .iter()
            .map(|port| CandidateEndpoint::new(&self.pairing.host, *port))
            .collect()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.pairing.probe_timeout_ms)
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            fallback_browser: self.jobs.fallback_browser.clone(),
            caption_lang: self.jobs.caption_lang.clone(),
            max_diagnostic_lines: self.jobs.max_diagnostic_lines,
        }
    }
}

#[track_caller]
fn no_directory(kind: &'static str) -> ConfigError {
    ConfigError::NoPlatformDirectory {
        location: ErrorLocation::from(Location::caller()),
        kind,
    }
}

#[track_caller]
fn parse_level(field: &str, value: Option<&str>) -> Result<Option<LevelFilter>, ConfigError> {
    value
        .map(|raw| {
            LevelFilter::from_str(raw.trim())
                .map_err(|_| invalid(format!("{field}: unknown log level '{raw}'")))
        })
        .transpose()
}

#[track_caller]
fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: reason.into(),
    }
}
