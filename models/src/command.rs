//! Outbound commands sent to the companion process.

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed command vocabulary understood by the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandType {
    #[serde(rename = "companion.ping")]
    Ping,
    #[serde(rename = "companion.info")]
    Info,
    #[serde(rename = "companion.openLog")]
    OpenLog,
    #[serde(rename = "udemy.start")]
    StartDownload,
    #[serde(rename = "udemy.cancel")]
    CancelDownload,
}

impl CommandType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CommandType::Ping => "companion.ping",
            CommandType::Info => "companion.info",
            CommandType::OpenLog => "companion.openLog",
            CommandType::StartDownload => "udemy.start",
            CommandType::CancelDownload => "udemy.cancel",
        }
    }
}

impl Display for CommandType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

/// Opaque id tying a request to the response that echoes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CorrelationId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

/// A stamped command. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundRequest {
    pub id: CorrelationId,
    #[serde(rename = "type")]
    pub command: CommandType,
    pub payload: Value,
}

/// Payload of `udemy.cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPayload {
    pub job_id: String,
}

/// Payload of `companion.openLog`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLogPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}
