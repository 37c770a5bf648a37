//! Inbound messages: unsolicited events and correlated responses.

use crate::command::CorrelationId;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every frame the companion writes is one of these, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InboundMessage {
    Event(EventEnvelope),
    Response(ResponseMessage),
}

impl InboundMessage {
    pub fn as_event(&self) -> Option<&EventEnvelope> {
        match self {
            InboundMessage::Event(envelope) => Some(envelope),
            InboundMessage::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseMessage> {
        match self {
            InboundMessage::Response(response) => Some(response),
            InboundMessage::Event(_) => None,
        }
    }
}

/// An event whose `type` is either part of the known vocabulary or kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventEnvelope {
    Known(CompanionEvent),
    Unrecognized(UnrecognizedEvent),
}

impl EventEnvelope {
    pub fn event_type(&self) -> &str {
        match self {
            EventEnvelope::Known(event) => event.event_type(),
            EventEnvelope::Unrecognized(event) => &event.event_type,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            EventEnvelope::Known(event) => event.job_id(),
            EventEnvelope::Unrecognized(event) => event.job_id.as_deref(),
        }
    }
}

/// Known companion events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompanionEvent {
    #[serde(rename = "host.ready")]
    HostReady { root: Option<String> },

    #[serde(rename = "host.pair_server")]
    PairServer { addr: Option<String> },

    #[serde(rename = "host.cookies_saved")]
    CookiesSaved {
        path: Option<String>,
        bytes: Option<u64>,
    },

    #[serde(rename = "host.cookies_save_failed")]
    CookiesSaveFailed { error: Option<String> },

    #[serde(rename = "job.log", rename_all = "camelCase")]
    JobLog { job_id: String, line: String },

    #[serde(rename = "job.started", rename_all = "camelCase")]
    JobStarted {
        job_id: String,
        #[serde(default)]
        args: Vec<String>,
        log_file: Option<String>,
    },

    #[serde(rename = "job.completed", rename_all = "camelCase")]
    JobCompleted { job_id: String, code: Option<i32> },

    #[serde(rename = "job.failed", rename_all = "camelCase")]
    JobFailed { job_id: String, code: Option<i32> },

    #[serde(rename = "job.canceled", rename_all = "camelCase")]
    JobCanceled { job_id: String },

    /// Companion refused a start because another job is running.
    #[serde(rename = "job.active", rename_all = "camelCase")]
    JobActive { job_id: Option<String> },

    #[serde(rename = "job.retry_bearer", rename_all = "camelCase")]
    JobRetryBearer {
        job_id: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl CompanionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CompanionEvent::HostReady { .. } => "host.ready",
            CompanionEvent::PairServer { .. } => "host.pair_server",
            CompanionEvent::CookiesSaved { .. } => "host.cookies_saved",
            CompanionEvent::CookiesSaveFailed { .. } => "host.cookies_save_failed",
            CompanionEvent::JobLog { .. } => "job.log",
            CompanionEvent::JobStarted { .. } => "job.started",
            CompanionEvent::JobCompleted { .. } => "job.completed",
            CompanionEvent::JobFailed { .. } => "job.failed",
            CompanionEvent::JobCanceled { .. } => "job.canceled",
            CompanionEvent::JobActive { .. } => "job.active",
            CompanionEvent::JobRetryBearer { .. } => "job.retry_bearer",
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            CompanionEvent::JobLog { job_id, .. }
            | CompanionEvent::JobStarted { job_id, .. }
            | CompanionEvent::JobCompleted { job_id, .. }
            | CompanionEvent::JobFailed { job_id, .. }
            | CompanionEvent::JobCanceled { job_id }
            | CompanionEvent::JobRetryBearer { job_id, .. } => Some(job_id),
            CompanionEvent::JobActive { job_id } => job_id.as_deref(),
            CompanionEvent::HostReady { .. }
            | CompanionEvent::PairServer { .. }
            | CompanionEvent::CookiesSaved { .. }
            | CompanionEvent::CookiesSaveFailed { .. } => None,
        }
    }
}

/// Event outside the known vocabulary (or a known type with unusable fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnrecognizedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "jobId", default)]
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Reply to a request, echoing its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub id: Option<CorrelationId>,
    pub ok: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResponseMessage {
    /// `result.jobId`, present on a successful `udemy.start` or `udemy.cancel`.
    pub fn result_job_id(&self) -> Option<&str> {
        self.result.as_ref()?.get("jobId")?.as_str()
    }

    pub fn answers(&self, id: &CorrelationId) -> bool {
        self.id.as_ref() == Some(id)
    }
}
