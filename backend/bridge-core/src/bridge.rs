//! The bridge orchestrator.
//!
//! A [`Bridge`] owns one of each component: hub, transport channel,
//! correlation registry, job state and pair prober. Nothing is global, so
//! several bridges can live side by side (tests rely on this).

use crate::correlation::{CorrelationRegistry, await_response};
use crate::error::BridgeError;
use crate::error::job::JobError;
use crate::error::transport::TransportError;
use crate::hub::{BridgeMessage, Diagnostic, DiagnosticKind, EventHub, Subscription};
use crate::job::{
    AuthMode, DEFAULT_MAX_DIAGNOSTIC_LINES, JobSnapshot, JobState, choose_auth,
};
use crate::pairing::{CandidateEndpoint, PairProber, Pairing};
use crate::transport::{ConnectionInfo, Connector, TransportChannel};

use models::{
    CancelPayload, CommandType, CorrelationId, DEFAULT_CAPTION_LANG, HealthResponse,
    OpenLogPayload, ResponseMessage, StartDownloadPayloadBuilder, StartJobRequest,
};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;
use serde_json::{Value, json};

/// Browser profile used when no usable cookie jar is supplied.
pub const DEFAULT_FALLBACK_BROWSER: &str = "chrome";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub fallback_browser: String,
    /// Used when a start request leaves the caption language unset.
    pub caption_lang: String,
    pub max_diagnostic_lines: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            fallback_browser: DEFAULT_FALLBACK_BROWSER.to_string(),
            caption_lang: DEFAULT_CAPTION_LANG.to_string(),
            max_diagnostic_lines: DEFAULT_MAX_DIAGNOSTIC_LINES,
        }
    }
}

/// Result of [`Bridge::start_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The start command was sent under this id.
    Issued(CorrelationId),
    /// A job is already current; nothing was sent.
    Rejected { active_job_id: String },
    /// An earlier start is still waiting for its answer; nothing was sent.
    Pending { correlation_id: CorrelationId },
}

pub struct Bridge {
    hub: EventHub,
    transport: Arc<TransportChannel>,
    registry: CorrelationRegistry,
    jobs: JobState,
    prober: PairProber,
    settings: BridgeSettings,
}

impl Bridge {
    pub fn new(connector: Arc<dyn Connector>, prober: PairProber, settings: BridgeSettings) -> Self {
        let hub = EventHub::new();
        // Subscribed before the transport exists so the tracker sees every frame.
        let jobs = JobState::new(&hub, settings.max_diagnostic_lines);
        let transport = Arc::new(TransportChannel::new(connector, hub.clone()));
        let registry = CorrelationRegistry::new(Arc::clone(&transport));

        Self {
            hub,
            transport,
            registry,
            jobs,
            prober,
            settings,
        }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Attach a listener to every inbound message and diagnostic from now on.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    pub async fn ensure_connection(&self) -> Result<ConnectionInfo, BridgeError> {
        self.jobs.ensure_actor().await;
        Ok(self.transport.ensure_connection().await?)
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
    }

    /// Send a command and return its id without waiting for the response.
    pub async fn issue(
        &self,
        command: CommandType,
        payload: Value,
    ) -> Result<CorrelationId, BridgeError> {
        self.jobs.ensure_actor().await;
        Ok(self.registry.issue(command, payload).await?)
    }

    /// Send a command and wait up to `window` for its response.
    pub async fn request(
        &self,
        command: CommandType,
        payload: Value,
        window: Duration,
    ) -> Result<ResponseMessage, BridgeError> {
        let mut subscription = self.hub.subscribe();
        let id = self.issue(command, payload).await?;
        Ok(await_response(&mut subscription, &id, window).await?)
    }

    pub async fn ping(&self) -> Result<CorrelationId, BridgeError> {
        self.issue(CommandType::Ping, json!({})).await
    }

    /// The response reports the companion's external tool versions.
    pub async fn info(&self) -> Result<CorrelationId, BridgeError> {
        self.issue(CommandType::Info, json!({})).await
    }

    /// Ask the companion to reveal the current job's log file.
    pub async fn open_log(&self) -> Result<CorrelationId, BridgeError> {
        let log_file = self.jobs.current_job().await.and_then(|job| job.log_file);
        let payload = to_payload(&OpenLogPayload { log_file })?;
        self.issue(CommandType::OpenLog, payload).await
    }

    /// Start a download unless a job is current or another start is unanswered.
    ///
    /// Auth is cookie based when `request.cookies` holds a usable jar and the
    /// configured fallback browser profile otherwise. A refused start sends
    /// nothing and publishes a [`DiagnosticKind::ConflictingJobStart`]. A start
    /// whose connection closed before it was answered no longer blocks.
    pub async fn start_job(&self, request: &StartJobRequest) -> Result<StartOutcome, BridgeError> {
        let auth = choose_auth(request.cookies.as_ref(), &self.settings.fallback_browser);
        let caption_lang = request
            .caption_lang
            .clone()
            .filter(|lang| !lang.trim().is_empty())
            .unwrap_or_else(|| self.settings.caption_lang.clone());

        let payload = StartDownloadPayloadBuilder::from_request(request)
            .with_captions(request.download_captions, Some(caption_lang))
            .with_auth(auth.clone())
            .build()?;
        let payload = to_payload(&payload)?;

        let live_generation = self.transport.live_generation().await;
        let stamped = {
            let mut tracker = self.jobs.tracker_mut().await;
            tracker.expire_stale_start(live_generation);

            match tracker.check_can_start() {
                Ok(()) => {}
                Err(JobError::ConflictingJobStart { active_job_id, .. }) => {
                    tracker.record_conflict(&active_job_id);
                    drop(tracker);

                    warn!("Refusing to start: job {active_job_id} is already running");
                    self.publish_conflict(format!("Job {active_job_id} is already running"));
                    return Ok(StartOutcome::Rejected { active_job_id });
                }
                Err(JobError::StartPending { correlation_id, .. }) => {
                    tracker.record_pending_conflict(&correlation_id);
                    drop(tracker);

                    warn!("Refusing to start: start {correlation_id} is still unanswered");
                    self.publish_conflict(format!(
                        "Start {correlation_id} is still waiting for the companion"
                    ));
                    return Ok(StartOutcome::Pending { correlation_id });
                }
                Err(e) => return Err(e.into()),
            }

            let stamped = self.registry.stamp(CommandType::StartDownload, payload);
            tracker.record_start_issued(
                stamped.id.clone(),
                AuthMode::from(&auth),
                request.bearer.is_some(),
            );
            stamped
        };

        match self.registry.dispatch(&stamped).await {
            Ok(connection) => {
                self.jobs
                    .tracker_mut()
                    .await
                    .record_start_delivered(&stamped.id, connection.generation);
            }
            Err(e) => {
                self.jobs
                    .tracker_mut()
                    .await
                    .abandon_start(&stamped.id, &e.to_string());
                return Err(e.into());
            }
        }

        info!("Start requested as {} ({})", stamped.id, auth.browser());
        Ok(StartOutcome::Issued(stamped.id))
    }

    fn publish_conflict(&self, detail: String) {
        self.hub.publish(BridgeMessage::Diagnostic(Diagnostic::new(
            DiagnosticKind::ConflictingJobStart,
            detail,
        )));
    }

    /// Ask the companion to cancel the current job.
    ///
    /// The job stays current until the companion reports it finished.
    pub async fn cancel_current(&self) -> Result<CorrelationId, BridgeError> {
        let Some(job) = self.jobs.current_job().await else {
            return Err(JobError::NoActiveJob {
                message: String::from("There is no job to cancel"),
                location: ErrorLocation::from(Location::caller()),
            }
            .into());
        };

        info!("Cancelling job {}", job.id);
        let payload = to_payload(&CancelPayload { job_id: job.id })?;
        self.issue(CommandType::CancelDownload, payload).await
    }

    pub async fn pair(&self, self_identity: &str) -> Result<Option<Pairing>, BridgeError> {
        Ok(self.prober.pair(self_identity).await?)
    }

    pub async fn check_health(&self, endpoint: &CandidateEndpoint) -> Option<HealthResponse> {
        self.prober.check_health(endpoint).await
    }

    pub async fn job_snapshot(&self) -> JobSnapshot {
        self.jobs.snapshot().await
    }
}

#[track_caller]
fn to_payload<T: Serialize>(value: &T) -> Result<Value, TransportError> {
    serde_json::to_value(value).map_err(|e| TransportError::Encode {
        message: format!("Failed to serialize payload: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
