use crate::error::job::JobError;
use crate::hub::{Diagnostic, DiagnosticKind};
use crate::job::diagnostics::DiagnosticLog;

use models::{
    AuthChoice, CompanionEvent, CorrelationId, EventEnvelope, InboundMessage, ResponseMessage,
};

use common::ErrorLocation;

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    /// The companion accepted the start and named the job; `job.started` not seen yet.
    Starting,
    Running,
    Completed,
    Failed,
}

/// Which credential the start command carried. Never holds the secret itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    CookieFile,
    BrowserProfile(String),
}

impl From<&AuthChoice> for AuthMode {
    fn from(choice: &AuthChoice) -> Self {
        match choice {
            AuthChoice::CookieFile { .. } => AuthMode::CookieFile,
            AuthChoice::BrowserProfile(profile) => AuthMode::BrowserProfile(profile.clone()),
        }
    }
}

impl Display for AuthMode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            AuthMode::CookieFile => write!(formatter, "cookies.txt"),
            AuthMode::BrowserProfile(profile) => write!(formatter, "browser profile {profile}"),
        }
    }
}

/// A start command that has been sent but not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStart {
    pub correlation_id: CorrelationId,
    pub auth: AuthMode,
    pub bearer_supplied: bool,
    /// Connection generation the command was written on; `None` while it is in flight.
    pub generation: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub phase: JobPhase,
    pub log_file: Option<String>,
    pub args: Vec<String>,
    /// `None` when the job was not started by this bridge.
    pub auth: Option<AuthMode>,
    pub bearer_supplied: bool,
    /// Arguments of the bearer retry, once the companion reports one.
    pub bearer_retry_args: Option<Vec<String>>,
}

impl Job {
    fn new(id: impl Into<String>, phase: JobPhase, pending: Option<PendingStart>) -> Self {
        let (auth, bearer_supplied) = match pending {
            Some(pending) => (Some(pending.auth), pending.bearer_supplied),
            None => (None, false),
        };
        Self {
            id: id.into(),
            phase,
            log_file: None,
            args: Vec::new(),
            auth,
            bearer_supplied,
            bearer_retry_args: None,
        }
    }

    /// The directory following `-o` in the companion's arguments.
    pub fn output_dir(&self) -> Option<&str> {
        output_dir(&self.args)
    }
}

/// How the last job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: String,
    /// `Completed` or `Failed`.
    pub phase: JobPhase,
    pub code: Option<i32>,
}

/// State machine for the single current job.
#[derive(Debug, Clone)]
pub struct JobTracker {
    current: Option<Job>,
    pending: Option<PendingStart>,
    last_outcome: Option<JobOutcome>,
    diagnostics: DiagnosticLog,
}

impl JobTracker {
    pub fn new(max_diagnostic_lines: usize) -> Self {
        Self {
            current: None,
            pending: None,
            last_outcome: None,
            diagnostics: DiagnosticLog::new(max_diagnostic_lines),
        }
    }

    pub fn current(&self) -> Option<&Job> {
        self.current.as_ref()
    }

    pub fn current_job_id(&self) -> Option<&str> {
        self.current.as_ref().map(|job| job.id.as_str())
    }

    pub fn phase(&self) -> JobPhase {
        self.current.as_ref().map_or(JobPhase::Idle, |job| job.phase)
    }

    pub fn pending(&self) -> Option<&PendingStart> {
        self.pending.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&JobOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Fails with [`JobError::ConflictingJobStart`] while a job is current and
    /// with [`JobError::StartPending`] while an earlier start awaits its answer.
    ///
    /// Only one start may be outstanding: its response is the only thing that
    /// ties the companion's job id to the auth it was started with.
    #[track_caller]
    pub fn check_can_start(&self) -> Result<(), JobError> {
        if let Some(job) = &self.current {
            return Err(JobError::ConflictingJobStart {
                active_job_id: job.id.clone(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        match &self.pending {
            Some(pending) => Err(JobError::StartPending {
                correlation_id: pending.correlation_id.clone(),
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Ok(()),
        }
    }

    /// Drop a pending start whose connection is gone, since its answer can no
    /// longer arrive. `live_generation` is the current live connection, if any.
    ///
    /// Returns true when a start was dropped.
    pub fn expire_stale_start(&mut self, live_generation: Option<u64>) -> bool {
        let stale = self.pending.as_ref().is_some_and(|pending| {
            pending
                .generation
                .is_some_and(|generation| Some(generation) != live_generation)
        });
        if !stale {
            return false;
        }

        if let Some(pending) = self.pending.take() {
            warn!(
                "Start {} lost its connection before the companion answered",
                pending.correlation_id
            );
            self.diagnostics.push(format!(
                "[err] start {}: connection closed before the companion answered",
                pending.correlation_id
            ));
        }
        true
    }

    pub fn record_start_issued(
        &mut self,
        correlation_id: CorrelationId,
        auth: AuthMode,
        bearer_supplied: bool,
    ) {
        self.diagnostics.push(format!(
            "[ok] start requested ({auth}{})",
            if bearer_supplied { ", bearer supplied" } else { "" }
        ));
        self.pending = Some(PendingStart {
            correlation_id,
            auth,
            bearer_supplied,
            generation: None,
        });
    }

    /// Note the connection a pending start went out on.
    pub fn record_start_delivered(&mut self, correlation_id: &CorrelationId, generation: u64) {
        if let Some(pending) = self
            .pending
            .as_mut()
            .filter(|pending| &pending.correlation_id == correlation_id)
        {
            pending.generation = Some(generation);
        }
    }

    /// Forget a pending start whose command never left the bridge.
    pub fn abandon_start(&mut self, correlation_id: &CorrelationId, reason: &str) {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| &pending.correlation_id == correlation_id)
        {
            self.pending = None;
            self.diagnostics.push(format!("[err] start: {reason}"));
        }
    }

    /// A start refused locally because `active_job_id` is still current.
    pub fn record_conflict(&mut self, active_job_id: &str) {
        self.diagnostics
            .push(format!("[err] job {active_job_id} is already running"));
    }

    /// A start refused locally because start `correlation_id` is unanswered.
    pub fn record_pending_conflict(&mut self, correlation_id: &CorrelationId) {
        self.diagnostics.push(format!(
            "[err] start {correlation_id} is still waiting for the companion"
        ));
    }

    /// Record a bridge diagnostic that concerns the job stream.
    pub fn record_diagnostic(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.kind {
            DiagnosticKind::MalformedMessage | DiagnosticKind::FramingLost => {
                self.diagnostics
                    .push(format!("[err] {}", diagnostic.detail));
            }
            // Already recorded by the caller that refused the start.
            DiagnosticKind::ConflictingJobStart => {}
        }
    }

    pub fn apply(&mut self, message: &InboundMessage) {
        match message {
            InboundMessage::Response(response) => self.apply_response(response),
            InboundMessage::Event(EventEnvelope::Known(event)) => self.apply_event(event),
            InboundMessage::Event(EventEnvelope::Unrecognized(event)) => {
                let line = match &event.job_id {
                    Some(job_id) => format!("[job {job_id}] {}", event.event_type),
                    None => format!("[event] {}", event.event_type),
                };
                self.diagnostics.push(line);
            }
        }
    }

    fn apply_response(&mut self, response: &ResponseMessage) {
        let answers_start = self
            .pending
            .as_ref()
            .is_some_and(|pending| response.answers(&pending.correlation_id));

        if !answers_start {
            if !response.ok {
                self.diagnostics.push(format!(
                    "[err] {}",
                    response.error.as_deref().unwrap_or("unknown_error")
                ));
            }
            return;
        }

        let pending = self.pending.take();
        match (response.ok, response.result_job_id()) {
            (true, Some(job_id)) => {
                self.diagnostics
                    .push(format!("[ok] start accepted as job {job_id}"));
                self.replace_current(Job::new(job_id, JobPhase::Starting, pending));
            }
            (true, None) => {
                self.diagnostics
                    .push("[err] start: response carried no job id");
            }
            (false, _) => {
                self.diagnostics.push(format!(
                    "[err] start: {}",
                    response.error.as_deref().unwrap_or("unknown_error")
                ));
            }
        }
    }

    fn apply_event(&mut self, event: &CompanionEvent) {
        match event {
            CompanionEvent::JobStarted {
                job_id,
                args,
                log_file,
            } => self.on_started(job_id, args, log_file.as_deref()),

            CompanionEvent::JobLog { job_id, line } => {
                self.diagnostics.push(format!("[job {job_id}] {line}"));
            }

            CompanionEvent::JobCompleted { job_id, code } => {
                self.on_terminal(job_id, JobPhase::Completed, *code);
            }

            CompanionEvent::JobFailed { job_id, code } => {
                self.on_terminal(job_id, JobPhase::Failed, *code);
            }

            CompanionEvent::JobCanceled { job_id } => {
                self.diagnostics.push(format!("[job {job_id}] canceled"));
            }

            CompanionEvent::JobActive { job_id } => {
                // The companion refused our start; nothing will follow for it.
                self.pending = None;
                self.record_conflict(job_id.as_deref().unwrap_or("unknown"));
            }

            CompanionEvent::JobRetryBearer { job_id, args } => {
                self.on_retry_bearer(job_id, args);
            }

            CompanionEvent::CookiesSaved { path, bytes } => {
                self.diagnostics.push(format!(
                    "[host] cookies.txt saved: {} ({} bytes)",
                    path.as_deref().unwrap_or("?"),
                    bytes.map_or_else(|| String::from("?"), |b| b.to_string())
                ));
            }

            CompanionEvent::CookiesSaveFailed { error } => {
                self.diagnostics.push(format!(
                    "[host] cookies.txt save failed: {}",
                    error.as_deref().unwrap_or("unknown_error")
                ));
            }

            CompanionEvent::HostReady { root } => {
                self.diagnostics.push(format!(
                    "[host] ready: {}",
                    root.as_deref().unwrap_or("?")
                ));
            }

            CompanionEvent::PairServer { addr } => {
                self.diagnostics.push(format!(
                    "[host] pair server: {}",
                    addr.as_deref().unwrap_or("?")
                ));
            }
        }
    }

    fn on_started(&mut self, job_id: &str, args: &[String], log_file: Option<&str>) {
        if self
            .last_outcome
            .as_ref()
            .is_some_and(|outcome| outcome.job_id == job_id)
        {
            self.diagnostics
                .push(format!("[job {job_id}] started (already finished, ignored)"));
            return;
        }

        let mut job = match self.current.take() {
            Some(job) if job.id == job_id => job,
            previous => {
                if let Some(previous) = previous {
                    warn!("Job {job_id} started while {} was current", previous.id);
                }
                Job::new(job_id, JobPhase::Running, self.pending.take())
            }
        };

        job.phase = JobPhase::Running;
        if !args.is_empty() {
            job.args = args.to_vec();
        }
        if let Some(log_file) = log_file {
            job.log_file = Some(log_file.to_string());
        }

        info!("Job {job_id} running");
        self.diagnostics.push(format!("[job {job_id}] started"));
        if !job.args.is_empty() {
            self.diagnostics
                .push(format!("[job {job_id}] args: {}", job.args.join(" ")));
        }
        if let Some(dir) = job.output_dir() {
            self.diagnostics.push(format!("[job {job_id}] output: {dir}"));
        }

        self.current = Some(job);
    }

    fn on_terminal(&mut self, job_id: &str, phase: JobPhase, code: Option<i32>) {
        let verb = match phase {
            JobPhase::Failed => "failed",
            _ => "completed",
        };
        let code_text = code.map_or_else(|| String::from("?"), |c| c.to_string());

        if self.current_job_id() != Some(job_id) {
            self.diagnostics.push(format!(
                "[job {job_id}] {verb} ({code_text}), not the current job"
            ));
            return;
        }

        info!("Job {job_id} {verb} with code {code_text}");
        self.diagnostics
            .push(format!("[job {job_id}] {verb} ({code_text})"));
        self.current = None;
        self.last_outcome = Some(JobOutcome {
            job_id: job_id.to_string(),
            phase,
            code,
        });
    }

    fn on_retry_bearer(&mut self, job_id: &str, args: &[String]) {
        let joined = args.join(" ");
        let Some(job) = self.current.as_mut().filter(|job| job.id == job_id) else {
            self.diagnostics.push(format!(
                "[job {job_id}] retrying with bearer: {joined}, not the current job"
            ));
            return;
        };

        if !job.bearer_supplied {
            warn!("Job {job_id} is retrying with a bearer this bridge did not supply");
        }
        if job.auth.as_ref().is_some_and(|auth| *auth != AuthMode::CookieFile) {
            warn!("Job {job_id} is retrying with a bearer after a non-cookie attempt");
        }

        job.bearer_retry_args = Some(args.to_vec());
        self.diagnostics
            .push(format!("[job {job_id}] retrying with bearer: {joined}"));
    }

    fn replace_current(&mut self, job: Job) {
        if let Some(previous) = self.current.as_ref().filter(|previous| previous.id != job.id) {
            warn!("Job {} replaces current job {}", job.id, previous.id);
        }
        self.current = Some(job);
    }
}

fn output_dir(args: &[String]) -> Option<&str> {
    args.iter()
        .position(|arg| arg == "-o")
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}
