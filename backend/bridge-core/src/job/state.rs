//! Job state actor.
//!
//! The tracker is fed from its own hub subscription, taken when the state is
//! built so nothing published before the actor starts is missed. The actor
//! itself is spawned lazily on first use from an async context.
//!
//! Reads go through [`JobState::snapshot`]. The bridge takes the write lock
//! directly when it must check and record a start atomically.
//!
//! The actor applies messages asynchronously, so a listener may see
//! `job.completed` before the tracker does. Every read first asks the actor to
//! catch up on what the hub has already queued for it, so decisions such as
//! "is there a job to cancel" reflect every message published so far.

use crate::hub::{BridgeMessage, EventHub, Subscription};
use crate::job::tracker::{AuthMode, Job, JobOutcome, JobPhase, JobTracker};

use std::sync::Arc;

use log::{debug, info};
use tokio::select;
use tokio::spawn as TokioSpawn;
use tokio::sync::{Mutex, RwLock, RwLockWriteGuard, mpsc, oneshot};

const COMMAND_QUEUE_LEN: usize = 32;

/// Requests handled by the job actor besides hub messages.
#[derive(Debug)]
pub(crate) enum StateCommand {
    /// Apply everything already queued on the feed, then reply.
    CatchUp(oneshot::Sender<()>),
}

/// Point-in-time copy of the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub current: Option<Job>,
    /// Auth of a start that has been sent but not answered yet.
    pub pending_start: Option<AuthMode>,
    pub last_outcome: Option<JobOutcome>,
    pub diagnostics: Vec<String>,
}

impl JobSnapshot {
    pub fn phase(&self) -> JobPhase {
        self.current.as_ref().map_or(JobPhase::Idle, |job| job.phase)
    }

    pub fn current_job_id(&self) -> Option<&str> {
        self.current.as_ref().map(|job| job.id.as_str())
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }
}

#[derive(Clone)]
pub struct JobState {
    tracker: Arc<RwLock<JobTracker>>,

    /// Taken by the actor when it is spawned.
    feed: Arc<Mutex<Option<Subscription>>>,

    /// Set when the actor is spawned.
    command_tx: Arc<Mutex<Option<mpsc::Sender<StateCommand>>>>,
}

impl JobState {
    pub fn new(hub: &EventHub, max_diagnostic_lines: usize) -> Self {
        Self {
            tracker: Arc::new(RwLock::new(JobTracker::new(max_diagnostic_lines))),
            feed: Arc::new(Mutex::new(Some(hub.subscribe()))),
            command_tx: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        self.catch_up().await;

        let tracker = self.tracker.read().await;
        JobSnapshot {
            current: tracker.current().cloned(),
            pending_start: tracker.pending().map(|pending| pending.auth.clone()),
            last_outcome: tracker.last_outcome().cloned(),
            diagnostics: tracker.diagnostics().to_vec(),
        }
    }

    pub async fn current_job(&self) -> Option<Job> {
        self.catch_up().await;
        self.tracker.read().await.current().cloned()
    }

    pub(crate) async fn tracker_mut(&self) -> RwLockWriteGuard<'_, JobTracker> {
        self.catch_up().await;
        self.tracker.write().await
    }

    /// Wait until the tracker has applied every message the hub has delivered
    /// to it so far. Returns immediately if the actor is gone.
    pub async fn catch_up(&self) {
        self.ensure_actor().await;

        let (done_tx, done_rx) = oneshot::channel();
        let sent = match self.command_tx.lock().await.as_ref() {
            Some(tx) => tx.send(StateCommand::CatchUp(done_tx)).await.is_ok(),
            None => false,
        };

        if !sent || done_rx.await.is_err() {
            debug!("Job state actor is not running; reading tracker as is");
        }
    }

    /// Spawn the actor if it is not running yet.
    pub(crate) async fn ensure_actor(&self) {
        let mut feed = self.feed.lock().await;
        if let Some(subscription) = feed.take() {
            let (tx, rx) = mpsc::channel(COMMAND_QUEUE_LEN);
            // Store tx before spawning so the first catch_up finds it
            *self.command_tx.lock().await = Some(tx);

            TokioSpawn(job_actor(subscription, rx, Arc::clone(&self.tracker)));
            info!("Job state actor spawned");
        }
    }
}

/// Applies every hub message to the tracker, in publish order, until the hub
/// or every `JobState` handle goes away.
async fn job_actor(
    mut subscription: Subscription,
    mut command_rx: mpsc::Receiver<StateCommand>,
    tracker: Arc<RwLock<JobTracker>>,
) {
    info!("Job state actor started ({})", subscription.id());

    loop {
        select! {
            message = subscription.recv() => {
                let Some(message) = message else { break };
                apply(&mut *tracker.write().await, &message);
            }
            command = command_rx.recv() => {
                let Some(StateCommand::CatchUp(done)) = command else { break };
                let mut tracker = tracker.write().await;
                while let Some(message) = subscription.try_recv() {
                    apply(&mut tracker, &message);
                }
                drop(tracker);
                let _ = done.send(());
            }
        }
    }

    info!("Job state actor stopped");
}

fn apply(tracker: &mut JobTracker, message: &BridgeMessage) {
    match message {
        BridgeMessage::Inbound(inbound) => tracker.apply(inbound),
        BridgeMessage::Diagnostic(diagnostic) => tracker.record_diagnostic(diagnostic),
    }
}
