use serp_bridge::config::{AppConfig, default_config_dir, default_log_dir};
use serp_bridge::error::AppError;
use serp_bridge::logger::initialize as LoggerInitialize;

use bridge_core::hub::{BridgeMessage, Subscription};
use bridge_core::pairing::PairProber;
use bridge_core::{Bridge, StartOutcome};

use models::{InboundMessage, StartJobRequest};

use common::ErrorLocation;

use std::env::args;
use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, error, info, warn};
use tokio::signal::ctrl_c;
use tokio::time::sleep as TokioSleep;

const CONNECT_MAX_ELAPSED: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let log_dir = default_log_dir()?;
    create_dir_all(&log_dir).map_err(|e| AppError::App {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let config_dir = default_config_dir()?;
    let mut config = AppConfig::load(&config_dir)?;

    LoggerInitialize(&log_dir, config.log_settings()?)?;

    info!("serp-bridge starting");
    info!("Log directory: {}", log_dir.display());
    info!("Config directory: {}", config_dir.display());
    if config.ensure_self_identity() {
        config.save(&config_dir)?;
        info!("Generated a new pairing identity");
    }

    let prober = PairProber::new(config.candidates(), config.probe_timeout())
        .map_err(bridge_core::BridgeError::from)?;
    let bridge = Bridge::new(
        Arc::new(config.connector()),
        prober,
        config.bridge_settings(),
    );
    let monitor = bridge.subscribe();

    let identity = config.pairing.self_identity.clone().unwrap_or_default();
    match bridge.pair(&identity).await? {
        Some(pairing) => {
            info!(
                "Paired with {} (manifest {})",
                pairing.endpoint, pairing.manifest
            );
            if let Some(health) = bridge.check_health(&pairing.endpoint).await {
                info!(
                    "Companion health: ok={} root={}",
                    health.ok,
                    health.root.as_deref().unwrap_or("?")
                );
            }
        }
        None => warn!("No pair server found on candidate ports"),
    }

    connect_with_backoff(&bridge).await?;

    bridge.ping().await?;
    bridge.info().await?;

    if let Some(course_url) = args().nth(1) {
        match bridge.start_job(&StartJobRequest::new(course_url)).await? {
            StartOutcome::Issued(id) => info!("Start issued as request {id}"),
            StartOutcome::Rejected { active_job_id } => {
                warn!("Job {active_job_id} is already running")
            }
            StartOutcome::Pending { correlation_id } => {
                warn!("Start {correlation_id} is still waiting for the companion")
            }
        }
    }

    monitor_until_interrupted(&bridge, monitor).await;

    if bridge.job_snapshot().await.current.is_some() {
        match bridge.cancel_current().await {
            Ok(id) => info!("Cancel issued as request {id}"),
            Err(e) => warn!("Failed to cancel job on shutdown: {e}"),
        }
    }

    bridge.disconnect().await;
    info!("serp-bridge stopped");
    Ok(())
}

/// Retry `ensure_connection` while the companion is unavailable.
async fn connect_with_backoff(bridge: &Bridge) -> Result<(), AppError> {
    let mut backoff = ExponentialBackoff {
        max_elapsed_time: Some(CONNECT_MAX_ELAPSED),
        ..Default::default()
    };

    loop {
        match bridge.ensure_connection().await {
            Ok(connection) => {
                info!(
                    "Companion connected: {} (generation {})",
                    connection.identity, connection.generation
                );
                return Ok(());
            }
            Err(bridge_core::BridgeError::Transport(e)) if e.is_unavailable() => {
                match backoff.next_backoff() {
                    Some(duration) => {
                        debug!("Companion unavailable, retrying after {duration:?}: {e}");
                        TokioSleep(duration).await;
                    }
                    None => return Err(bridge_core::BridgeError::from(e).into()),
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn monitor_until_interrupted(bridge: &Bridge, mut monitor: Subscription) {
    loop {
        tokio::select! {
            message = monitor.recv() => match message {
                Some(message) => log_message(&message),
                None => break,
            },
            signal = ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    if let Some(line) = bridge.job_snapshot().await.diagnostics.last() {
        debug!("Last job diagnostic: {line}");
    }
}

fn log_message(message: &BridgeMessage) {
    match message {
        BridgeMessage::Inbound(InboundMessage::Event(event)) => match event.job_id() {
            Some(job_id) => info!("[event] {} (job {job_id})", event.event_type()),
            None => info!("[event] {}", event.event_type()),
        },
        BridgeMessage::Inbound(InboundMessage::Response(response)) if response.ok => {
            info!(
                "[ok] {} {}",
                response.id.as_ref().map_or("?", |id| id.as_str()),
                response.result.as_ref().map(ToString::to_string).unwrap_or_default()
            );
        }
        BridgeMessage::Inbound(InboundMessage::Response(response)) => {
            warn!(
                "[err] {} {}",
                response.id.as_ref().map_or("?", |id| id.as_str()),
                response.error.as_deref().unwrap_or("unknown_error")
            );
        }
        BridgeMessage::Diagnostic(diagnostic) => {
            warn!("[bridge] {:?}: {}", diagnostic.kind, diagnostic.detail);
        }
    }
}
