//! Test helpers for bridge integration tests.
//!
//! This module provides:
//! - `FakeConnector`, which hands the bridge in-memory pipes instead of a process
//! - `FakeCompanion`, the test's end of those pipes, speaking the framed protocol
//! - Small waiting utilities with timeouts so a broken test fails instead of hanging

use bridge_core::error::TransportError;
use bridge_core::hub::{BridgeMessage, Subscription};
use bridge_core::job::JobSnapshot;
use bridge_core::pairing::PairProber;
use bridge_core::transport::framing::{read_frame, write_frame};
use bridge_core::transport::{CompanionStream, Connector};
use bridge_core::{Bridge, BridgeSettings};

use common::ErrorLocation;

use std::io::{Error as IoError, ErrorKind};
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{sleep, timeout};

pub const WAIT: Duration = Duration::from_secs(2);
const PIPE_CAPACITY: usize = 64 * 1024;

/// The companion's side of one connection.
pub struct FakeCompanion {
    from_bridge: DuplexStream,
    to_bridge: DuplexStream,
}

impl FakeCompanion {
    /// Next request written by the bridge, as JSON.
    pub async fn next_request(&mut self) -> Value {
        self.try_next_request(WAIT)
            .await
            .expect("Bridge sent nothing")
    }

    /// Next request, or `None` if nothing arrives within `window`.
    pub async fn try_next_request(&mut self, window: Duration) -> Option<Value> {
        let body = timeout(window, read_frame(&mut self.from_bridge))
            .await
            .ok()?
            .expect("Bridge wrote a broken frame")?;
        Some(serde_json::from_slice(&body).expect("Bridge wrote invalid JSON"))
    }

    pub async fn send(&mut self, message: Value) {
        let body = serde_json::to_vec(&message).expect("serializable");
        let mut framed = (body.len() as u32).to_ne_bytes().to_vec();
        framed.extend_from_slice(&body);
        self.send_raw(&framed).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        write_frame(&mut self.to_bridge, bytes)
            .await
            .expect("Bridge end is gone");
    }

    /// Close the companion's output while still listening to the bridge.
    pub async fn close_output(&mut self) {
        self.to_bridge.shutdown().await.expect("shutdown");
    }

    /// True once the bridge has dropped its writing end, within `WAIT`.
    pub async fn bridge_hung_up(&mut self) -> bool {
        matches!(
            timeout(WAIT, read_frame(&mut self.from_bridge)).await,
            Ok(Ok(None))
        )
    }
}

/// Connector that opens in-memory pipes and hands the far end to the test.
pub struct FakeConnector {
    companions: UnboundedSender<FakeCompanion>,
    connects: AtomicUsize,
    unavailable: AtomicBool,
    connect_delay_ms: AtomicU64,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, FakeCompanions) {
        let (tx, rx) = unbounded_channel();
        let connector = Arc::new(Self {
            companions: tx,
            connects: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            connect_delay_ms: AtomicU64::new(0),
        });
        (connector, FakeCompanions(Mutex::new(rx)))
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every connect take `delay`, widening the window for racing callers.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<CompanionStream, TransportError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable {
                message: String::from("fake companion is down"),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(IoError::new(ErrorKind::ConnectionRefused, "down")),
            });
        }

        let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = self.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            sleep(Duration::from_millis(delay)).await;
        }

        let (bridge_writer, from_bridge) = duplex(PIPE_CAPACITY);
        let (to_bridge, bridge_reader) = duplex(PIPE_CAPACITY);

        self.companions
            .send(FakeCompanion {
                from_bridge,
                to_bridge,
            })
            .expect("test dropped the companion receiver");

        Ok(CompanionStream {
            identity: format!("fake-companion-{n}"),
            reader: Box::new(bridge_reader),
            writer: Box::new(bridge_writer),
            child: None,
        })
    }
}

/// Companions produced by a `FakeConnector`, one per connect.
pub struct FakeCompanions(Mutex<UnboundedReceiver<FakeCompanion>>);

impl FakeCompanions {
    pub async fn next(&self) -> FakeCompanion {
        timeout(WAIT, self.0.lock().await.recv())
            .await
            .expect("Bridge never connected")
            .expect("connector dropped")
    }
}

pub fn test_bridge(connector: Arc<FakeConnector>) -> Bridge {
    let prober = PairProber::new(Vec::new(), Duration::from_millis(100)).expect("client");
    Bridge::new(connector, prober, BridgeSettings::default())
}

/// Next hub message, failing the test after `WAIT`.
pub async fn next_message(subscription: &mut Subscription) -> BridgeMessage {
    timeout(WAIT, subscription.recv())
        .await
        .expect("No hub message in time")
        .expect("Hub closed")
}

/// Poll the job snapshot until `done` holds.
pub async fn wait_for_jobs<F>(bridge: &Bridge, done: F) -> JobSnapshot
where
    F: Fn(&JobSnapshot) -> bool,
{
    let poll = async {
        loop {
            let snapshot = bridge.job_snapshot().await;
            if done(&snapshot) {
                return snapshot;
            }
            sleep(Duration::from_millis(5)).await;
        }
    };
    match timeout(WAIT, poll).await {
        Ok(snapshot) => snapshot,
        Err(_) => panic!(
            "Job state never settled: {:?}",
            bridge.job_snapshot().await
        ),
    }
}
