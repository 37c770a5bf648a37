use crate::error::pairing::PairingError;
use crate::pairing::{HEALTH_ENDPOINT, IDENTITY_PARAM, PAIR_ENDPOINT};
use crate::{DEFAULT_PAIR_PORTS, PAIR_SERVER_HOSTNAME};

use models::{HealthResponse, PairResponse};

use common::{ErrorLocation, HttpStatusCode};

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use url::Url;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// One entry of the ordered candidate list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateEndpoint {
    pub host: String,
    pub port: u16,
}

impl CandidateEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Display for CandidateEndpoint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

/// A successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub endpoint: CandidateEndpoint,
    /// Native-messaging manifest path the companion registered for us.
    pub manifest: String,
}

/// Why a single candidate was skipped. Only ever logged.
#[derive(Debug)]
enum ProbeFailure {
    Unreachable(reqwest::Error),
    Status(HttpStatusCode),
    Body(reqwest::Error),
    Refused(Option<String>),
}

impl Display for ProbeFailure {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            ProbeFailure::Unreachable(e) => write!(formatter, "unreachable: {e}"),
            ProbeFailure::Status(status) if status.is_client_error() => {
                write!(formatter, "rejected the request (HTTP {status})")
            }
            ProbeFailure::Status(status) => write!(formatter, "HTTP {status}"),
            ProbeFailure::Body(e) => write!(formatter, "malformed reply: {e}"),
            ProbeFailure::Refused(Some(reason)) => write!(formatter, "refused: {reason}"),
            ProbeFailure::Refused(None) => write!(formatter, "not affirmative"),
        }
    }
}

pub struct PairProber {
    candidates: Vec<CandidateEndpoint>,
    client: Client,
    probe_timeout: Duration,
}

impl PairProber {
    #[track_caller]
    pub fn new(
        candidates: Vec<CandidateEndpoint>,
        probe_timeout: Duration,
    ) -> Result<Self, PairingError> {
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| PairingError::Client {
                message: format!("Failed to build HTTP client: {e}"),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            })?;

        Ok(Self {
            candidates,
            client,
            probe_timeout,
        })
    }

    /// Loopback on the stock port list, in preference order.
    #[track_caller]
    pub fn with_default_candidates() -> Result<Self, PairingError> {
        let candidates = DEFAULT_PAIR_PORTS
            .iter()
            .map(|port| CandidateEndpoint::new(PAIR_SERVER_HOSTNAME, *port))
            .collect();
        Self::new(candidates, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn candidates(&self) -> &[CandidateEndpoint] {
        &self.candidates
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Probe the candidates in order and stop at the first affirmative reply.
    ///
    /// # Errors
    ///
    /// Only [`PairingError::Validation`] for an empty identity or an endpoint
    /// that does not form a valid URL. No reachable pair server is `Ok(None)`.
    pub async fn pair(&self, self_identity: &str) -> Result<Option<Pairing>, PairingError> {
        if self_identity.trim().is_empty() {
            return Err(PairingError::Validation {
                message: String::from("Pairing identity must not be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        for candidate in &self.candidates {
            let url = pair_url(candidate, self_identity)?;
            match self.probe(url).await {
                Ok(manifest) => {
                    info!("Paired with {candidate}, manifest {manifest}");
                    return Ok(Some(Pairing {
                        endpoint: candidate.clone(),
                        manifest,
                    }));
                }
                Err(failure) => debug!("Pair probe to {candidate} failed: {failure}"),
            }
        }

        info!(
            "No pair server answered on {} candidate(s)",
            self.candidates.len()
        );
        Ok(None)
    }

    /// Fetch the companion's health report. Any failure is `None`.
    pub async fn check_health(&self, endpoint: &CandidateEndpoint) -> Option<HealthResponse> {
        let url = format!("{}{HEALTH_ENDPOINT}", endpoint.base_url());

        match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => match resp.json::<HealthResponse>().await {
                Ok(health) => {
                    debug!("Health check succeeded for {endpoint}");
                    Some(health)
                }
                Err(e) => {
                    debug!("Health check for {endpoint} returned a malformed body: {e}");
                    None
                }
            },
            Ok(resp) => {
                debug!(
                    "Health check failed for {endpoint}: status={}",
                    resp.status()
                );
                None
            }
            Err(e) => {
                debug!("Health check failed for {endpoint}: {e}");
                None
            }
        }
    }

    async fn probe(&self, url: Url) -> Result<String, ProbeFailure> {
        let resp = self
            .client
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(ProbeFailure::Unreachable)?;

        let status = HttpStatusCode::from(resp.status().as_u16());
        if !status.is_success() {
            return Err(ProbeFailure::Status(status));
        }

        let body: PairResponse = resp.json().await.map_err(ProbeFailure::Body)?;
        match body.affirmative_manifest() {
            Some(manifest) => Ok(manifest.to_string()),
            None => Err(ProbeFailure::Refused(body.error)),
        }
    }
}

#[track_caller]
pub(crate) fn pair_url(candidate: &CandidateEndpoint, self_identity: &str) -> Result<Url, PairingError> {
    let mut url = Url::parse(&format!("{}{PAIR_ENDPOINT}", candidate.base_url())).map_err(|e| {
        PairingError::Validation {
            message: format!("Candidate {candidate} is not a valid endpoint: {e}"),
            location: ErrorLocation::from(Location::caller()),
        }
    })?;
    url.query_pairs_mut()
        .append_pair(IDENTITY_PARAM, self_identity);
    Ok(url)
}
