//! Replies of the companion's local pair server.

use serde::{Deserialize, Serialize};

/// Body of `GET /pair?extId=...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairResponse {
    pub ok: bool,
    #[serde(default)]
    pub manifest: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PairResponse {
    /// Manifest path of an affirmative reply; `None` for anything else.
    pub fn affirmative_manifest(&self) -> Option<&str> {
        if self.ok {
            self.manifest.as_deref()
        } else {
            None
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub bin: Option<String>,
    #[serde(default)]
    pub manifest: Option<String>,
}
