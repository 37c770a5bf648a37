use crate::COMPANION_STDERR_TARGET;
use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::env::current_exe;
use std::io::Error as IoError;
use std::io::ErrorKind;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, info, trace};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;
use tokio::spawn as TokioSpawn;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A freshly opened duplex stream to the companion.
pub struct CompanionStream {
    /// Human-readable identity of the remote end, used in logs.
    pub identity: String,
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
    /// Spawned process, if any. Dropping it kills the companion.
    pub child: Option<TokioChild>,
}

/// Opens connections to the companion.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<CompanionStream, TransportError>;
}

/// Spawns the companion executable and talks to it over stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessConnector {
    program: PathBuf,
    args: Vec<String>,
    host_name: String,
}

impl ProcessConnector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, host_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            host_name: host_name.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub(crate) fn build_command(&self, program: &Path) -> TokioCommand {
        let mut cmd = TokioCommand::new(program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Retry next to our own executable when `program` is a bare name missing from PATH.
    fn spawn_local_binary(&self) -> Result<TokioChild, TransportError> {
        let exe = current_exe().map_err(|e| TransportError::Unavailable {
            message: format!("Failed to get current executable path: {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

        let dir = exe.parent().ok_or_else(|| TransportError::Unavailable {
            message: format!("Executable has no parent directory: {}", exe.display()),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(IoError::new(ErrorKind::NotFound, "no parent dir")),
        })?;

        let local_path = dir.join(&self.program);
        debug!("Attempting to spawn companion from {}", local_path.display());

        self.build_command(&local_path)
            .current_dir(dir)
            .spawn()
            .map_err(|e| TransportError::Unavailable {
                message: format!(
                    "Failed to spawn companion from {}: {e}",
                    local_path.display()
                ),
                location: ErrorLocation::from(Location::caller()),
                source: Box::new(e),
            })
    }

    fn into_stream(&self, mut child: TokioChild) -> Result<CompanionStream, TransportError> {
        let stdin = child.stdin.take().ok_or_else(|| TransportError::Unavailable {
            message: String::from("Companion process has no stdin"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(IoError::new(ErrorKind::BrokenPipe, "stdin not piped")),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| TransportError::Unavailable {
            message: String::from("Companion process has no stdout"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(IoError::new(ErrorKind::BrokenPipe, "stdout not piped")),
        })?;

        // stderr is not part of the protocol; keep it for debugging only
        if let Some(stderr) = child.stderr.take() {
            TokioSpawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(target: COMPANION_STDERR_TARGET, "{line}");
                }
            });
        }

        let identity = match child.id() {
            Some(pid) => format!("{} (PID {pid})", self.host_name),
            None => self.host_name.clone(),
        };

        Ok(CompanionStream {
            identity,
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }
}

#[async_trait]
impl Connector for ProcessConnector {
    async fn connect(&self) -> Result<CompanionStream, TransportError> {
        debug!("Spawning companion {}", self.program.display());

        let child = match self.build_command(&self.program).spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == ErrorKind::NotFound && self.program.components().count() == 1 => {
                debug!(
                    "{} not in PATH, trying local binary",
                    self.program.display()
                );
                self.spawn_local_binary()?
            }
            Err(err) => {
                return Err(TransportError::Unavailable {
                    message: format!("Failed to spawn {}: {err}", self.program.display()),
                    location: ErrorLocation::from(Location::caller()),
                    source: Box::new(err),
                });
            }
        };

        info!(
            "Spawned companion {} (PID: {:?})",
            self.program.display(),
            child.id()
        );

        self.into_stream(child)
    }
}
