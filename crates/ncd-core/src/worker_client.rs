//! Blocking client for the isolated worker process.

use std::borrow::Cow;
use std::io::{BufReader, BufWriter};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendError, DistanceBackend};
use crate::config::NcdConfig;
use crate::worker_ipc::{
    DEFAULT_MAX_FRAME_BYTES, IpcError, WorkerRequest, WorkerResponse, encode_frame, read_frame,
    write_payload,
};

/// Environment variable naming the worker binary.
pub const WORKER_ENV: &str = "NCD_WORKER";

/// Default worker binary, resolved through `PATH`.
pub const DEFAULT_WORKER_COMMAND: &str = "ncd-worker";

/// Worker process configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerConfig {
    /// Worker binary.
    pub command: String,
    /// Worker args.
    pub args: Vec<String>,
    /// Max frame size in both directions. Passed to the worker as
    /// `--max-frame-bytes`.
    pub max_frame_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_WORKER_COMMAND.to_owned(),
            args: Vec::new(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl WorkerConfig {
    /// Default configuration with the command taken from `NCD_WORKER` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let command = std::env::var(WORKER_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WORKER_COMMAND.to_owned());
        Self {
            command,
            ..Self::default()
        }
    }
}

/// Errors while starting the worker.
#[derive(Debug, Error)]
pub enum WorkerInitError {
    /// Spawn failure.
    #[error("failed to spawn worker `{command}`: {source}")]
    Spawn {
        /// Command that failed.
        command: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Worker missing stdio pipes.
    #[error("worker stdio pipe missing")]
    MissingPipe,
    /// Worker did not answer the health check.
    #[error("worker health check failed: {0}")]
    Handshake(String),
}

struct WorkerSession {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl WorkerSession {
    fn spawn(cfg: &WorkerConfig) -> Result<Self, WorkerInitError> {
        let mut cmd = Command::new(&cfg.command);
        cmd.args(&cfg.args)
            .arg(format!("--max-frame-bytes={}", cfg.max_frame_bytes))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        let mut child = cmd.spawn().map_err(|source| WorkerInitError::Spawn {
            command: cfg.command.clone(),
            source,
        })?;
        let stdin = child.stdin.take().ok_or(WorkerInitError::MissingPipe)?;
        let stdout = child.stdout.take().ok_or(WorkerInitError::MissingPipe)?;
        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    fn request(
        &mut self,
        payload: &[u8],
        max_frame_bytes: usize,
    ) -> Result<WorkerResponse, IpcError> {
        write_payload(&mut self.stdin, payload)?;
        read_frame(&mut self.stdout, max_frame_bytes)
    }
}

impl Drop for WorkerSession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Thread-safe worker client. Requests are serialized over one session.
///
/// The child process is killed and reaped when the client is dropped.
pub struct WorkerClient {
    cfg: WorkerConfig,
    session: Mutex<WorkerSession>,
}

impl WorkerClient {
    /// Starts the worker and waits for a healthy handshake.
    pub fn connect(cfg: WorkerConfig) -> Result<Self, WorkerInitError> {
        let mut session = WorkerSession::spawn(&cfg)?;
        let health = encode_frame(&WorkerRequest::Health, cfg.max_frame_bytes)
            .map_err(|err| WorkerInitError::Handshake(err.to_string()))?;
        match session.request(&health, cfg.max_frame_bytes) {
            Ok(WorkerResponse::Health { ok: true }) => {}
            Ok(other) => {
                return Err(WorkerInitError::Handshake(format!(
                    "unexpected response: {other:?}"
                )));
            }
            Err(err) => return Err(WorkerInitError::Handshake(err.to_string())),
        }
        debug!(command = %cfg.command, "worker handshake complete");
        Ok(Self {
            cfg,
            session: Mutex::new(session),
        })
    }

    /// Configuration the worker was started with.
    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.cfg
    }

    /// Sends one request. Oversized requests are refused before the session
    /// is touched, so the worker stays usable.
    fn request(&self, req: &WorkerRequest<'_>) -> Result<WorkerResponse, BackendError> {
        let payload = encode_frame(req, self.cfg.max_frame_bytes).map_err(|err| match err {
            IpcError::FrameTooLarge { len, max } => BackendError::RequestTooLarge { len, max },
            other => BackendError::Worker(format!("worker request encoding failed: {other}")),
        })?;
        let mut guard = self
            .session
            .lock()
            .map_err(|_| BackendError::Worker("worker mutex poisoned".to_owned()))?;
        guard
            .request(&payload, self.cfg.max_frame_bytes)
            .map_err(|err| BackendError::Worker(format!("worker request failed: {err}")))
    }
}

impl DistanceBackend for WorkerClient {
    fn id(&self) -> &'static str {
        "worker"
    }

    fn distance(&self, x: &[u8], y: &[u8], cfg: &NcdConfig) -> Result<f64, BackendError> {
        match self.request(&WorkerRequest::Distance {
            left: Cow::Borrowed(x),
            right: Cow::Borrowed(y),
            options: cfg.worker_options(),
        })? {
            WorkerResponse::Distance { value } => Ok(value),
            WorkerResponse::Error { message } => Err(BackendError::Worker(message)),
            other => Err(BackendError::Worker(format!(
                "unexpected distance response variant: {other:?}"
            ))),
        }
    }

    fn matrix(
        &self,
        a: &[&[u8]],
        b: &[&[u8]],
        cfg: &NcdConfig,
    ) -> Result<Vec<Vec<f64>>, BackendError> {
        match self.request(&WorkerRequest::Matrix {
            rows: a.iter().map(|x| Cow::Borrowed(*x)).collect(),
            cols: b.iter().map(|y| Cow::Borrowed(*y)).collect(),
            options: cfg.worker_options(),
        })? {
            WorkerResponse::Matrix { values } => Ok(values),
            WorkerResponse::Error { message } => Err(BackendError::Worker(message)),
            other => Err(BackendError::Worker(format!(
                "unexpected matrix response variant: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_fails_to_connect() {
        let cfg = WorkerConfig {
            command: "ncd-worker-definitely-not-installed".to_owned(),
            ..WorkerConfig::default()
        };
        let err = WorkerClient::connect(cfg).err().expect("spawn must fail");
        assert!(matches!(err, WorkerInitError::Spawn { .. }));
    }

    #[test]
    fn non_worker_process_fails_handshake() {
        // `true` exits immediately without answering.
        let cfg = WorkerConfig {
            command: "true".to_owned(),
            ..WorkerConfig::default()
        };
        if let Err(err) = WorkerClient::connect(cfg) {
            assert!(matches!(
                err,
                WorkerInitError::Handshake(_) | WorkerInitError::Spawn { .. }
            ));
        } else {
            panic!("`true` must not pass the health check");
        }
    }
}
