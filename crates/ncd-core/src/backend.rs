//! Backend selection between the worker process and the reference engine.
//!
//! The worker is probed once: [`global_probe`] (or [`init_global_probe`])
//! spawns it on first use and caches the outcome for the rest of the
//! process. There is no re-probing. A worker that fails to start is a
//! fallback trigger, not an error. The cached worker lives until the process
//! exits; the worker notices stdin EOF and terminates on its own.
//!
//! Options the reference engine cannot honor (a non-zero fixed timestamp)
//! are rejected with [`BackendError::UnsupportedOption`] instead of being
//! dropped. Under [`BackendChoice::Auto`] a request too large for one worker
//! frame is served by the reference engine.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use crate::compressor::CompressionError;
use crate::config::{BackendChoice, NcdConfig};
use crate::distance::distance_with;
use crate::matrix::{MatrixProgress, matrix_values, matrix_with_progress};
use crate::worker_client::{WorkerClient, WorkerConfig};

/// Backend failures surfaced to callers.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The active backend cannot honor a requested option value.
    #[error("option `{option}` = {value} is not supported by the {backend} backend")]
    UnsupportedOption {
        /// Option name.
        option: &'static str,
        /// Requested value.
        value: String,
        /// Backend that refused it.
        backend: &'static str,
    },
    /// Compression failed or the configuration is invalid.
    #[error(transparent)]
    Compression(#[from] CompressionError),
    /// Worker unavailable, crashed, or reported an error.
    #[error("worker backend: {0}")]
    Worker(String),
    /// Encoded request exceeds the worker frame bound. Nothing was sent.
    #[error("worker backend: request of {len} bytes exceeds frame limit of {max}")]
    RequestTooLarge {
        /// Encoded request length.
        len: usize,
        /// Configured bound.
        max: usize,
    },
}

/// Something that can compute distances for a configuration.
pub trait DistanceBackend: Send + Sync {
    /// Backend identifier for logs and errors.
    fn id(&self) -> &'static str;
    /// Distance between `x` and `y`.
    fn distance(&self, x: &[u8], y: &[u8], cfg: &NcdConfig) -> Result<f64, BackendError>;
    /// Row-major grid of `a` against `b`.
    fn matrix(
        &self,
        a: &[&[u8]],
        b: &[&[u8]],
        cfg: &NcdConfig,
    ) -> Result<Vec<Vec<f64>>, BackendError>;

    /// [`DistanceBackend::matrix`] with progress reports. Backends that cannot
    /// report per cell emit a single report once the grid is done.
    fn matrix_with_progress(
        &self,
        a: &[&[u8]],
        b: &[&[u8]],
        cfg: &NcdConfig,
        on_cell: &mut dyn FnMut(MatrixProgress),
    ) -> Result<Vec<Vec<f64>>, BackendError> {
        let started = Instant::now();
        let values = self.matrix(a, b, cfg)?;
        let total = a.len().saturating_mul(b.len());
        if total > 0 {
            let row_bytes: usize = a.iter().map(|x| x.len()).sum();
            let col_bytes: usize = b.iter().map(|y| y.len()).sum();
            let input_bytes = row_bytes
                .saturating_mul(b.len())
                .saturating_add(col_bytes.saturating_mul(a.len()));
            on_cell(MatrixProgress {
                done: total,
                total,
                input_bytes: u64::try_from(input_bytes).unwrap_or(u64::MAX),
                wall: started.elapsed(),
            });
        }
        Ok(values)
    }
}

/// In-process engine built from the core modules.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceBackend;

impl ReferenceBackend {
    fn check(cfg: &NcdConfig) -> Result<(), BackendError> {
        cfg.validate()?;
        if cfg.fixed_timestamp != 0 {
            return Err(BackendError::UnsupportedOption {
                option: "fixed_timestamp",
                value: cfg.fixed_timestamp.to_string(),
                backend: "reference",
            });
        }
        Ok(())
    }
}

impl DistanceBackend for ReferenceBackend {
    fn id(&self) -> &'static str {
        "reference"
    }

    fn distance(&self, x: &[u8], y: &[u8], cfg: &NcdConfig) -> Result<f64, BackendError> {
        Self::check(cfg)?;
        let c = cfg.compressor_spec().build()?;
        Ok(distance_with(&*c, x, y, cfg.ncd_options())?)
    }

    fn matrix(
        &self,
        a: &[&[u8]],
        b: &[&[u8]],
        cfg: &NcdConfig,
    ) -> Result<Vec<Vec<f64>>, BackendError> {
        Self::check(cfg)?;
        let c = cfg.compressor_spec().build()?;
        Ok(matrix_values(&*c, a, b, cfg.ncd_options())?)
    }

    fn matrix_with_progress(
        &self,
        a: &[&[u8]],
        b: &[&[u8]],
        cfg: &NcdConfig,
        on_cell: &mut dyn FnMut(MatrixProgress),
    ) -> Result<Vec<Vec<f64>>, BackendError> {
        Self::check(cfg)?;
        let c = cfg.compressor_spec().build()?;
        Ok(matrix_with_progress(&*c, a, b, cfg.ncd_options(), on_cell)?)
    }
}

/// Outcome of probing for the worker.
pub enum BackendProbe {
    /// Worker started and answered the health check.
    Available(Arc<WorkerClient>),
    /// Worker could not be started; the reason is kept for diagnostics.
    Unavailable(String),
}

impl BackendProbe {
    /// Starts the worker described by `cfg` and checks it is healthy.
    #[must_use]
    pub fn run(cfg: &WorkerConfig) -> Self {
        match WorkerClient::connect(cfg.clone()) {
            Ok(client) => {
                info!(command = %cfg.command, "worker backend available");
                Self::Available(Arc::new(client))
            }
            Err(err) => {
                info!(
                    command = %cfg.command,
                    reason = %err,
                    "worker backend unavailable, using reference"
                );
                Self::Unavailable(err.to_string())
            }
        }
    }

    /// True when a worker is ready.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// The worker, when available.
    #[must_use]
    pub fn worker(&self) -> Option<&Arc<WorkerClient>> {
        match self {
            Self::Available(client) => Some(client),
            Self::Unavailable(_) => None,
        }
    }
}

static PROBE: OnceLock<BackendProbe> = OnceLock::new();

/// Process-wide probe using [`WorkerConfig::from_env`].
pub fn global_probe() -> &'static BackendProbe {
    PROBE.get_or_init(|| BackendProbe::run(&WorkerConfig::from_env()))
}

/// Process-wide probe using `cfg`. Only the first initialization runs; later
/// calls return the cached outcome regardless of `cfg`.
pub fn init_global_probe(cfg: &WorkerConfig) -> &'static BackendProbe {
    PROBE.get_or_init(|| BackendProbe::run(cfg))
}

/// Routes work to the worker or the reference engine.
pub struct Selector<'p> {
    probe: &'p BackendProbe,
    reference: ReferenceBackend,
}

impl<'p> Selector<'p> {
    /// Selector over an explicit probe outcome.
    #[must_use]
    pub fn new(probe: &'p BackendProbe) -> Self {
        Self {
            probe,
            reference: ReferenceBackend,
        }
    }

    /// Backend serving `choice`.
    pub fn backend(&self, choice: BackendChoice) -> Result<&dyn DistanceBackend, BackendError> {
        let backend: &dyn DistanceBackend = match (choice, self.probe) {
            (BackendChoice::Reference, _)
            | (BackendChoice::Auto, BackendProbe::Unavailable(_)) => &self.reference,
            (_, BackendProbe::Available(client)) => &**client,
            (BackendChoice::Worker, BackendProbe::Unavailable(reason)) => {
                return Err(BackendError::Worker(format!("unavailable: {reason}")));
            }
        };
        debug!(backend = backend.id(), %choice, "backend selected");
        Ok(backend)
    }

    /// Distance via the configured backend.
    pub fn distance(&self, x: &[u8], y: &[u8], cfg: &NcdConfig) -> Result<f64, BackendError> {
        cfg.validate()?;
        let result = self.backend(cfg.backend)?.distance(x, y, cfg);
        self.or_reference(result, cfg, |r| r.distance(x, y, cfg))
    }

    /// Matrix via the configured backend.
    pub fn matrix(
        &self,
        a: &[&[u8]],
        b: &[&[u8]],
        cfg: &NcdConfig,
    ) -> Result<Vec<Vec<f64>>, BackendError> {
        cfg.validate()?;
        let result = self.backend(cfg.backend)?.matrix(a, b, cfg);
        self.or_reference(result, cfg, |r| r.matrix(a, b, cfg))
    }

    /// Matrix via the configured backend, reporting progress to `on_cell`.
    pub fn matrix_with_progress(
        &self,
        a: &[&[u8]],
        b: &[&[u8]],
        cfg: &NcdConfig,
        on_cell: &mut dyn FnMut(MatrixProgress),
    ) -> Result<Vec<Vec<f64>>, BackendError> {
        cfg.validate()?;
        let result = self
            .backend(cfg.backend)?
            .matrix_with_progress(a, b, cfg, &mut *on_cell);
        self.or_reference(result, cfg, |r| r.matrix_with_progress(a, b, cfg, on_cell))
    }

    /// Retries on the reference engine when `Auto` routed an oversized
    /// request to the worker.
    fn or_reference<T>(
        &self,
        result: Result<T, BackendError>,
        cfg: &NcdConfig,
        retry: impl FnOnce(&ReferenceBackend) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        match result {
            Err(BackendError::RequestTooLarge { len, max })
                if cfg.backend == BackendChoice::Auto =>
            {
                info!(len, max, "request exceeds worker frame limit, using reference");
                retry(&self.reference)
            }
            other => other,
        }
    }
}

impl Selector<'static> {
    /// Selector over the process-wide probe.
    #[must_use]
    pub fn global() -> Self {
        Self::new(global_probe())
    }
}

/// Distance using the process-wide selector.
pub fn distance_auto(x: &[u8], y: &[u8], cfg: &NcdConfig) -> Result<f64, BackendError> {
    Selector::global().distance(x, y, cfg)
}

/// Matrix using the process-wide selector.
pub fn matrix_auto(
    a: &[&[u8]],
    b: &[&[u8]],
    cfg: &NcdConfig,
) -> Result<Vec<Vec<f64>>, BackendError> {
    Selector::global().matrix(a, b, cfg)
}
