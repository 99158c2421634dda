//! Command execution shared by the `ncd` binary and its tests.

use std::path::{Path, PathBuf};

use ncd_core::{
    BackendChoice, BackendError, BackendProbe, CompressorKind, DistanceMatrix, InputItem,
    NcdConfig, Selector, WorkerConfig, init_global_probe,
};
use thiserror::Error;
use tracing::debug;

use crate::progress::ProgressReporter;

use crate::config::{CliConfig, ConfigError, write_example_config};
use crate::format::{OutputFormat, format_matrix};
use crate::inputs::{InputError, detect_set_spec, load_set};

/// Config file read when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "ncd.toml";

/// Top-level CLI errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Inputs could not be read.
    #[error(transparent)]
    Input(#[from] InputError),
    /// Distance computation failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Writing the example config failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Flags that override the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// Explicit config file.
    pub config: Option<PathBuf>,
    /// Compressor id.
    pub compressor: Option<CompressorKind>,
    /// Compression level.
    pub level: Option<u32>,
    /// Gzip header timestamp.
    pub fixed_timestamp: Option<u32>,
    /// Brotli window exponent.
    pub brotli_window: Option<u32>,
    /// Backend choice.
    pub backend: Option<BackendChoice>,
    /// Worker binary.
    pub worker: Option<String>,
}

/// Fully resolved settings for one invocation.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Distance configuration.
    pub ncd: NcdConfig,
    /// Worker process configuration.
    pub worker: WorkerConfig,
}

impl Settings {
    /// Loads the config file (if any) and applies `overrides`.
    pub fn resolve(overrides: &Overrides) -> Result<Self, AppError> {
        let file = match &overrides.config {
            Some(path) => CliConfig::from_toml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
                CliConfig::from_toml_file(DEFAULT_CONFIG_PATH)?
            }
            None => CliConfig::default(),
        };
        Ok(Self::from_parts(&file, overrides))
    }

    /// Applies `overrides` on top of an already loaded config.
    #[must_use]
    pub fn from_parts(file: &CliConfig, overrides: &Overrides) -> Self {
        let mut ncd = file.ncd;
        if let Some(kind) = overrides.compressor {
            ncd.compressor = kind;
        }
        if let Some(level) = overrides.level {
            ncd.compression_level = level;
        }
        if let Some(ts) = overrides.fixed_timestamp {
            ncd.fixed_timestamp = ts;
        }
        if let Some(window) = overrides.brotli_window {
            ncd.brotli_window = window;
        }
        if let Some(backend) = overrides.backend {
            ncd.backend = backend;
        }
        Self {
            ncd,
            worker: file.worker_config(overrides.worker.as_deref()),
        }
    }

    fn probe(&self) -> ProbeRef {
        // Reference runs never touch the worker.
        if self.ncd.backend == BackendChoice::Reference {
            ProbeRef::Owned(BackendProbe::Unavailable("not probed".to_owned()))
        } else {
            ProbeRef::Global(init_global_probe(&self.worker))
        }
    }
}

enum ProbeRef {
    Global(&'static BackendProbe),
    Owned(BackendProbe),
}

impl ProbeRef {
    fn get(&self) -> &BackendProbe {
        match self {
            Self::Global(probe) => *probe,
            Self::Owned(probe) => probe,
        }
    }
}

/// `ncd matrix` arguments.
#[derive(Clone, Debug, Default)]
pub struct MatrixArgs {
    /// Row set.
    pub set_a: String,
    /// Column set; defaults to the row set.
    pub set_b: Option<String>,
    /// Compare the row set against itself.
    pub square: bool,
    /// Treat set arguments as list files.
    pub list: bool,
    /// Delimiter.
    pub format: OutputFormat,
    /// Omit labels.
    pub no_labels: bool,
    /// Print progress lines to stderr.
    pub progress: bool,
}

/// Distance between two files.
pub fn run_pair(settings: &Settings, file_a: &Path, file_b: &Path) -> Result<f64, AppError> {
    let a = read(file_a)?;
    let b = read(file_b)?;
    let probe = settings.probe();
    let d = Selector::new(probe.get()).distance(&a, &b, &settings.ncd)?;
    Ok(d)
}

/// Labelled matrix between two sets.
pub fn compute_matrix(settings: &Settings, args: &MatrixArgs) -> Result<DistanceMatrix, AppError> {
    let spec_a = detect_set_spec(&args.set_a, args.list);
    let spec_b = match (&args.set_b, args.square) {
        (Some(set_b), false) => detect_set_spec(set_b, args.list),
        _ => spec_a.clone(),
    };
    let a = load_set(&spec_a)?;
    let b = load_set(&spec_b)?;
    debug!(rows = a.len(), cols = b.len(), "sets loaded");

    let rows = bytes_of(&a);
    let cols = bytes_of(&b);
    let probe = settings.probe();
    let selector = Selector::new(probe.get());
    let values = if args.progress {
        let mut reporter =
            ProgressReporter::new(lengths(&rows), lengths(&cols), std::io::stderr().lock());
        selector.matrix_with_progress(&rows, &cols, &settings.ncd, &mut |p| {
            reporter.on_cell(p);
        })?
    } else {
        selector.matrix(&rows, &cols, &settings.ncd)?
    };
    Ok(DistanceMatrix {
        rows: labels_of(&a),
        cols: labels_of(&b),
        values,
    })
}

/// Rendered matrix output.
pub fn run_matrix(settings: &Settings, args: &MatrixArgs) -> Result<String, AppError> {
    let m = compute_matrix(settings, args)?;
    Ok(format_matrix(&m, args.format, !args.no_labels))
}

/// Writes the example config to `path`.
pub fn init_config(path: &Path, force: bool) -> Result<(), AppError> {
    write_example_config(path, force).map_err(|source| AppError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<Vec<u8>, AppError> {
    std::fs::read(path).map_err(|source| {
        AppError::Input(InputError::Read {
            path: path.to_path_buf(),
            source,
        })
    })
}

fn bytes_of(items: &[InputItem]) -> Vec<&[u8]> {
    items.iter().map(|item| item.bytes.as_slice()).collect()
}

fn lengths(set: &[&[u8]]) -> Vec<u64> {
    set.iter()
        .map(|x| u64::try_from(x.len()).unwrap_or(u64::MAX))
        .collect()
}

fn labels_of(items: &[InputItem]) -> Vec<String> {
    items.iter().map(|item| item.label.clone()).collect()
}
