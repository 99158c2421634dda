//! Recognized configuration options.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compressor::{CompressionError, CompressorKind, CompressorSpec, DEFAULT_BROTLI_WINDOW};
use crate::distance::{NcdOptions, Symmetry};
use crate::frame::Join;
use crate::worker_ipc::WorkerOptions;

/// Default compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Which backend executes the work.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendChoice {
    /// Worker when the probe found one, reference otherwise.
    #[default]
    Auto,
    /// Always the in-process reference engine.
    Reference,
    /// Always the worker; fails when it is unavailable.
    Worker,
}

impl Display for BackendChoice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Reference => "reference",
            Self::Worker => "worker",
        })
    }
}

impl FromStr for BackendChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "reference" | "ref" => Ok(Self::Reference),
            "worker" | "native" => Ok(Self::Worker),
            other => Err(format!("unknown backend `{other}` (auto|reference|worker)")),
        }
    }
}

/// Distance configuration, fixed for the duration of a call.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NcdConfig {
    /// Compressor family member.
    #[serde(default)]
    pub compressor: CompressorKind,
    /// Effort/ratio tradeoff. `0..=9` for the DEFLATE family and xz,
    /// `1..=22` for zstd, `0..=11` for brotli.
    #[serde(default = "default_level")]
    pub compression_level: u32,
    /// Brotli window exponent, `10..=24`.
    #[serde(default = "default_brotli_window")]
    pub brotli_window: u32,
    /// Timestamp forced into the gzip header. Only `0` is honored by the
    /// reference backend.
    #[serde(default)]
    pub fixed_timestamp: u32,
    /// Symmetrization policy.
    #[serde(default)]
    pub symmetry: Symmetry,
    /// Clamp results into `[0, 1]`.
    #[serde(default)]
    pub clamp_unit: bool,
    /// Backend selection.
    #[serde(default)]
    pub backend: BackendChoice,
}

impl Default for NcdConfig {
    fn default() -> Self {
        Self {
            compressor: CompressorKind::Gzip,
            compression_level: DEFAULT_LEVEL,
            brotli_window: DEFAULT_BROTLI_WINDOW,
            fixed_timestamp: 0,
            symmetry: Symmetry::Min,
            clamp_unit: false,
            backend: BackendChoice::Auto,
        }
    }
}

impl NcdConfig {
    /// Rejects out-of-range values.
    pub fn validate(&self) -> Result<(), CompressionError> {
        self.compressor_spec().validate()
    }

    /// Compressor configuration.
    #[must_use]
    pub fn compressor_spec(&self) -> CompressorSpec {
        CompressorSpec {
            kind: self.compressor,
            level: self.compression_level,
            mtime: self.fixed_timestamp,
            window: self.brotli_window,
        }
    }

    /// Distance options.
    #[must_use]
    pub fn ncd_options(&self) -> NcdOptions {
        NcdOptions {
            join: Join::Frame64,
            symmetry: self.symmetry,
            clamp_unit: self.clamp_unit,
        }
    }

    /// Options forwarded to the worker.
    #[must_use]
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            compressor: self.compressor,
            level: self.compression_level,
            mtime: self.fixed_timestamp,
            window: self.brotli_window,
            symmetry: self.symmetry,
            clamp_unit: self.clamp_unit,
        }
    }
}

fn default_level() -> u32 {
    DEFAULT_LEVEL
}

fn default_brotli_window() -> u32 {
    DEFAULT_BROTLI_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_gzip_mid_level_zero_timestamp() {
        let cfg = NcdConfig::default();
        assert_eq!(cfg.compressor, CompressorKind::Gzip);
        assert_eq!(cfg.compression_level, 6);
        assert_eq!(cfg.fixed_timestamp, 0);
        assert_eq!(cfg.symmetry, Symmetry::Min);
        assert_eq!(cfg.backend, BackendChoice::Auto);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: NcdConfig = serde_json::from_str(r#"{"compression_level": 9}"#).unwrap();
        assert_eq!(cfg.compression_level, 9);
        assert_eq!(cfg.compressor, CompressorKind::Gzip);

        let cfg: NcdConfig =
            serde_json::from_str(r#"{"backend": "reference", "symmetry": "none"}"#).unwrap();
        assert_eq!(cfg.backend, BackendChoice::Reference);
        assert_eq!(cfg.symmetry, Symmetry::None);
        assert_eq!(cfg.compression_level, DEFAULT_LEVEL);
    }

    #[test]
    fn validate_checks_level_against_the_codec() {
        let cfg = NcdConfig {
            compression_level: 12,
            ..NcdConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(CompressionError::InvalidLevel { level: 12, max: 9, .. })
        ));

        let zstd = NcdConfig {
            compressor: CompressorKind::Zstd,
            ..cfg
        };
        assert!(zstd.validate().is_ok());

        let brotli = NcdConfig {
            compressor: CompressorKind::Brotli,
            compression_level: 5,
            brotli_window: 8,
            ..NcdConfig::default()
        };
        assert!(matches!(
            brotli.validate(),
            Err(CompressionError::InvalidWindow(8))
        ));
    }

    #[test]
    fn backend_choice_parses_aliases() {
        assert_eq!("Worker".parse::<BackendChoice>(), Ok(BackendChoice::Worker));
        assert_eq!("ref".parse::<BackendChoice>(), Ok(BackendChoice::Reference));
        assert!("gpu".parse::<BackendChoice>().is_err());
    }
}
