//! Normalized Compression Distance.
//!
//! ```text
//! NCD(x, y) = (C(join(x, y)) − min(C(x), C(y))) / max(C(x), C(y))
//! ```
//!
//! where `C(·)` is the compressed size and `join` is the frame64 join from
//! [`crate::frame`]. With [`Symmetry::Min`] the joint term is
//! `min(C(join(x, y)), C(join(y, x)))`, so the result does not depend on
//! argument order even when the compressor's adaptive model does.
//!
//! The value is not clamped by default: a real compressor can push it a
//! little above `1.0`.

use serde::{Deserialize, Serialize};

use crate::compressor::{CompressionError, Compressor};
use crate::frame::{Join, join_with};

/// How the joint term is made order independent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symmetry {
    /// Only `C(join(x, y))`. One joint compression per pair.
    None,
    /// `min(C(join(x, y)), C(join(y, x)))`.
    #[default]
    Min,
}

/// Distance computation options.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct NcdOptions {
    /// Join strategy for the joint term.
    #[serde(default)]
    pub join: Join,
    /// Symmetrization policy.
    #[serde(default)]
    pub symmetry: Symmetry,
    /// Clamp the result into `[0, 1]`.
    #[serde(default)]
    pub clamp_unit: bool,
}

/// Sizes behind one distance value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceReport {
    /// Final distance.
    pub value: f64,
    /// `C(x)`.
    pub cx: usize,
    /// `C(y)`.
    pub cy: usize,
    /// `C(join(x, y))`, absent for an empty pair or zero-size singletons.
    pub cxy: Option<usize>,
    /// `C(join(y, x))`, present only under [`Symmetry::Min`].
    pub cyx: Option<usize>,
}

/// NCD of `x` and `y` with default options.
pub fn distance<C: Compressor + ?Sized>(
    c: &C,
    x: &[u8],
    y: &[u8],
) -> Result<f64, CompressionError> {
    distance_with(c, x, y, NcdOptions::default())
}

/// NCD of `x` and `y`.
pub fn distance_with<C: Compressor + ?Sized>(
    c: &C,
    x: &[u8],
    y: &[u8],
    opts: NcdOptions,
) -> Result<f64, CompressionError> {
    distance_detailed(c, x, y, opts).map(|report| report.value)
}

/// NCD of `x` and `y` along with the compressed sizes used.
pub fn distance_detailed<C: Compressor + ?Sized>(
    c: &C,
    x: &[u8],
    y: &[u8],
    opts: NcdOptions,
) -> Result<DistanceReport, CompressionError> {
    let cx = c.compressed_len(x)?;
    let cy = c.compressed_len(y)?;
    report_from_sizes(c, x, y, cx, cy, opts)
}

/// NCD when `C(x)` and `C(y)` are already known.
///
/// Returns the same value as [`distance_with`] when `cx == C(x)` and
/// `cy == C(y)`; only the joint term is compressed here.
pub fn distance_from_sizes<C: Compressor + ?Sized>(
    c: &C,
    x: &[u8],
    y: &[u8],
    cx: usize,
    cy: usize,
    opts: NcdOptions,
) -> Result<f64, CompressionError> {
    report_from_sizes(c, x, y, cx, cy, opts).map(|report| report.value)
}

fn report_from_sizes<C: Compressor + ?Sized>(
    c: &C,
    x: &[u8],
    y: &[u8],
    cx: usize,
    cy: usize,
    opts: NcdOptions,
) -> Result<DistanceReport, CompressionError> {
    let mut report = DistanceReport {
        value: 0.0,
        cx,
        cy,
        cxy: None,
        cyx: None,
    };
    // Container overhead would otherwise make an empty pair non-zero.
    if cx.max(cy) == 0 || (x.is_empty() && y.is_empty()) {
        return Ok(report);
    }

    let cxy = c.compressed_len(&join_with(x, y, opts.join))?;
    report.cxy = Some(cxy);
    let ccat = match opts.symmetry {
        Symmetry::None => cxy,
        Symmetry::Min => {
            let cyx = c.compressed_len(&join_with(y, x, opts.join))?;
            report.cyx = Some(cyx);
            cxy.min(cyx)
        }
    };
    report.value = ncd_value(cx, cy, ccat, opts.clamp_unit);
    Ok(report)
}

/// Applies the NCD formula to already computed sizes.
///
/// Non-finite results collapse to `0.0`.
#[must_use]
pub fn ncd_value(cx: usize, cy: usize, ccat: usize, clamp_unit: bool) -> f64 {
    let min_c = cx.min(cy) as f64;
    let max_c = cx.max(cy) as f64;
    if max_c == 0.0 {
        return 0.0;
    }
    let d = (ccat as f64 - min_c) / max_c;
    if !d.is_finite() {
        return 0.0;
    }
    if clamp_unit { d.clamp(0.0, 1.0) } else { d }
}
