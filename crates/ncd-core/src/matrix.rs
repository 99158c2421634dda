//! Pairwise distance matrices between two ordered collections.
//!
//! Singleton sizes are taken from one [`SizeCache`] per call, so each
//! distinct input is compressed once no matter how many rows or columns it
//! appears in. Only the joint terms are computed per cell. NCD is not a
//! metric, so every requested cell is computed; there is no pruning.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compressor::{CompressionError, Compressor};
use crate::distance::{NcdOptions, distance_from_sizes};
use crate::size_cache::SizeCache;

/// Labelled input sequence.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InputItem {
    /// Row or column label.
    pub label: String,
    /// Raw content.
    pub bytes: Vec<u8>,
}

impl InputItem {
    /// Creates an item.
    #[must_use]
    pub fn new(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }
}

impl AsRef<[u8]> for InputItem {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Labelled distance grid. `values[i][j]` is `rows[i]` against `cols[j]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    /// Row labels.
    pub rows: Vec<String>,
    /// Column labels.
    pub cols: Vec<String>,
    /// Row-major values.
    pub values: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    /// Value at row `i`, column `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get(i).and_then(|row| row.get(j)).copied()
    }
}

/// Progress report emitted after each cell by [`matrix_with_progress`].
#[derive(Clone, Copy, Debug)]
pub struct MatrixProgress {
    /// Cells completed so far.
    pub done: usize,
    /// Cells in the whole grid.
    pub total: usize,
    /// Combined input length of the cell, a rough work proxy.
    pub input_bytes: u64,
    /// Wall time spent on the cell.
    pub wall: Duration,
}

/// Labelled matrix of `a` against `b`.
pub fn matrix<C: Compressor + ?Sized>(
    c: &C,
    a: &[InputItem],
    b: &[InputItem],
    opts: NcdOptions,
) -> Result<DistanceMatrix, CompressionError> {
    let values = matrix_values(c, a, b, opts)?;
    Ok(labelled(a, b, values))
}

/// Labelled matrix of `items` against itself.
pub fn square<C: Compressor + ?Sized>(
    c: &C,
    items: &[InputItem],
    opts: NcdOptions,
) -> Result<DistanceMatrix, CompressionError> {
    matrix(c, items, items, opts)
}

/// Parallel counterpart of [`matrix`].
pub fn par_matrix<C: Compressor + ?Sized>(
    c: &C,
    a: &[InputItem],
    b: &[InputItem],
    opts: NcdOptions,
) -> Result<DistanceMatrix, CompressionError> {
    let values = par_matrix_values(c, a, b, opts)?;
    Ok(labelled(a, b, values))
}

/// `a.len()` × `b.len()` grid of distances.
pub fn matrix_values<C, A, B>(
    c: &C,
    a: &[A],
    b: &[B],
    opts: NcdOptions,
) -> Result<Vec<Vec<f64>>, CompressionError>
where
    C: Compressor + ?Sized,
    A: AsRef<[u8]>,
    B: AsRef<[u8]>,
{
    matrix_with_progress(c, a, b, opts, |_| {})
}

/// [`matrix_values`] with a callback after every cell.
pub fn matrix_with_progress<C, A, B, F>(
    c: &C,
    a: &[A],
    b: &[B],
    opts: NcdOptions,
    mut on_cell: F,
) -> Result<Vec<Vec<f64>>, CompressionError>
where
    C: Compressor + ?Sized,
    A: AsRef<[u8]>,
    B: AsRef<[u8]>,
    F: FnMut(MatrixProgress),
{
    let cache = SizeCache::new(c);
    let a_sizes = a
        .iter()
        .map(|x| cache.size_of(x.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let b_sizes = b
        .iter()
        .map(|y| cache.size_of(y.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        rows = a.len(),
        cols = b.len(),
        distinct = cache.len(),
        "singleton sizes ready"
    );

    let total = a.len().saturating_mul(b.len());
    let mut done = 0_usize;
    let mut out = Vec::with_capacity(a.len());
    for (x, &cx) in a.iter().zip(&a_sizes) {
        let x = x.as_ref();
        let mut row = Vec::with_capacity(b.len());
        for (y, &cy) in b.iter().zip(&b_sizes) {
            let y = y.as_ref();
            let started = Instant::now();
            row.push(distance_from_sizes(c, x, y, cx, cy, opts)?);
            done = done.saturating_add(1);
            on_cell(MatrixProgress {
                done,
                total,
                input_bytes: u64::try_from(x.len() + y.len()).unwrap_or(u64::MAX),
                wall: started.elapsed(),
            });
        }
        out.push(row);
    }
    Ok(out)
}

/// Parallel counterpart of [`matrix_values`].
///
/// Singletons and cells are spread over the rayon pool; the result is
/// identical to the sequential engine.
pub fn par_matrix_values<C, A, B>(
    c: &C,
    a: &[A],
    b: &[B],
    opts: NcdOptions,
) -> Result<Vec<Vec<f64>>, CompressionError>
where
    C: Compressor + ?Sized,
    A: AsRef<[u8]> + Sync,
    B: AsRef<[u8]> + Sync,
{
    let cache = SizeCache::new(c);
    let a_sizes = a
        .par_iter()
        .map(|x| cache.size_of(x.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let b_sizes = b
        .par_iter()
        .map(|y| cache.size_of(y.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        rows = a.len(),
        cols = b.len(),
        distinct = cache.len(),
        "singleton sizes ready (parallel)"
    );

    let cols = b.len();
    if cols == 0 {
        return Ok(vec![Vec::new(); a.len()]);
    }
    let cells = (0..a.len() * cols)
        .into_par_iter()
        .map(|k| {
            let (i, j) = (k / cols, k % cols);
            distance_from_sizes(
                c,
                a[i].as_ref(),
                b[j].as_ref(),
                a_sizes[i],
                b_sizes[j],
                opts,
            )
        })
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(cells.chunks(cols).map(<[f64]>::to_vec).collect())
}

fn labelled(a: &[InputItem], b: &[InputItem], values: Vec<Vec<f64>>) -> DistanceMatrix {
    DistanceMatrix {
        rows: a.iter().map(|item| item.label.clone()).collect(),
        cols: b.iter().map(|item| item.label.clone()).collect(),
        values,
    }
}
