//! Matrix progress lines with a remaining-time estimate.

use std::io::Write;
use std::time::Duration;

use ncd_core::MatrixProgress;

/// Sample counts at which the time model is refit.
const REFIT_AT: [usize; 3] = [6, 15, 16];

/// Progress lines printed over a whole grid.
const LINES_PER_GRID: usize = 20;

/// Timing of one finished cell.
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    /// Combined input length of the cell.
    pub input_bytes: u64,
    /// Wall time the cell took.
    pub wall: Duration,
}

impl From<MatrixProgress> for Sample {
    fn from(p: MatrixProgress) -> Self {
        Self {
            input_bytes: p.input_bytes,
            wall: p.wall,
        }
    }
}

/// `seconds ≈ intercept + slope * input_bytes`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    /// Fixed cost per cell, in seconds.
    pub intercept: f64,
    /// Cost per input byte, in seconds.
    pub slope: f64,
}

impl LinearFit {
    fn seconds(self, input_bytes: u64) -> f64 {
        (self.intercept + self.slope * input_bytes as f64).max(0.0)
    }
}

/// Least-squares cell time model fed with finished cells.
#[derive(Clone, Debug, Default)]
pub struct EtaEstimator {
    samples: Vec<Sample>,
    fit: Option<LinearFit>,
}

impl EtaEstimator {
    /// Records a sample. Empty cells and zero timings carry no signal and are
    /// dropped.
    pub fn add(&mut self, sample: Sample) {
        if sample.input_bytes == 0 || sample.wall.is_zero() {
            return;
        }
        self.samples.push(sample);
    }

    /// Samples kept so far.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// True when the sample count has just reached a refit point.
    #[must_use]
    pub fn should_refit(&self) -> bool {
        REFIT_AT.contains(&self.samples.len())
    }

    /// Current model, if fitted.
    #[must_use]
    pub fn fit(&self) -> Option<LinearFit> {
        self.fit
    }

    /// Fits the model to the first `n` samples. Needs at least two.
    pub fn refit_first_n(&mut self, n: usize) {
        let used = &self.samples[..n.min(self.samples.len())];
        if used.len() < 2 {
            self.fit = None;
            return;
        }
        let count = used.len() as f64;
        let x_mean = used.iter().map(|s| s.input_bytes as f64).sum::<f64>() / count;
        let y_mean = used.iter().map(|s| s.wall.as_secs_f64()).sum::<f64>() / count;
        let (sxx, sxy) = used.iter().fold((0.0, 0.0), |(sxx, sxy), s| {
            let dx = s.input_bytes as f64 - x_mean;
            let dy = s.wall.as_secs_f64() - y_mean;
            (sxx + dx * dx, sxy + dx * dy)
        });
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        self.fit = Some(LinearFit {
            intercept: y_mean - slope * x_mean,
            slope,
        });
    }

    /// Predicted time for one cell.
    #[must_use]
    pub fn predict(&self, input_bytes: u64) -> Option<Duration> {
        if input_bytes == 0 {
            return None;
        }
        let fit = self.fit?;
        Some(Duration::from_secs_f64(fit.seconds(input_bytes)))
    }

    /// Predicted time for the given remaining cells. `None` without a model
    /// or without any non-empty cell.
    #[must_use]
    pub fn estimate_remaining(&self, remaining: impl IntoIterator<Item = u64>) -> Option<Duration> {
        let fit = self.fit?;
        let mut total = 0.0;
        let mut any = false;
        for bytes in remaining.into_iter().filter(|&b| b > 0) {
            any = true;
            total += fit.seconds(bytes);
        }
        any.then(|| Duration::from_secs_f64(total))
    }
}

/// Writes `done/total cells[, eta ..]` lines while a grid is computed.
pub struct ProgressReporter<W: Write> {
    row_bytes: Vec<u64>,
    col_bytes: Vec<u64>,
    step: usize,
    eta: EtaEstimator,
    out: W,
}

impl<W: Write> ProgressReporter<W> {
    /// Reporter for a grid with the given row and column input lengths.
    pub fn new(row_bytes: Vec<u64>, col_bytes: Vec<u64>, out: W) -> Self {
        let total = row_bytes.len().saturating_mul(col_bytes.len());
        Self {
            row_bytes,
            col_bytes,
            step: (total / LINES_PER_GRID).max(1),
            eta: EtaEstimator::default(),
            out,
        }
    }

    /// Feeds one finished cell (or one whole-grid report).
    pub fn on_cell(&mut self, p: MatrixProgress) {
        self.eta.add(Sample::from(p));
        if self.eta.should_refit() {
            self.eta.refit_first_n(self.eta.sample_count());
        }
        if p.done % self.step != 0 && p.done != p.total {
            return;
        }
        let line = match self.remaining(p.done) {
            Some(eta) if p.done < p.total => {
                format!("{}/{} cells, eta {}", p.done, p.total, format_eta(eta))
            }
            _ => format!("{}/{} cells", p.done, p.total),
        };
        // Progress output is advisory.
        let _ = writeln!(self.out, "{line}");
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn remaining(&self, done: usize) -> Option<Duration> {
        let cols = self.col_bytes.len();
        if cols == 0 {
            return None;
        }
        let total = self.row_bytes.len() * cols;
        self.eta.estimate_remaining(
            (done..total).map(|k| self.row_bytes[k / cols].saturating_add(self.col_bytes[k % cols])),
        )
    }
}

fn format_eta(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let whole = d.as_secs();
        format!("{}m{:02}s", whole / 60, whole % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(input_bytes: u64, millis: u64) -> Sample {
        Sample {
            input_bytes,
            wall: Duration::from_millis(millis),
        }
    }

    #[test]
    fn empty_and_instant_samples_are_dropped() {
        let mut eta = EtaEstimator::default();
        eta.add(sample(0, 5));
        eta.add(sample(10, 0));
        eta.add(sample(10, 5));
        assert_eq!(eta.sample_count(), 1);
    }

    #[test]
    fn linear_timings_are_recovered() {
        let mut eta = EtaEstimator::default();
        for bytes in 1..=6 {
            // 2 ms fixed plus 1 ms per 100 bytes.
            eta.add(sample(bytes * 100, 2 + bytes));
        }
        assert!(eta.should_refit());
        eta.refit_first_n(eta.sample_count());
        let fit = eta.fit().expect("fit");
        assert!((fit.intercept - 0.002).abs() < 1e-9, "{fit:?}");
        assert!((fit.slope - 0.00001).abs() < 1e-12, "{fit:?}");

        let predicted = eta.predict(1000).expect("prediction");
        assert!((predicted.as_secs_f64() - 0.012).abs() < 1e-6);

        let remaining = eta.estimate_remaining([100, 0, 200]).expect("remaining");
        assert!((remaining.as_secs_f64() - 0.007).abs() < 1e-6);
    }

    #[test]
    fn uniform_inputs_fit_a_constant() {
        let mut eta = EtaEstimator::default();
        for _ in 0..4 {
            eta.add(sample(50, 3));
        }
        eta.refit_first_n(4);
        assert_eq!(eta.fit().map(|f| f.slope), Some(0.0));
        let remaining = eta.estimate_remaining([50; 10]).expect("remaining");
        assert!((remaining.as_secs_f64() - 0.030).abs() < 1e-9);
    }

    #[test]
    fn no_estimate_before_two_samples() {
        let mut eta = EtaEstimator::default();
        eta.add(sample(10, 1));
        eta.refit_first_n(1);
        assert!(eta.fit().is_none());
        assert!(eta.predict(10).is_none());
        assert!(eta.estimate_remaining([10]).is_none());
    }

    #[test]
    fn reporter_writes_twenty_lines_and_a_final_count() {
        let rows = vec![10; 8];
        let cols = vec![20; 5];
        let mut reporter = ProgressReporter::new(rows, cols, Vec::new());
        for done in 1..=40 {
            reporter.on_cell(MatrixProgress {
                done,
                total: 40,
                input_bytes: 30,
                wall: Duration::from_millis(1),
            });
        }
        let text = String::from_utf8(reporter.into_inner()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 20);
        assert_eq!(lines[0], "2/40 cells");
        assert!(lines[2].starts_with("6/40 cells, eta "), "{}", lines[2]);
        assert_eq!(lines[19], "40/40 cells");
    }

    #[test]
    fn eta_formats_minutes() {
        assert_eq!(format_eta(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_eta(Duration::from_secs(125)), "2m05s");
    }
}
