//! Delimited text rendering of distance matrices.

use clap::ValueEnum;
use ncd_core::DistanceMatrix;

/// Output delimiter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Tab separated.
    #[default]
    Tsv,
    /// Comma separated.
    Csv,
}

impl OutputFormat {
    fn separator(self) -> char {
        match self {
            Self::Tsv => '\t',
            Self::Csv => ',',
        }
    }
}

/// Renders `m`. With `labels` the first line is an empty cell followed by the
/// column labels and every row starts with its label.
#[must_use]
pub fn format_matrix(m: &DistanceMatrix, format: OutputFormat, labels: bool) -> String {
    let sep = format.separator();
    let mut out = String::new();

    if labels {
        out.push(sep);
        out.push_str(&m.cols.join(&sep.to_string()));
        out.push('\n');
    }

    for (i, row) in m.values.iter().enumerate() {
        if labels {
            out.push_str(m.rows.get(i).map_or("", String::as_str));
        }
        for (j, v) in row.iter().enumerate() {
            if labels || j > 0 {
                out.push(sep);
            }
            out.push_str(&v.to_string());
        }
        out.push('\n');
    }
    out
}
