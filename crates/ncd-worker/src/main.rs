//! Isolated NCD backend process.
//!
//! Speaks length-prefixed JSON frames on stdin/stdout and logs to stderr.

use std::borrow::Cow;
use std::io::{BufReader, BufWriter};

use ncd_core::worker_ipc::{
    DEFAULT_MAX_FRAME_BYTES, IpcError, WorkerOptions, WorkerRequest, WorkerResponse, read_frame,
    write_frame,
};
use ncd_core::{CompressionError, distance_with, par_matrix_values};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const THREADS_ENV: &str = "NCD_WORKER_THREADS";
const MAX_FRAME_ENV: &str = "NCD_WORKER_MAX_FRAME_BYTES";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(threads) = resolve_usize(&args, "--threads", THREADS_ENV) {
        if let Err(err) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            warn!(threads, error = %err, "failed to size worker thread pool");
        }
    }
    let max_frame_bytes = resolve_usize(&args, "--max-frame-bytes", MAX_FRAME_ENV)
        .unwrap_or(DEFAULT_MAX_FRAME_BYTES);
    info!(
        threads = rayon::current_num_threads(),
        max_frame_bytes, "ncd-worker started"
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = BufWriter::new(stdout.lock());

    loop {
        let req = match read_frame::<WorkerRequest<'static>>(&mut reader, max_frame_bytes) {
            Ok(req) => req,
            Err(IpcError::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => {
                warn!(error = %err, "rejecting invalid request");
                let _ = write_frame(
                    &mut writer,
                    &WorkerResponse::Error {
                        message: format!("invalid request: {err}"),
                    },
                );
                break;
            }
        };

        let resp = handle_request(req);
        if write_frame(&mut writer, &resp).is_err() {
            break;
        }
    }
    debug!("ncd-worker exiting");
}

/// Positive value of `flag` (`--flag N` or `--flag=N`, last one wins), else
/// of the `env` variable.
fn resolve_usize(args: &[String], flag: &str, env: &str) -> Option<usize> {
    let mut from_args: Option<&str> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            from_args = Some(value);
        } else if arg == flag {
            from_args = iter.next().map(String::as_str);
        }
    }

    from_args
        .map(str::to_owned)
        .or_else(|| std::env::var(env).ok())
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}

fn handle_request(req: WorkerRequest<'_>) -> WorkerResponse {
    let result = match req {
        WorkerRequest::Health => return WorkerResponse::Health { ok: true },
        WorkerRequest::Distance {
            left,
            right,
            options,
        } => distance(&left, &right, options).map(|value| WorkerResponse::Distance { value }),
        WorkerRequest::Matrix {
            rows,
            cols,
            options,
        } => matrix(&rows, &cols, options).map(|values| WorkerResponse::Matrix { values }),
    };
    result.unwrap_or_else(|err| WorkerResponse::Error {
        message: err.to_string(),
    })
}

fn distance(left: &[u8], right: &[u8], options: WorkerOptions) -> Result<f64, CompressionError> {
    let c = options.compressor_spec().build()?;
    distance_with(&*c, left, right, options.ncd_options())
}

fn matrix(
    rows: &[Cow<'_, [u8]>],
    cols: &[Cow<'_, [u8]>],
    options: WorkerOptions,
) -> Result<Vec<Vec<f64>>, CompressionError> {
    let c = options.compressor_spec().build()?;
    debug!(rows = rows.len(), cols = cols.len(), compressor = %c.name(), "matrix request");
    par_matrix_values(&*c, rows, cols, options.ncd_options())
}

#[cfg(test)]
mod tests {
    use ncd_core::{CompressorKind, Symmetry};

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    fn threads(list: &[&str]) -> Option<usize> {
        resolve_usize(&args(list), "--threads", "NCD_WORKER_TEST_UNSET_THREADS")
    }

    fn options(level: u32) -> WorkerOptions {
        WorkerOptions {
            compressor: CompressorKind::Gzip,
            level,
            mtime: 0,
            window: 22,
            symmetry: Symmetry::Min,
            clamp_unit: false,
        }
    }

    #[test]
    fn threads_flag_forms_are_parsed() {
        assert_eq!(threads(&["--threads", "3"]), Some(3));
        assert_eq!(threads(&["--threads=5"]), Some(5));
        assert_eq!(threads(&["--threads=0"]), None);
        assert_eq!(threads(&["--threads=many"]), None);
        assert_eq!(threads(&["--threads"]), None);
    }

    #[test]
    fn frame_bound_is_read_next_to_threads() {
        let list = args(&["--threads", "2", "--max-frame-bytes=4096"]);
        assert_eq!(
            resolve_usize(&list, "--max-frame-bytes", "NCD_WORKER_TEST_UNSET_FRAME"),
            Some(4096)
        );
        assert_eq!(
            resolve_usize(&list, "--threads", "NCD_WORKER_TEST_UNSET_THREADS"),
            Some(2)
        );
        let typo = args(&["--max-frame-bytesX=9"]);
        assert_eq!(
            resolve_usize(&typo, "--max-frame-bytes", "NCD_WORKER_TEST_UNSET_FRAME"),
            None
        );
    }

    #[test]
    fn health_is_always_ok() {
        assert!(matches!(
            handle_request(WorkerRequest::Health),
            WorkerResponse::Health { ok: true }
        ));
    }

    #[test]
    fn invalid_level_becomes_error_response() {
        let resp = handle_request(WorkerRequest::Distance {
            left: Cow::Borrowed(&b"a"[..]),
            right: Cow::Borrowed(&b"b"[..]),
            options: options(42),
        });
        match resp {
            WorkerResponse::Error { message } => assert!(message.contains("42")),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn empty_matrix_keeps_row_count() {
        let resp = handle_request(WorkerRequest::Matrix {
            rows: vec![Cow::Borrowed(&b"a"[..]), Cow::Borrowed(&b"b"[..])],
            cols: Vec::new(),
            options: options(6),
        });
        match resp {
            WorkerResponse::Matrix { values } => {
                assert_eq!(values.len(), 2);
                assert!(values.iter().all(Vec::is_empty));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
