//! Process-wide backend selection. Kept in its own test binary so the
//! process-wide backend is resolved exactly once, with `NCD_WORKER` pointing
//! at the freshly built worker.

use ncd_core::{
    BackendChoice, DistanceBackend, NcdConfig, ReferenceBackend, WorkerConfig, distance_auto,
    global_probe, init_global_probe, matrix_auto,
};

#[test]
fn process_wide_backend_is_resolved_once_and_serves_auto_calls() {
    // SAFETY: this binary has a single test, so no other thread reads the
    // environment concurrently.
    unsafe {
        std::env::set_var("NCD_WORKER", env!("CARGO_BIN_EXE_ncd-worker"));
    }

    let first = global_probe();
    assert!(first.is_available(), "worker from NCD_WORKER must start");
    assert!(std::ptr::eq(first, global_probe()));

    // A later init with another config returns the cached outcome.
    let other = WorkerConfig {
        command: "ncd-worker-definitely-not-installed".to_owned(),
        ..WorkerConfig::default()
    };
    let again = init_global_probe(&other);
    assert!(std::ptr::eq(first, again));
    assert!(again.is_available());

    let x = b"the quick brown fox jumps over the lazy dog ".repeat(20);
    let y = b"pack my box with five dozen liquor jugs ".repeat(20);
    let cfg = NcdConfig::default();
    assert_eq!(cfg.backend, BackendChoice::Auto);

    let d_auto = distance_auto(&x, &y, &cfg).expect("auto distance");
    let d_reference = ReferenceBackend
        .distance(&x, &y, &cfg)
        .expect("reference distance");
    assert!((d_auto - d_reference).abs() < 1e-12);

    let rows = [x.as_slice(), y.as_slice()];
    let cols = [y.as_slice(), &b""[..]];
    let m_auto = matrix_auto(&rows, &cols, &cfg).expect("auto matrix");
    let m_reference = ReferenceBackend
        .matrix(&rows, &cols, &cfg)
        .expect("reference matrix");
    assert_eq!(m_auto.len(), 2);
    for (a_row, r_row) in m_auto.iter().zip(&m_reference) {
        for (a, r) in a_row.iter().zip(r_row) {
            assert!((a - r).abs() < 1e-12, "auto={a} reference={r}");
        }
    }

    // Only the worker honors a header timestamp.
    let stamped = NcdConfig {
        fixed_timestamp: 42,
        ..NcdConfig::default()
    };
    assert!(distance_auto(&x, &y, &stamped).is_ok());
}
