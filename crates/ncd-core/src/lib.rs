//! Normalized Compression Distance between byte sequences and collections.
//!
//! The crate is layered leaf-first: [`frame`] joins two inputs, [`compressor`]
//! measures compressed sizes, [`distance`] applies the NCD formula,
//! [`size_cache`] memoizes singleton sizes, and [`matrix`] builds full grids.
//! [`backend`] routes calls to the isolated `ncd-worker` process when one is
//! available and to the in-process engine otherwise.

pub mod backend;
pub mod compressor;
pub mod config;
pub mod distance;
pub mod frame;
pub mod matrix;
pub mod size_cache;
pub mod worker_client;
pub mod worker_ipc;

pub use backend::{
    BackendError, BackendProbe, DistanceBackend, ReferenceBackend, Selector, distance_auto,
    global_probe, init_global_probe, matrix_auto,
};
pub use compressor::{
    Brotli, CompressionError, Compressor, CompressorKind, CompressorSpec, Deflate, Gzip, Lz4, Xz,
    Zlib, Zstd, compressor_ids, parse_compressor,
};
pub use config::{BackendChoice, NcdConfig};
pub use distance::{
    DistanceReport, NcdOptions, Symmetry, distance, distance_detailed, distance_from_sizes,
    distance_with,
};
pub use frame::{Join, frame64, join};
pub use matrix::{
    DistanceMatrix, InputItem, MatrixProgress, matrix, matrix_values, matrix_with_progress,
    par_matrix, par_matrix_values, square,
};
pub use size_cache::{CacheStats, ContentKey, SizeCache, sha256_key};
pub use worker_client::{WorkerClient, WorkerConfig, WorkerInitError};
