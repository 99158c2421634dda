//! Compressor capability and the concrete codecs behind it.

use std::fmt::{Display, Formatter};
use std::io::Write;
use std::ops::RangeInclusive;
use std::str::FromStr;

use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest DEFLATE-family level.
pub const MAX_LEVEL: u32 = 9;

/// Default brotli window, as a power of two.
pub const DEFAULT_BROTLI_WINDOW: u32 = 22;

/// Accepted brotli window exponents.
pub const BROTLI_WINDOWS: RangeInclusive<u32> = 10..=24;

/// Compression failures.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// Encoder failed while writing or finishing the stream.
    #[error("encoder failure: {0}")]
    Io(#[from] std::io::Error),
    /// Level outside the codec's range.
    #[error("{compressor} level {level} out of range {min}..={max}")]
    InvalidLevel {
        /// Codec id.
        compressor: &'static str,
        /// Requested level.
        level: u32,
        /// Lowest accepted level.
        min: u32,
        /// Highest accepted level.
        max: u32,
    },
    /// Brotli window exponent outside `10..=24`.
    #[error("brotli window {0} out of range 10..=24")]
    InvalidWindow(u32),
    /// Unrecognized compressor id.
    #[error("unknown compressor id: {0}")]
    UnknownCompressor(String),
}

/// Deterministic byte-sequence compressor.
///
/// Implementations must be pure functions of their input for a fixed
/// configuration: equal input bytes produce equal output bytes.
pub trait Compressor: Send + Sync {
    /// Stable identifier, e.g. `gzip`.
    fn id(&self) -> &'static str;
    /// Human-readable description including configuration.
    fn name(&self) -> String;
    /// Compresses `input`.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError>;
    /// Length of `compress(input)`.
    fn compressed_len(&self, input: &[u8]) -> Result<usize, CompressionError> {
        self.compress(input).map(|out| out.len())
    }
}

impl<C: Compressor + ?Sized> Compressor for &C {
    fn id(&self) -> &'static str {
        (**self).id()
    }

    fn name(&self) -> String {
        (**self).name()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        (**self).compress(input)
    }

    fn compressed_len(&self, input: &[u8]) -> Result<usize, CompressionError> {
        (**self).compressed_len(input)
    }
}

impl<C: Compressor + ?Sized> Compressor for Box<C> {
    fn id(&self) -> &'static str {
        (**self).id()
    }

    fn name(&self) -> String {
        (**self).name()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        (**self).compress(input)
    }

    fn compressed_len(&self, input: &[u8]) -> Result<usize, CompressionError> {
        (**self).compressed_len(input)
    }
}

fn checked_level(kind: CompressorKind, level: u32) -> Result<u32, CompressionError> {
    let range = kind.levels();
    if !range.contains(&level) {
        return Err(CompressionError::InvalidLevel {
            compressor: kind.id(),
            level,
            min: *range.start(),
            max: *range.end(),
        });
    }
    Ok(level)
}

/// Gzip container with a fixed header timestamp.
///
/// The gzip header otherwise carries the wall-clock time, which would make
/// output depend on when it was produced.
#[derive(Clone, Debug)]
pub struct Gzip {
    level: Compression,
    mtime: u32,
}

impl Gzip {
    /// Gzip at `level` with the header timestamp forced to zero.
    pub fn new(level: u32) -> Result<Self, CompressionError> {
        Self::with_mtime(level, 0)
    }

    /// Gzip at `level` with the header timestamp forced to `mtime`.
    pub fn with_mtime(level: u32, mtime: u32) -> Result<Self, CompressionError> {
        Ok(Self {
            level: Compression::new(checked_level(CompressorKind::Gzip, level)?),
            mtime,
        })
    }

    /// Header timestamp written into every member.
    #[must_use]
    pub fn mtime(&self) -> u32 {
        self.mtime
    }
}

impl Compressor for Gzip {
    fn id(&self) -> &'static str {
        "gzip"
    }

    fn name(&self) -> String {
        format!(
            "gzip (flate2, level={}, mtime={})",
            self.level.level(),
            self.mtime
        )
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut enc = GzBuilder::new()
            .mtime(self.mtime)
            .write(Vec::new(), self.level);
        enc.write_all(input)?;
        Ok(enc.finish()?)
    }
}

/// Zlib container (RFC 1950). Carries no timestamp.
#[derive(Clone, Debug)]
pub struct Zlib {
    level: Compression,
}

impl Zlib {
    /// Zlib at `level`.
    pub fn new(level: u32) -> Result<Self, CompressionError> {
        Ok(Self {
            level: Compression::new(checked_level(CompressorKind::Zlib, level)?),
        })
    }
}

impl Compressor for Zlib {
    fn id(&self) -> &'static str {
        "zlib"
    }

    fn name(&self) -> String {
        format!("zlib (flate2, level={})", self.level.level())
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut enc = ZlibEncoder::new(Vec::new(), self.level);
        enc.write_all(input)?;
        Ok(enc.finish()?)
    }
}

/// Raw DEFLATE stream (RFC 1951) without container framing.
#[derive(Clone, Debug)]
pub struct Deflate {
    level: Compression,
}

impl Deflate {
    /// Raw DEFLATE at `level`.
    pub fn new(level: u32) -> Result<Self, CompressionError> {
        Ok(Self {
            level: Compression::new(checked_level(CompressorKind::Deflate, level)?),
        })
    }
}

impl Compressor for Deflate {
    fn id(&self) -> &'static str {
        "deflate"
    }

    fn name(&self) -> String {
        format!("deflate (flate2, level={})", self.level.level())
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut enc = DeflateEncoder::new(Vec::new(), self.level);
        enc.write_all(input)?;
        Ok(enc.finish()?)
    }
}

/// Zstandard frame, single-threaded.
#[derive(Clone, Debug)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    /// Zstd at `level` (`1..=22`).
    pub fn new(level: u32) -> Result<Self, CompressionError> {
        let level = checked_level(CompressorKind::Zstd, level)?;
        Ok(Self {
            level: i32::try_from(level).unwrap_or(i32::MAX),
        })
    }
}

impl Compressor for Zstd {
    fn id(&self) -> &'static str {
        "zstd"
    }

    fn name(&self) -> String {
        format!("zstd (level={})", self.level)
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(zstd::stream::encode_all(input, self.level)?)
    }
}

/// Brotli stream.
#[derive(Clone, Debug)]
pub struct Brotli {
    quality: u32,
    lgwin: u32,
}

impl Brotli {
    /// Brotli at `quality` (`0..=11`) with a `2^lgwin` byte window.
    pub fn new(quality: u32, lgwin: u32) -> Result<Self, CompressionError> {
        if !BROTLI_WINDOWS.contains(&lgwin) {
            return Err(CompressionError::InvalidWindow(lgwin));
        }
        Ok(Self {
            quality: checked_level(CompressorKind::Brotli, quality)?,
            lgwin,
        })
    }
}

impl Compressor for Brotli {
    fn id(&self) -> &'static str {
        "brotli"
    }

    fn name(&self) -> String {
        format!("brotli (quality={}, lgwin={})", self.quality, self.lgwin)
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let params = brotli::enc::BrotliEncoderParams {
            quality: i32::try_from(self.quality).unwrap_or(11),
            lgwin: i32::try_from(self.lgwin).unwrap_or(22),
            ..Default::default()
        };
        let mut out = Vec::new();
        brotli::BrotliCompress(&mut &input[..], &mut out, &params)?;
        Ok(out)
    }
}

/// LZ4 block with a little-endian size prefix. Has no level.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lz4;

impl Compressor for Lz4 {
    fn id(&self) -> &'static str {
        "lz4"
    }

    fn name(&self) -> String {
        "lz4 (lz4_flex block)".to_owned()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(lz4_flex::compress_prepend_size(input))
    }
}

/// XZ container (LZMA2).
#[derive(Clone, Debug)]
pub struct Xz {
    level: u32,
}

impl Xz {
    /// Xz at preset `level` (`0..=9`).
    pub fn new(level: u32) -> Result<Self, CompressionError> {
        Ok(Self {
            level: checked_level(CompressorKind::Xz, level)?,
        })
    }
}

impl Compressor for Xz {
    fn id(&self) -> &'static str {
        "xz"
    }

    fn name(&self) -> String {
        format!("xz (level={})", self.level)
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut enc = xz2::write::XzEncoder::new(Vec::new(), self.level);
        enc.write_all(input)?;
        Ok(enc.finish()?)
    }
}

/// Closed set of available compressors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressorKind {
    /// Gzip container.
    #[default]
    Gzip,
    /// Zlib container.
    Zlib,
    /// Raw DEFLATE.
    Deflate,
    /// Zstandard.
    Zstd,
    /// Brotli.
    Brotli,
    /// LZ4 block.
    Lz4,
    /// XZ / LZMA2.
    Xz,
}

impl CompressorKind {
    /// Every kind, in listing order.
    pub const ALL: [Self; 7] = [
        Self::Gzip,
        Self::Zlib,
        Self::Deflate,
        Self::Zstd,
        Self::Brotli,
        Self::Lz4,
        Self::Xz,
    ];

    /// Stable identifier.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zlib => "zlib",
            Self::Deflate => "deflate",
            Self::Zstd => "zstd",
            Self::Brotli => "brotli",
            Self::Lz4 => "lz4",
            Self::Xz => "xz",
        }
    }

    /// Accepted levels. LZ4 accepts and ignores `0..=9`.
    #[must_use]
    pub fn levels(self) -> RangeInclusive<u32> {
        match self {
            Self::Gzip | Self::Zlib | Self::Deflate | Self::Lz4 | Self::Xz => 0..=MAX_LEVEL,
            Self::Zstd => 1..=22,
            Self::Brotli => 0..=11,
        }
    }
}

impl Display for CompressorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for CompressorKind {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_compressor(s)
    }
}

/// Resolves a compressor id.
pub fn parse_compressor(id: &str) -> Result<CompressorKind, CompressionError> {
    CompressorKind::ALL
        .into_iter()
        .find(|kind| kind.id().eq_ignore_ascii_case(id.trim()))
        .ok_or_else(|| CompressionError::UnknownCompressor(id.to_owned()))
}

/// Known compressor ids.
#[must_use]
pub fn compressor_ids() -> Vec<&'static str> {
    CompressorKind::ALL.into_iter().map(CompressorKind::id).collect()
}

/// Full compressor configuration, fixed at construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CompressorSpec {
    /// Codec.
    pub kind: CompressorKind,
    /// Level, quality for brotli. Range depends on `kind`.
    pub level: u32,
    /// Gzip header timestamp. Ignored by containers without one.
    pub mtime: u32,
    /// Brotli window exponent. Ignored by other codecs.
    #[serde(default = "default_window")]
    pub window: u32,
}

impl Default for CompressorSpec {
    fn default() -> Self {
        Self {
            kind: CompressorKind::Gzip,
            level: 6,
            mtime: 0,
            window: DEFAULT_BROTLI_WINDOW,
        }
    }
}

impl CompressorSpec {
    /// Checks level and window without building.
    pub fn validate(&self) -> Result<(), CompressionError> {
        checked_level(self.kind, self.level)?;
        if self.kind == CompressorKind::Brotli && !BROTLI_WINDOWS.contains(&self.window) {
            return Err(CompressionError::InvalidWindow(self.window));
        }
        Ok(())
    }

    /// Instantiates the configured compressor.
    pub fn build(&self) -> Result<Box<dyn Compressor>, CompressionError> {
        Ok(match self.kind {
            CompressorKind::Gzip => Box::new(Gzip::with_mtime(self.level, self.mtime)?),
            CompressorKind::Zlib => Box::new(Zlib::new(self.level)?),
            CompressorKind::Deflate => Box::new(Deflate::new(self.level)?),
            CompressorKind::Zstd => Box::new(Zstd::new(self.level)?),
            CompressorKind::Brotli => Box::new(Brotli::new(self.level, self.window)?),
            CompressorKind::Lz4 => {
                checked_level(CompressorKind::Lz4, self.level)?;
                Box::new(Lz4)
            }
            CompressorKind::Xz => Box::new(Xz::new(self.level)?),
        })
    }
}

fn default_window() -> u32 {
    DEFAULT_BROTLI_WINDOW
}
