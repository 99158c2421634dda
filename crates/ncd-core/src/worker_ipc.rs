//! Wire protocol between the selector and the isolated worker process.
//!
//! Each message is a 4-byte big-endian length followed by a JSON document.
//! Byte payloads travel as standard base64 strings.

use std::borrow::Cow;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::compressor::{CompressorKind, CompressorSpec, DEFAULT_BROTLI_WINDOW};
use crate::distance::{NcdOptions, Symmetry};
use crate::frame::Join;

/// Default upper bound for one frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Everything the worker needs to reproduce one configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorkerOptions {
    /// Codec.
    pub compressor: CompressorKind,
    /// Compression level.
    pub level: u32,
    /// Gzip header timestamp.
    pub mtime: u32,
    /// Brotli window exponent.
    #[serde(default = "default_window")]
    pub window: u32,
    /// Symmetrization policy.
    pub symmetry: Symmetry,
    /// Clamp into `[0, 1]`.
    pub clamp_unit: bool,
}

impl WorkerOptions {
    /// Compressor configuration carried by these options.
    #[must_use]
    pub fn compressor_spec(&self) -> CompressorSpec {
        CompressorSpec {
            kind: self.compressor,
            level: self.level,
            mtime: self.mtime,
            window: self.window,
        }
    }

    /// Distance options carried by these options.
    #[must_use]
    pub fn ncd_options(&self) -> NcdOptions {
        NcdOptions {
            join: Join::Frame64,
            symmetry: self.symmetry,
            clamp_unit: self.clamp_unit,
        }
    }
}

/// Worker request. Payloads borrow on the sending side and are owned after
/// decoding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WorkerRequest<'a> {
    /// Liveness check.
    Health,
    /// Distance between two payloads.
    Distance {
        /// Left payload.
        #[serde(with = "b64")]
        left: Cow<'a, [u8]>,
        /// Right payload.
        #[serde(with = "b64")]
        right: Cow<'a, [u8]>,
        /// Configuration.
        options: WorkerOptions,
    },
    /// Full grid of `rows` against `cols`.
    Matrix {
        /// Row payloads.
        #[serde(with = "b64_list")]
        rows: Vec<Cow<'a, [u8]>>,
        /// Column payloads.
        #[serde(with = "b64_list")]
        cols: Vec<Cow<'a, [u8]>>,
        /// Configuration.
        options: WorkerOptions,
    },
}

/// Worker response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WorkerResponse {
    /// Liveness check response.
    Health { ok: bool },
    /// Scalar distance.
    Distance { value: f64 },
    /// Row-major grid.
    Matrix { values: Vec<Vec<f64>> },
    /// Worker-side failure.
    Error { message: String },
}

/// IPC transport errors.
#[derive(Debug, Error)]
pub enum IpcError {
    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON codec failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Length prefix exceeds the configured bound.
    #[error("frame of {len} bytes exceeds max of {max}")]
    FrameTooLarge {
        /// Announced or encoded length.
        len: usize,
        /// Configured bound.
        max: usize,
    },
}

/// Serializes `value` into a frame payload of at most `max_bytes`.
pub fn encode_frame<T: Serialize>(value: &T, max_bytes: usize) -> Result<Vec<u8>, IpcError> {
    let payload = serde_json::to_vec(value)?;
    let max = max_bytes.min(u32::MAX as usize);
    if payload.len() > max {
        return Err(IpcError::FrameTooLarge {
            len: payload.len(),
            max,
        });
    }
    Ok(payload)
}

/// Writes an already encoded payload with its length prefix and flushes.
pub fn write_payload(writer: &mut impl Write, payload: &[u8]) -> Result<(), IpcError> {
    let len = u32::try_from(payload.len()).map_err(|_| IpcError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Writes one length-prefixed JSON frame and flushes.
pub fn write_frame<T: Serialize>(writer: &mut impl Write, value: &T) -> Result<(), IpcError> {
    let payload = encode_frame(value, u32::MAX as usize)?;
    write_payload(writer, &payload)
}

/// Reads one length-prefixed JSON frame of at most `max_bytes`.
pub fn read_frame<T: DeserializeOwned>(
    reader: &mut impl Read,
    max_bytes: usize,
) -> Result<T, IpcError> {
    let mut len_buf = [0_u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_bytes {
        return Err(IpcError::FrameTooLarge {
            len,
            max: max_bytes,
        });
    }
    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload)?;
    Ok(serde_json::from_slice(&payload)?)
}

fn default_window() -> u32 {
    DEFAULT_BROTLI_WINDOW
}

mod b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(bytes: &T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: From<Vec<u8>>,
    {
        let text = String::deserialize(d)?;
        STANDARD
            .decode(text.as_bytes())
            .map(T::from)
            .map_err(|e| D::Error::custom(format!("invalid base64: {e}")))
    }
}

mod b64_list {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(
        items: &[T],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&STANDARD.encode(item.as_ref()))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: From<Vec<u8>>,
    {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|text| {
                STANDARD
                    .decode(text.as_bytes())
                    .map(T::from)
                    .map_err(|e| D::Error::custom(format!("invalid base64: {e}")))
            })
            .collect()
    }
}
