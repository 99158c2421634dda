//! Length-prefixed join used to build the joint input for two sequences.
//!
//! ```text
//! frame64(b)  = u64_le(len(b)) || b
//! join(x, y)  = frame64(x) || frame64(y)
//! ```
//!
//! The layout is part of the comparability contract between implementations
//! and must stay bit-exact.

use serde::{Deserialize, Serialize};

/// Width of the little-endian length prefix.
pub const FRAME64_PREFIX_BYTES: usize = 8;

/// Strategy for joining two sequences before joint compression.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Join {
    /// `frame64(x) || frame64(y)`.
    #[default]
    Frame64,
}

/// Appends `frame64(data)` to `out`.
fn push_frame64(out: &mut Vec<u8>, data: &[u8]) {
    let len = u64::try_from(data.len()).unwrap_or(u64::MAX);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(data);
}

/// Encodes a single sequence as `u64_le(len) || data`.
#[must_use]
pub fn frame64(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME64_PREFIX_BYTES + data.len());
    push_frame64(&mut out, data);
    out
}

/// Joins `x` then `y` with the requested strategy.
#[must_use]
pub fn join_with(x: &[u8], y: &[u8], join: Join) -> Vec<u8> {
    match join {
        Join::Frame64 => {
            let mut out = Vec::with_capacity(2 * FRAME64_PREFIX_BYTES + x.len() + y.len());
            push_frame64(&mut out, x);
            push_frame64(&mut out, y);
            out
        }
    }
}

/// Canonical join: `frame64(x) || frame64(y)`.
#[must_use]
pub fn join(x: &[u8], y: &[u8]) -> Vec<u8> {
    join_with(x, y, Join::Frame64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame64_prefixes_little_endian_length() {
        assert_eq!(frame64(b""), vec![0; 8]);
        assert_eq!(frame64(b"ab"), vec![2, 0, 0, 0, 0, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn join_is_bit_exact() {
        let joined = join(b"abc", b"\x00\x01");
        let mut expected = Vec::new();
        expected.extend_from_slice(&3_u64.to_le_bytes());
        expected.extend_from_slice(b"abc");
        expected.extend_from_slice(&2_u64.to_le_bytes());
        expected.extend_from_slice(b"\x00\x01");
        assert_eq!(joined, expected);
    }

    #[test]
    fn join_is_order_sensitive() {
        assert_ne!(join(b"x", b"y"), join(b"y", b"x"));
        // A plain concatenation would collide here.
        assert_ne!(join(b"ab", b"c"), join(b"a", b"bc"));
    }

    #[test]
    fn join_of_empty_inputs_is_two_zero_prefixes() {
        assert_eq!(join(b"", b""), vec![0; 16]);
    }
}
