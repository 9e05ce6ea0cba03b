//! BLAKE3 content hashing for working-buffer refs

use serde::{Deserialize, Serialize};
use std::fmt;

/// A BLAKE3 hash (32 bytes) of a normalized text snapshot
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        let mut hex = String::with_capacity(64);
        for &byte in &self.0 {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xf) as usize] as char);
        }
        hex
    }

    /// Short form used in log lines
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash text after line-ending normalization
///
/// Two buffers that differ only in CRLF vs LF (or a trailing newline) hash
/// the same, matching what the delta builder considers equal.
pub fn hash_text(text: &str) -> ContentHash {
    let mut hasher = blake3::Hasher::new();
    for line in crate::delta::split_lines(text) {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    ContentHash::from_bytes(*hasher.finalize().as_bytes())
}
