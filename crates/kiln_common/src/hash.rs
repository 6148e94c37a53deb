//! Content hashing used to detect changed sources between runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit XXH3 digest of an artifact's bytes.
///
/// The build manifest records one hash per source location; a source whose
/// hash differs from the recorded one is reported as changed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Hashes an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data).to_le_bytes())
    }

    /// Hashes everything readable from `reader` without buffering it whole.
    pub fn from_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut hasher = Xxh3::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.digest128().to_le_bytes()))
    }

    /// Returns the first eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}..)", self.short())
    }
}
