//! Content digests used for pack integrity checks
//!
//! Digests detect accidental corruption. They carry no key and are not a
//! defence against deliberate tampering.

use crate::error::{PakError, Result};
use serde::{Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::io::Read;

/// Digest width in bytes
pub const DIGEST_SIZE: usize = 32;

/// Chunk size used when hashing a stream
pub const HASH_CHUNK_SIZE: usize = 16 * 1024;

/// Fixed-size digest of a byte sequence
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest(pub [u8; DIGEST_SIZE]);

impl Digest {
    /// Digest of a byte slice
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Digest of exactly `len` bytes pulled from `reader`
    pub fn of_reader<R: Read>(mut reader: R, len: u64) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        let mut remaining = len;

        while remaining > 0 {
            let want = remaining.min(HASH_CHUNK_SIZE as u64) as usize;
            let got = reader.read(&mut buf[..want])?;
            if got == 0 {
                return Err(PakError::ShortRead {
                    what: "content region",
                });
            }
            hasher.update(&buf[..got]);
            remaining -= got as u64;
        }

        Ok(Self(hasher.finalize().into()))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Digest of a byte slice
pub fn digest(data: &[u8]) -> Digest {
    Digest::of(data)
}
