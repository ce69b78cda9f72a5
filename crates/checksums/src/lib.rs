#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `checksums` provides [`ContentHash`], the 16-byte identity key that keys
//! a transfer's resume state. This hash is never used to verify delivered
//! content against the sender's claim — it is only an identity key, so this
//! crate exposes no "verify" API, only "compute" and "parse".
//!
//! # Design
//!
//! MD5 is used because it is what the wire format carries in practice; the
//! type itself stores any 16-byte value so a future protocol revision could
//! swap the algorithm without touching [`ContentHash`]'s representation.
//!
//! # Examples
//!
//! ```
//! use checksums::ContentHash;
//!
//! let hash = ContentHash::of_bytes(b"hello world");
//! let hex = hash.to_hex();
//! assert_eq!(hex.len(), 32);
//! assert_eq!(ContentHash::from_hex(&hex).unwrap(), hash);
//! ```

use digest::Digest;
use std::fmt;

/// Number of bytes in a [`ContentHash`], matching MD5's digest length.
pub const HASH_LEN: usize = 16;

/// Opaque per-file identity key, used only to name and look up a transfer's
/// resume sidecar. Never treated as a content-verification
/// digest.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    /// Wraps a raw 16-byte value as received on the wire.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Computes the MD5 digest of `data` in one shot.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        let digest: [u8; HASH_LEN] = md5::Md5::digest(data).into();
        Self(digest)
    }

    /// Returns the raw bytes, as they are sent on the wire.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Renders the hash as lowercase hex, used verbatim as the sidecar file
    /// name.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a lowercase (or mixed-case) hex string back into a hash.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not exactly 32 hex digits.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| HashParseError::Invalid)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Streaming hasher for computing a [`ContentHash`] over a file too large to
/// hold in memory at once.
#[derive(Clone, Debug, Default)]
pub struct Hasher {
    inner: md5::Md5,
}

impl Hasher {
    /// Creates a hasher with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds more bytes into the digest state.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalises the digest into a [`ContentHash`].
    #[must_use]
    pub fn finalize(self) -> ContentHash {
        ContentHash(self.inner.finalize().into())
    }
}

/// Error returned when parsing a hex-encoded hash fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum HashParseError {
    /// The string was not exactly 32 valid hex digits.
    #[error("invalid content hash: expected 32 hex digits")]
    Invalid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let hash = ContentHash::of_bytes(b"some file contents");
        let hex = hash.to_hex();
        assert_eq!(ContentHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut hasher = Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), ContentHash::of_bytes(b"hello world"));
    }

    #[test]
    fn rejects_short_hex() {
        assert!(ContentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn known_md5_vector() {
        // RFC 1321 test vector.
        let hash = ContentHash::of_bytes(b"");
        assert_eq!(hash.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
