//! Content digests for snapshot sets
//!
//! Provides [`ContentDigest`], a 32-byte Blake3 digest used to key memoized
//! diff and attribution results on the exact texts they were computed from.

use crate::attribution::Snapshot;
use std::fmt::{self, Display, Formatter};

/// A 32-byte content digest (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest of an ordered snapshot set.
    ///
    /// Every field is length-prefixed, so moving text across a stage boundary
    /// changes the digest.
    #[must_use]
    pub fn of_snapshots<O: AsRef<str>>(snapshots: &[Snapshot<O>]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(snapshots.len() as u64).to_le_bytes());
        for snapshot in snapshots {
            update_field(&mut hasher, snapshot.owner.as_ref());
            update_field(&mut hasher, &snapshot.text);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Digest of an ordered text pair
    #[must_use]
    pub fn of_pair(old: &str, new: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        update_field(&mut hasher, old);
        update_field(&mut hasher, new);
        Self(*hasher.finalize().as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

fn update_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl serde::Serialize for ContentDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
