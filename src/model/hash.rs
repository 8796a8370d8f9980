//! Deterministic content hashing for artifact trees.
//!
//! A tree's [`ContentHash`] is the XOR-fold of each file's
//! `SHA-256(rel_path ∥ 0x00 ∥ bytes)`. XOR is commutative, so the same file
//! set produces the same digest in any enumeration order. Binding the path
//! into each per-file digest means renaming a file changes the tree hash
//! even when the bytes are untouched.
//!
//! Two trees with equal hashes are defined as content-identical. The empty
//! tree hashes to the all-zero sentinel.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::tree::ArtifactTree;

// ---------------------------------------------------------------------------
// ContentHash
// ---------------------------------------------------------------------------

/// A 32-byte tree digest, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// The sentinel hash of an empty tree.
    pub const EMPTY: Self = Self([0u8; 32]);

    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// A short 8-character prefix for log lines and display.
    #[must_use]
    pub fn short(&self) -> String {
        format!("{:02x}{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

/// A hex string failed to parse as a [`ContentHash`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseHashError {
    /// The offending input.
    pub value: String,
}

impl fmt::Display for ParseHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid content hash '{}': expected 64 lowercase hex characters",
            self.value
        )
    }
}

impl std::error::Error for ParseHashError {}

impl FromStr for ContentHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(ParseHashError {
                value: s.to_owned(),
            });
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or_else(|| ParseHashError {
                value: s.to_owned(),
            })?;
            let lo = hex_val(chunk[1]).ok_or_else(|| ParseHashError {
                value: s.to_owned(),
            })?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

const fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ParseHashError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_string()
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Per-file digest: `SHA-256(rel_path ∥ 0x00 ∥ bytes)`.
///
/// The NUL separator keeps `("ab", "c…")` and `("a", "bc…")` distinct;
/// relative paths never contain NUL.
#[must_use]
pub fn file_digest(rel_path: &Path, bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(rel_path.as_os_str().as_encoded_bytes());
    hasher.update([0u8]);
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hash a whole tree by XOR-folding its per-file digests.
///
/// Order-independent: any enumeration order of the same file set yields the
/// same result. The empty tree yields [`ContentHash::EMPTY`].
#[must_use]
pub fn hash_tree(tree: &ArtifactTree) -> ContentHash {
    let mut acc = [0u8; 32];
    for (path, bytes) in tree {
        let digest = file_digest(path, bytes);
        for (a, d) in acc.iter_mut().zip(digest.iter()) {
            *a ^= d;
        }
    }
    ContentHash(acc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
