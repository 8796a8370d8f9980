//! Foundation types for trove.
//!
//! Identifier newtypes used throughout the crate: collection identifiers,
//! snapshot identifiers, and artifact names. All are validated on
//! construction so the rest of the crate can trust their shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CollectionId
// ---------------------------------------------------------------------------

/// A validated collection identifier.
///
/// Collection names must be lowercase alphanumeric with hyphens, 1–64
/// characters. Examples: `team-skills`, `personal`, `prompts-v2`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionId(String);

impl CollectionId {
    /// The maximum length of a collection name.
    pub const MAX_LEN: usize = 64;

    /// Create a new `CollectionId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the name is empty, too long, or contains invalid
    /// characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the collection name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        validate_name(s, ErrorKind::CollectionId, "collection name")
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CollectionId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<CollectionId> for String {
    fn from(id: CollectionId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// SnapshotId
// ---------------------------------------------------------------------------

/// A validated snapshot identifier — 32 lowercase hex characters.
///
/// Snapshot ids are random 128-bit values assigned at creation time and
/// never reused. They identify a snapshot independently of its content hash
/// (two snapshots of identical content still get distinct ids).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(String);

impl SnapshotId {
    /// The exact length of a snapshot id string.
    pub const LEN: usize = 32;

    /// Generate a cryptographically-random `SnapshotId`.
    #[must_use]
    pub fn random() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    /// Create a `SnapshotId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 32 lowercase hex digits.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the id as a hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short 8-character prefix for log lines and display.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.len() != Self::LEN {
            return Err(ValidationError {
                kind: ErrorKind::SnapshotId,
                value: s.to_owned(),
                reason: format!("expected {} hex characters, got {}", Self::LEN, s.len()),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(ValidationError {
                kind: ErrorKind::SnapshotId,
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// ArtifactName
// ---------------------------------------------------------------------------

/// A validated artifact name.
///
/// Same character rules as [`CollectionId`], plus underscores, since artifact
/// names frequently mirror file names. Examples: `commit-helper`,
/// `review_checklist`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName(String);

impl ArtifactName {
    /// The maximum length of an artifact name.
    pub const MAX_LEN: usize = 64;

    /// Create a new `ArtifactName` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the name is empty, too long, or contains invalid
    /// characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the artifact name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.is_empty() {
            return Err(ValidationError {
                kind: ErrorKind::ArtifactName,
                value: s.to_owned(),
                reason: "artifact name must not be empty".to_owned(),
            });
        }
        if s.len() > Self::MAX_LEN {
            return Err(ValidationError {
                kind: ErrorKind::ArtifactName,
                value: s.to_owned(),
                reason: format!(
                    "artifact name must be at most {} characters, got {}",
                    Self::MAX_LEN,
                    s.len()
                ),
            });
        }
        if s.starts_with('-') || s.ends_with('-') {
            return Err(ValidationError {
                kind: ErrorKind::ArtifactName,
                value: s.to_owned(),
                reason: "artifact name must not start or end with a hyphen".to_owned(),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError {
                kind: ErrorKind::ArtifactName,
                value: s.to_owned(),
                reason: "artifact name must contain only lowercase letters (a-z), digits (0-9), hyphens (-), and underscores (_)".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArtifactName {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<ArtifactName> for String {
    fn from(name: ArtifactName) -> Self {
        name.0
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Which identifier type failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A [`CollectionId`] failed validation.
    CollectionId,
    /// A [`SnapshotId`] failed validation.
    SnapshotId,
    /// An [`ArtifactName`] failed validation.
    ArtifactName,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollectionId => write!(f, "collection id"),
            Self::SnapshotId => write!(f, "snapshot id"),
            Self::ArtifactName => write!(f, "artifact name"),
        }
    }
}

/// An identifier string failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// The identifier type that was being constructed.
    pub kind: ErrorKind,
    /// The offending input.
    pub value: String,
    /// Why the input is invalid.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} '{}': {}", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// Shared validation for hyphenated lowercase names.
fn validate_name(s: &str, kind: ErrorKind, label: &str) -> Result<(), ValidationError> {
    if s.is_empty() {
        return Err(ValidationError {
            kind,
            value: s.to_owned(),
            reason: format!("{label} must not be empty"),
        });
    }
    if s.len() > CollectionId::MAX_LEN {
        return Err(ValidationError {
            kind,
            value: s.to_owned(),
            reason: format!(
                "{label} must be at most {} characters, got {}",
                CollectionId::MAX_LEN,
                s.len()
            ),
        });
    }
    if s.starts_with('-') || s.ends_with('-') {
        return Err(ValidationError {
            kind,
            value: s.to_owned(),
            reason: format!("{label} must not start or end with a hyphen"),
        });
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError {
            kind,
            value: s.to_owned(),
            reason: format!(
                "{label} must contain only lowercase letters (a-z), digits (0-9), and hyphens (-)"
            ),
        });
    }
    if s.contains("--") {
        return Err(ValidationError {
            kind,
            value: s.to_owned(),
            reason: format!("{label} must not contain consecutive hyphens"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
