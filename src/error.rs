//! Unified error type for trove operations.
//!
//! Defines [`Error`], the single error enum returned by every fallible
//! operation in this crate. Messages are designed to be actionable: each
//! variant includes a clear description of what went wrong and, where a
//! caller action exists, guidance on how to proceed.
//!
//! The taxonomy follows a strict propagation policy:
//!
//! - [`Error::ReadFailure`] and [`Error::Corrupt`] abort the enclosing
//!   operation and leave durable state untouched.
//! - [`Error::SnapshotNotFound`] and [`Error::WouldLoseChanges`] are
//!   recoverable, reported results — a caller is expected to handle them.
//! - [`Error::ConflictPresent`] is a caller contract violation (attempting
//!   to materialize a merge that still has conflicts), not a data error.

use std::fmt;
use std::path::PathBuf;

use crate::model::hash::ContentHash;
use crate::model::types::{SnapshotId, ValidationError};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Unified error type for trove operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred while reading a file into a tree or hash.
    ///
    /// Always aborts the whole operation — a tree or hash is never
    /// partially computed.
    ReadFailure {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A restored snapshot's recomputed hash does not match the hash
    /// recorded at creation time.
    ///
    /// Fatal for that snapshot; never silently repaired.
    Corrupt {
        /// The snapshot whose archive failed verification.
        snapshot_id: SnapshotId,
        /// The hash recorded when the snapshot was created.
        expected: ContentHash,
        /// The hash recomputed from the restored bytes.
        actual: ContentHash,
    },

    /// The requested snapshot does not exist.
    SnapshotNotFound {
        /// The snapshot id that was not found.
        id: SnapshotId,
    },

    /// A deployment record file was expected but not found.
    RecordNotFound {
        /// Where the record was expected.
        path: PathBuf,
    },

    /// An attempt was made to materialize a merge result that still has
    /// unresolved conflicts.
    ConflictPresent {
        /// How many conflicts remain.
        count: usize,
    },

    /// A conflict resolution named a path that has no unresolved conflict.
    NoSuchConflict {
        /// The path the caller tried to resolve.
        path: PathBuf,
    },

    /// A rollback would discard local changes and the caller did not
    /// acknowledge the loss.
    WouldLoseChanges {
        /// The paths whose local edits would be lost.
        paths: Vec<PathBuf>,
    },

    /// An identifier string failed validation.
    InvalidName(ValidationError),

    /// A configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// A stored metadata file (snapshot index, deployment record, audit
    /// log) is malformed.
    Metadata {
        /// Path to the malformed file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// An I/O error during a durable write or archive operation.
    Io(std::io::Error),
}

// ---------------------------------------------------------------------------
// Display — actionable messages
// ---------------------------------------------------------------------------

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailure { path, source } => {
                write!(
                    f,
                    "failed to read '{}': {source}\n  The operation was aborted; no partial state was written.",
                    path.display()
                )
            }
            Self::Corrupt {
                snapshot_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "snapshot '{snapshot_id}' is corrupt: recorded hash {expected} but restored content hashes to {actual}.\n  The archive has been damaged; restore from another snapshot."
                )
            }
            Self::SnapshotNotFound { id } => {
                write!(
                    f,
                    "snapshot '{id}' not found.\n  To fix: list the collection's snapshots and pick a valid id."
                )
            }
            Self::RecordNotFound { path } => {
                write!(
                    f,
                    "no deployment record at '{}'.\n  To fix: the artifact may not be deployed here, or the record was removed.",
                    path.display()
                )
            }
            Self::ConflictPresent { count } => {
                write!(
                    f,
                    "cannot materialize merge: {count} conflict(s) remain unresolved.\n  To fix: resolve each conflict, then retry."
                )
            }
            Self::NoSuchConflict { path } => {
                write!(
                    f,
                    "no unresolved conflict at '{}'.\n  To fix: check the merge result's conflict list for the paths that remain.",
                    path.display()
                )
            }
            Self::WouldLoseChanges { paths } => {
                write!(
                    f,
                    "rollback would discard local changes to {} path(s):",
                    paths.len()
                )?;
                for p in paths {
                    write!(f, "\n  - {}", p.display())?;
                }
                write!(
                    f,
                    "\n  To fix: re-run with the loss explicitly acknowledged, or sync first."
                )
            }
            Self::InvalidName(err) => write!(f, "{err}"),
            Self::Config { path, detail } => {
                write!(
                    f,
                    "configuration error in '{}': {}\n  To fix: edit the config file and correct the issue.",
                    path.display(),
                    detail
                )
            }
            Self::Metadata { path, detail } => {
                write!(
                    f,
                    "malformed metadata in '{}': {}",
                    path.display(),
                    detail
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::ReadFailure { source, .. } => Some(source),
            Self::InvalidName(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::InvalidName(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
