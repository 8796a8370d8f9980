//! Append-only rollback audit log.
//!
//! One JSON Lines file per collection, one entry per rollback attempt —
//! written regardless of outcome, so every attempt is forensically
//! recoverable. The file is only ever appended, never rewritten; readers
//! tolerate a torn trailing line left by a crash mid-append.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::atomic::append_line;
use crate::error::{Error, Result};
use crate::model::SnapshotId;

// ---------------------------------------------------------------------------
// RollbackOutcome
// ---------------------------------------------------------------------------

/// How a rollback attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackOutcome {
    /// The rollback merged cleanly and was published.
    Applied,
    /// Conflicts were surfaced; resolution is required to complete.
    Conflicted,
    /// The rollback was refused because it would lose unacknowledged
    /// local changes.
    Refused,
    /// The rollback failed partway (e.g. an I/O error during publish).
    Failed,
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Refused => write!(f, "refused"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// RollbackAuditEntry
// ---------------------------------------------------------------------------

/// One row of the rollback audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackAuditEntry {
    /// Unique entry id (32 lowercase hex characters).
    pub id: String,
    /// When the attempt happened, unix epoch milliseconds.
    pub timestamp: u64,
    /// The snapshot the rollback targeted.
    pub target_snapshot_id: SnapshotId,
    /// The safety snapshot of the pre-rollback state, when one was taken
    /// (refused attempts stop before the safety snapshot).
    pub pre_rollback_snapshot_id: Option<SnapshotId>,
    /// Paths whose local edits the rollback preserved.
    pub preserved_paths: Vec<PathBuf>,
    /// Paths that conflicted.
    pub conflict_paths: Vec<PathBuf>,
    /// How the attempt ended.
    pub outcome: RollbackOutcome,
}

impl RollbackAuditEntry {
    /// Build an entry with a fresh random id and the current time.
    #[must_use]
    pub fn new(
        target_snapshot_id: SnapshotId,
        pre_rollback_snapshot_id: Option<SnapshotId>,
        preserved_paths: Vec<PathBuf>,
        conflict_paths: Vec<PathBuf>,
        outcome: RollbackOutcome,
    ) -> Self {
        Self {
            id: format!("{:032x}", rand::random::<u128>()),
            timestamp: crate::store::now_millis(),
            target_snapshot_id,
            pre_rollback_snapshot_id,
            preserved_paths,
            conflict_paths,
            outcome,
        }
    }
}

/// Append one entry to the audit log at `path`.
///
/// # Errors
/// Returns [`Error::Io`] on write failure, or [`Error::Metadata`] if the
/// entry cannot be serialized.
pub fn append_entry(path: &Path, entry: &RollbackAuditEntry) -> Result<()> {
    let line = serde_json::to_string(entry).map_err(|e| Error::Metadata {
        path: path.to_path_buf(),
        detail: format!("failed to serialize audit entry: {e}"),
    })?;
    append_line(path, &line)
}

/// Read every entry from the audit log at `path`, oldest first.
///
/// A missing file reads as empty. An unparsable *final* line is treated as
/// a torn append and skipped with a warning; an unparsable line anywhere
/// else is corruption and surfaces as an error.
///
/// # Errors
/// Returns [`Error::Metadata`] for a malformed non-final line.
pub fn read_log(path: &Path) -> Result<Vec<RollbackAuditEntry>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let lines: Vec<&str> = contents.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut entries = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        match serde_json::from_str::<RollbackAuditEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if i + 1 == lines.len() => {
                warn!(path = %path.display(), "skipping torn trailing audit line");
                let _ = e;
            }
            Err(e) => {
                return Err(Error::Metadata {
                    path: path.to_path_buf(),
                    detail: format!("malformed audit entry on line {}: {e}", i + 1),
                });
            }
        }
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
