//! Conflict resolution: substitute a chosen side for one conflict at a time.
//!
//! Resolution choices are a tagged variant — an explicit payload only for
//! `Custom` — dispatched by pattern matching. Resolving the last conflict
//! makes the merged tree available.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

use super::MergeResult;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The caller's choice for resolving a single conflict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the local side's content (deletes the path if local deleted it).
    Local,
    /// Take the remote side's content (deletes the path if remote deleted it).
    Remote,
    /// Revert to the base content (deletes the path if absent from base).
    Base,
    /// Replace with caller-provided bytes — e.g. a hand-merged file or a
    /// conflict's `suggested` line merge.
    Custom(Vec<u8>),
}

impl MergeResult {
    /// Resolve the conflict at `path` with `choice`, consuming this result
    /// and returning the updated one.
    ///
    /// The chosen content replaces the conflict-marker working copy at that
    /// path (or removes the path, when the chosen side deleted it). Once
    /// the last conflict is resolved, [`MergeResult::merged_tree`] returns
    /// the tree.
    ///
    /// # Errors
    /// Returns [`Error::NoSuchConflict`] if `path` has no unresolved
    /// conflict.
    pub fn resolve(mut self, path: &Path, choice: Resolution) -> Result<Self> {
        let index = self
            .conflicts
            .iter()
            .position(|c| c.path == path)
            .ok_or_else(|| Error::NoSuchConflict {
                path: path.to_path_buf(),
            })?;
        let conflict = self.conflicts.remove(index);

        let content = match choice {
            Resolution::Local => conflict.local,
            Resolution::Remote => conflict.remote,
            Resolution::Base => conflict.base,
            Resolution::Custom(bytes) => Some(bytes),
        };
        match content {
            Some(bytes) => self.candidate.insert(conflict.path.clone(), bytes),
            None => {
                self.candidate.remove(&conflict.path);
            }
        }
        self.applied_count += 1;

        debug!(
            path = %conflict.path.display(),
            remaining = self.conflicts.len(),
            "conflict resolved"
        );
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
