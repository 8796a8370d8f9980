//! Pairwise and three-way structural comparison of artifact trees.
//!
//! All classification is digest-based: each file is hashed once per tree
//! ([`crate::model::file_digest`]) and every equality check compares
//! digests, never raw bytes. Hundreds of files classify in well under a
//! second.
//!
//! Three-way classification table (per path in the union of base/local/
//! remote):
//!
//! | local vs base | remote vs base | result |
//! |---|---|---|
//! | unchanged | unchanged | `Unchanged` |
//! | changed | unchanged | `LocalOnly` |
//! | unchanged | changed | `RemoteOnly` |
//! | changed | changed, same bytes | `BothSame` |
//! | changed | changed, different bytes | `BothDifferent` (conflict) |
//! | added | added, different bytes | `AddedByBoth` (conflict) |
//! | added | added, same bytes | `BothSame` |
//! | deleted | modified (or vice versa) | `DeletedModified` (conflict) |

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::model::{ArtifactTree, file_digest};

/// How many leading bytes the binary heuristic inspects.
const BINARY_SNIFF_LEN: usize = 8192;

/// Lightweight text-vs-binary heuristic: a file is binary if its first
/// 8 KiB contain a NUL byte or are not valid UTF-8 (ignoring a trailing
/// truncated multi-byte sequence at the sniff boundary).
#[must_use]
pub fn is_binary(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    if window.contains(&0) {
        return true;
    }
    match std::str::from_utf8(window) {
        Ok(_) => false,
        // A multi-byte sequence cut off by the sniff window is not evidence
        // of binary content; anything else is.
        Err(e) => e.error_len().is_some() || window.len() < BINARY_SNIFF_LEN,
    }
}

// ---------------------------------------------------------------------------
// DiffResult
// ---------------------------------------------------------------------------

/// A file present in both trees whose content differs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModifiedFile {
    /// Path relative to the tree root.
    pub path: PathBuf,
    /// `true` if either side's content looks binary.
    pub is_binary: bool,
}

/// Result of a pairwise tree comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Paths present only in the second tree.
    pub added: Vec<PathBuf>,
    /// Paths present only in the first tree.
    pub removed: Vec<PathBuf>,
    /// Paths present in both with differing content.
    pub modified: Vec<ModifiedFile>,
    /// Paths present in both with identical content.
    pub unchanged: Vec<PathBuf>,
}

impl DiffResult {
    /// Returns `true` if the trees are content-identical.
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of differing paths.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Compare two trees by path membership and per-path content digests.
#[must_use]
pub fn diff(a: &ArtifactTree, b: &ArtifactTree) -> DiffResult {
    let digests_a = digest_map(a);
    let digests_b = digest_map(b);

    let mut result = DiffResult::default();
    let paths: BTreeSet<&PathBuf> = digests_a.keys().chain(digests_b.keys()).collect();
    for path in paths {
        match (digests_a.get(path), digests_b.get(path)) {
            (None, Some(_)) => result.added.push((*path).clone()),
            (Some(_), None) => result.removed.push((*path).clone()),
            (Some(da), Some(db)) if da == db => result.unchanged.push((*path).clone()),
            (Some(_), Some(_)) => {
                let binary = a.get(path).is_some_and(is_binary) || b.get(path).is_some_and(is_binary);
                result.modified.push(ModifiedFile {
                    path: (*path).clone(),
                    is_binary: binary,
                });
            }
            (None, None) => unreachable!("path came from one of the two maps"),
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Three-way diff
// ---------------------------------------------------------------------------

/// Which side of a three-way comparison deleted a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The local tree.
    Local,
    /// The remote tree.
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Per-path classification of a three-way comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreeWayClass {
    /// Neither side changed the path.
    Unchanged,
    /// Only the local side changed the path (including local deletion).
    LocalOnly,
    /// Only the remote side changed the path (including remote deletion).
    RemoteOnly,
    /// Both sides changed the path to byte-identical content (or both
    /// deleted it, or both added identical content). Auto-mergeable.
    BothSame,
    /// Both sides changed the path to different content. Conflict.
    BothDifferent,
    /// The path is absent from base and was added by both sides with
    /// different content. Conflict.
    AddedByBoth,
    /// One side deleted the path while the other modified it. Conflict.
    DeletedModified {
        /// The side that deleted the path.
        deleted_by: Side,
    },
}

impl ThreeWayClass {
    /// Returns `true` if this classification requires conflict resolution.
    #[must_use]
    pub const fn is_conflict(self) -> bool {
        matches!(
            self,
            Self::BothDifferent | Self::AddedByBoth | Self::DeletedModified { .. }
        )
    }
}

/// Result of a three-way tree comparison: one classification per path in
/// the union of the three trees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThreeWayDiff {
    entries: BTreeMap<PathBuf, ThreeWayClass>,
}

impl ThreeWayDiff {
    /// The classification for `path`, if it appears in any of the trees.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<ThreeWayClass> {
        self.entries.get(path).copied()
    }

    /// Iterate over `(path, classification)` in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, ThreeWayClass)> {
        self.entries.iter().map(|(p, c)| (p, *c))
    }

    /// Paths whose classification is a conflict, in path order.
    pub fn conflict_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries
            .iter()
            .filter(|(_, c)| c.is_conflict())
            .map(|(p, _)| p)
    }

    /// Returns `true` if no path conflicts.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.entries.values().any(|c| c.is_conflict())
    }

    /// Number of conflicting paths.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.entries.values().filter(|c| c.is_conflict()).count()
    }

    /// Total number of classified paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the union of the three trees is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classify every path in the union of `base`, `local`, and `remote` by
/// comparing `local` vs `base` and `remote` vs `base` independently, then
/// combining per the table in the module docs.
#[must_use]
pub fn three_way_diff(
    base: &ArtifactTree,
    local: &ArtifactTree,
    remote: &ArtifactTree,
) -> ThreeWayDiff {
    let base_digests = digest_map(base);
    let local_digests = digest_map(local);
    let remote_digests = digest_map(remote);

    let paths: BTreeSet<&PathBuf> = base_digests
        .keys()
        .chain(local_digests.keys())
        .chain(remote_digests.keys())
        .collect();

    let mut entries = BTreeMap::new();
    for path in paths {
        let b = base_digests.get(path);
        let l = local_digests.get(path);
        let r = remote_digests.get(path);

        let local_changed = l != b;
        let remote_changed = r != b;

        let class = match (local_changed, remote_changed) {
            (false, false) => ThreeWayClass::Unchanged,
            (true, false) => ThreeWayClass::LocalOnly,
            (false, true) => ThreeWayClass::RemoteOnly,
            (true, true) => both_changed_class(b.is_some(), l, r),
        };
        entries.insert((*path).clone(), class);
    }
    ThreeWayDiff { entries }
}

// Both sides diverged from base; decide whether they agree, conflict, or
// split on deletion.
fn both_changed_class(
    in_base: bool,
    local: Option<&[u8; 32]>,
    remote: Option<&[u8; 32]>,
) -> ThreeWayClass {
    match (local, remote) {
        // Both deleted: post-change content is identically absent.
        (None, None) => ThreeWayClass::BothSame,
        (None, Some(_)) => ThreeWayClass::DeletedModified {
            deleted_by: Side::Local,
        },
        (Some(_), None) => ThreeWayClass::DeletedModified {
            deleted_by: Side::Remote,
        },
        (Some(l), Some(r)) if l == r => ThreeWayClass::BothSame,
        (Some(_), Some(_)) if !in_base => ThreeWayClass::AddedByBoth,
        (Some(_), Some(_)) => ThreeWayClass::BothDifferent,
    }
}

fn digest_map(tree: &ArtifactTree) -> BTreeMap<PathBuf, [u8; 32]> {
    tree.iter()
        .map(|(path, bytes)| (path.clone(), file_digest(path, bytes)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
