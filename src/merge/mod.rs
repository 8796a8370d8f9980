//! Three-way merge engine: auto-merge plus conflict-marker generation.
//!
//! [`merge`] runs a three-way diff and builds a candidate tree in memory:
//! local-only and remote-only changes are applied automatically, both-
//! changed-same is applied once, and every conflicting classification
//! produces a [`Conflict`]. Conflicted text paths are written into the
//! working copy with diff3-style markers delimiting the local, base, and
//! remote sections; binary conflicts are flagged with no markers, and
//! delete/modify conflicts keep the surviving modified side in the working
//! copy until resolved.
//!
//! The merged tree is only exposed once every conflict is resolved — a
//! [`MergeResult`] with conflicts never yields a usable tree. Nothing here
//! touches disk; publishing the merged tree atomically is the caller's job
//! (via [`crate::atomic::publish_tree`]).

mod resolve;

pub use resolve::Resolution;

use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::diff::{self, ThreeWayClass, three_way_diff};
use crate::error::{Error, Result};
use crate::model::ArtifactTree;

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// Classification of a single merge conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides changed a binary file differently; no markers possible.
    Content,
    /// One side deleted the path while the other modified it.
    Deletion,
    /// Both sides added the path with different content.
    AddAdd,
    /// Both sides modified a text file differently.
    BothModified,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => write!(f, "binary content conflict"),
            Self::Deletion => write!(f, "deleted by one side, modified by the other"),
            Self::AddAdd => write!(f, "added by both sides with different content"),
            Self::BothModified => write!(f, "both sides modified"),
        }
    }
}

/// One unresolved merge conflict, carrying all three sides' content so
/// resolution needs no re-read of any tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    /// Path relative to the tree root.
    pub path: PathBuf,
    /// What kind of conflict this is.
    pub kind: ConflictKind,
    /// `true` if any side's content looks binary.
    pub is_binary: bool,
    /// `true` if a clean line-level merge of the two text edits exists;
    /// when set, [`Conflict::suggested`] holds that merge.
    pub auto_mergeable: bool,
    /// Base content (`None` if the path was absent from base).
    pub base: Option<Vec<u8>>,
    /// Local content (`None` if the local side deleted the path).
    pub local: Option<Vec<u8>>,
    /// Remote content (`None` if the remote side deleted the path).
    pub remote: Option<Vec<u8>>,
    /// A clean line-level merge of local and remote against base, when the
    /// edits touch disjoint line ranges. Resolve with
    /// `Resolution::Custom(suggested)` to accept it.
    pub suggested: Option<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// MergeResult
// ---------------------------------------------------------------------------

/// Outcome of a three-way merge.
///
/// Holds the candidate tree (with conflict markers at conflicted text
/// paths) and the list of unresolved conflicts. The candidate is only
/// exposed as a merged tree once the conflict list is empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeResult {
    pub(crate) candidate: ArtifactTree,
    pub(crate) conflicts: Vec<Conflict>,
    pub(crate) applied_count: usize,
}

impl MergeResult {
    /// Unresolved conflicts, in path order.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Number of unresolved conflicts.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Number of changes applied automatically (plus resolutions accepted
    /// so far).
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied_count
    }

    /// Returns `true` if conflicts remain.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// The merged tree, or `None` while any conflict remains unresolved.
    #[must_use]
    pub fn merged_tree(&self) -> Option<&ArtifactTree> {
        if self.conflicts.is_empty() {
            Some(&self.candidate)
        } else {
            None
        }
    }

    /// Consume the result, yielding the merged tree.
    ///
    /// # Errors
    /// Returns [`Error::ConflictPresent`] if any conflict remains.
    pub fn into_merged_tree(self) -> Result<ArtifactTree> {
        if self.conflicts.is_empty() {
            Ok(self.candidate)
        } else {
            Err(Error::ConflictPresent {
                count: self.conflicts.len(),
            })
        }
    }

    /// The in-progress working copy, including conflict markers at
    /// conflicted text paths. Useful for writing a resolution workspace;
    /// never suitable for publication while conflicts remain.
    #[must_use]
    pub fn working_copy(&self) -> &ArtifactTree {
        &self.candidate
    }
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// Three-way merge of `local` and `remote` against their common ancestor
/// `base`.
///
/// Non-conflicting classifications are applied to the candidate tree;
/// conflicting ones emit a [`Conflict`] each. The candidate is fully
/// materialized in memory — nothing is written to disk.
#[must_use]
pub fn merge(base: &ArtifactTree, local: &ArtifactTree, remote: &ArtifactTree) -> MergeResult {
    let classified = three_way_diff(base, local, remote);

    let mut candidate = base.clone();
    let mut conflicts = Vec::new();
    let mut applied_count = 0usize;

    for (path, class) in classified.iter() {
        match class {
            ThreeWayClass::Unchanged => {}
            ThreeWayClass::LocalOnly | ThreeWayClass::BothSame => {
                apply_side(&mut candidate, path, local.get(path));
                applied_count += 1;
            }
            ThreeWayClass::RemoteOnly => {
                apply_side(&mut candidate, path, remote.get(path));
                applied_count += 1;
            }
            ThreeWayClass::BothDifferent
            | ThreeWayClass::AddedByBoth
            | ThreeWayClass::DeletedModified { .. } => {
                let conflict = build_conflict(path.clone(), class, base, local, remote);
                if conflict.kind == ConflictKind::Deletion {
                    // No markers; the working copy keeps the surviving
                    // modified side so its content stays visible while the
                    // conflict is resolved.
                    apply_side(&mut candidate, path, local.get(path).or_else(|| remote.get(path)));
                } else if conflict.is_binary {
                    // No markers for binary conflicts; the working copy
                    // keeps the local side.
                    apply_side(&mut candidate, path, local.get(path));
                } else {
                    let markers = conflict_markers(
                        conflict.base.as_deref(),
                        conflict.local.as_deref(),
                        conflict.remote.as_deref(),
                    );
                    candidate.insert(path.clone(), markers);
                }
                conflicts.push(conflict);
            }
        }
    }

    debug!(
        applied = applied_count,
        conflicts = conflicts.len(),
        "three-way merge classified"
    );
    MergeResult {
        candidate,
        conflicts,
        applied_count,
    }
}

fn apply_side(candidate: &mut ArtifactTree, path: &PathBuf, content: Option<&[u8]>) {
    match content {
        Some(bytes) => candidate.insert(path.clone(), bytes.to_vec()),
        None => {
            candidate.remove(path);
        }
    }
}

fn build_conflict(
    path: PathBuf,
    class: ThreeWayClass,
    base: &ArtifactTree,
    local: &ArtifactTree,
    remote: &ArtifactTree,
) -> Conflict {
    let base_content = base.get(&path).map(<[u8]>::to_vec);
    let local_content = local.get(&path).map(<[u8]>::to_vec);
    let remote_content = remote.get(&path).map(<[u8]>::to_vec);

    let is_binary = [&base_content, &local_content, &remote_content]
        .into_iter()
        .flatten()
        .any(|bytes| diff::is_binary(bytes));

    let kind = match class {
        ThreeWayClass::AddedByBoth => ConflictKind::AddAdd,
        ThreeWayClass::DeletedModified { .. } => ConflictKind::Deletion,
        _ if is_binary => ConflictKind::Content,
        _ => ConflictKind::BothModified,
    };

    // A clean line-level merge only makes sense when all three sides are
    // present text.
    let suggested = if is_binary {
        None
    } else {
        try_line_merge(
            base_content.as_deref(),
            local_content.as_deref(),
            remote_content.as_deref(),
        )
    };

    Conflict {
        path,
        kind,
        is_binary,
        auto_mergeable: suggested.is_some(),
        base: base_content,
        local: local_content,
        remote: remote_content,
        suggested,
    }
}

// Attempt a diff3 line merge; `Some` only when the edits touch disjoint
// line ranges.
fn try_line_merge(
    base: Option<&[u8]>,
    local: Option<&[u8]>,
    remote: Option<&[u8]>,
) -> Option<Vec<u8>> {
    let base = std::str::from_utf8(base?).ok()?;
    let local = std::str::from_utf8(local?).ok()?;
    let remote = std::str::from_utf8(remote?).ok()?;
    diffy::merge(base, local, remote).ok().map(String::into_bytes)
}

/// Diff3-style whole-file markers delimiting the local, base, and remote
/// sections of a conflicted text file.
fn conflict_markers(base: Option<&[u8]>, local: Option<&[u8]>, remote: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<<<<<<< local\n");
    push_section(&mut out, local);
    out.extend_from_slice(b"||||||| base\n");
    push_section(&mut out, base);
    out.extend_from_slice(b"=======\n");
    push_section(&mut out, remote);
    out.extend_from_slice(b">>>>>>> remote\n");
    out
}

fn push_section(out: &mut Vec<u8>, content: Option<&[u8]>) {
    if let Some(bytes) = content {
        out.extend_from_slice(bytes);
        if !bytes.ends_with(b"\n") && !bytes.is_empty() {
            out.push(b'\n');
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn tree(entries: &[(&str, &str)]) -> ArtifactTree {
        ArtifactTree::from_entries(entries.iter().map(|(p, c)| (*p, *c)))
    }

    #[test]
    fn clean_merge_combines_both_sides() {
        let base = tree(&[("shared.md", "v1")]);
        let local = tree(&[("shared.md", "v1"), ("local.md", "mine")]);
        let remote = tree(&[("shared.md", "v2")]);

        let result = merge(&base, &local, &remote);
        assert_eq!(result.conflict_count(), 0);
        assert_eq!(result.applied_count(), 2);

        let merged = result.merged_tree().expect("clean merge yields a tree");
        assert_eq!(merged.get(Path::new("shared.md")), Some(b"v2".as_slice()));
        assert_eq!(merged.get(Path::new("local.md")), Some(b"mine".as_slice()));
    }

    #[test]
    fn clean_merge_applies_deletions() {
        let base = tree(&[("keep.md", "x"), ("gone.md", "y")]);
        let local = tree(&[("keep.md", "x")]);
        let remote = base.clone();

        let result = merge(&base, &local, &remote);
        let merged = result.merged_tree().expect("clean");
        assert!(!merged.contains(Path::new("gone.md")));
        assert!(merged.contains(Path::new("keep.md")));
    }

    #[test]
    fn both_changed_same_applied_once() {
        let base = tree(&[("a.md", "v1")]);
        let both = tree(&[("a.md", "v2")]);
        let result = merge(&base, &both, &both);
        assert_eq!(result.conflict_count(), 0);
        assert_eq!(result.applied_count(), 1);
        assert_eq!(
            result.merged_tree().expect("clean").get(Path::new("a.md")),
            Some(b"v2".as_slice())
        );
    }

    #[test]
    fn conflicting_merge_exposes_no_tree() {
        let base = tree(&[("a.md", "v1\n")]);
        let local = tree(&[("a.md", "v1-local\n")]);
        let remote = tree(&[("a.md", "v2\n")]);

        let result = merge(&base, &local, &remote);
        assert_eq!(result.conflict_count(), 1);
        assert!(result.merged_tree().is_none());
        assert!(matches!(
            result.into_merged_tree(),
            Err(Error::ConflictPresent { count: 1 })
        ));
    }

    #[test]
    fn text_conflict_writes_markers_into_working_copy() {
        let base = tree(&[("a.md", "v1\n")]);
        let local = tree(&[("a.md", "v1-local\n")]);
        let remote = tree(&[("a.md", "v2\n")]);

        let result = merge(&base, &local, &remote);
        let working = result.working_copy().get(Path::new("a.md")).expect("present");
        let text = std::str::from_utf8(working).expect("utf8");
        assert!(text.contains("<<<<<<< local"));
        assert!(text.contains("v1-local"));
        assert!(text.contains("||||||| base"));
        assert!(text.contains("v1\n"));
        assert!(text.contains("======="));
        assert!(text.contains("v2"));
        assert!(text.contains(">>>>>>> remote"));
    }

    #[test]
    fn conflict_kind_both_modified_for_text() {
        let base = tree(&[("a.md", "v1\n")]);
        let local = tree(&[("a.md", "L\n")]);
        let remote = tree(&[("a.md", "R\n")]);
        let result = merge(&base, &local, &remote);
        let c = &result.conflicts()[0];
        assert_eq!(c.kind, ConflictKind::BothModified);
        assert!(!c.is_binary);
        assert_eq!(c.base.as_deref(), Some(b"v1\n".as_slice()));
        assert_eq!(c.local.as_deref(), Some(b"L\n".as_slice()));
        assert_eq!(c.remote.as_deref(), Some(b"R\n".as_slice()));
    }

    #[test]
    fn binary_conflict_is_flagged_without_markers() {
        let base = ArtifactTree::from_entries([("blob.bin", b"\x00base".to_vec())]);
        let local = ArtifactTree::from_entries([("blob.bin", b"\x00local".to_vec())]);
        let remote = ArtifactTree::from_entries([("blob.bin", b"\x00remote".to_vec())]);

        let result = merge(&base, &local, &remote);
        let c = &result.conflicts()[0];
        assert_eq!(c.kind, ConflictKind::Content);
        assert!(c.is_binary);
        assert!(!c.auto_mergeable);
        assert!(c.suggested.is_none());
        // Working copy keeps the local side untouched, no markers.
        assert_eq!(
            result.working_copy().get(Path::new("blob.bin")),
            Some(b"\x00local".as_slice())
        );
    }

    #[test]
    fn add_add_conflict_kind() {
        let base = ArtifactTree::new();
        let local = tree(&[("new.md", "mine\n")]);
        let remote = tree(&[("new.md", "theirs\n")]);
        let result = merge(&base, &local, &remote);
        let c = &result.conflicts()[0];
        assert_eq!(c.kind, ConflictKind::AddAdd);
        assert!(c.base.is_none());
        // No base to merge against, so no suggestion.
        assert!(c.suggested.is_none());
    }

    #[test]
    fn delete_modify_conflict_kind() {
        let base = tree(&[("a.md", "v1\n")]);
        let local = ArtifactTree::new();
        let remote = tree(&[("a.md", "v2\n")]);
        let result = merge(&base, &local, &remote);
        let c = &result.conflicts()[0];
        assert_eq!(c.kind, ConflictKind::Deletion);
        assert!(c.local.is_none());
        assert_eq!(c.remote.as_deref(), Some(b"v2\n".as_slice()));
    }

    #[test]
    fn delete_modify_working_copy_keeps_the_surviving_side() {
        let base = tree(&[("a.md", "v1\n")]);
        let modified = tree(&[("a.md", "v2\n")]);
        let deleted = ArtifactTree::new();

        // Local deleted: the remote edit stays visible for resolution.
        let result = merge(&base, &deleted, &modified);
        assert_eq!(
            result.working_copy().get(Path::new("a.md")),
            Some(b"v2\n".as_slice())
        );

        // Remote deleted: the local edit stays visible.
        let result = merge(&base, &modified, &deleted);
        assert_eq!(
            result.working_copy().get(Path::new("a.md")),
            Some(b"v2\n".as_slice())
        );

        // Resolving toward the deletion still removes the path.
        let resolved = merge(&base, &deleted, &modified)
            .resolve(Path::new("a.md"), Resolution::Local)
            .unwrap();
        assert!(!resolved.merged_tree().unwrap().contains(Path::new("a.md")));
    }

    #[test]
    fn disjoint_line_edits_are_flagged_auto_mergeable() {
        let base = tree(&[("doc.md", "intro\n\nmiddle\n\noutro\n")]);
        let local = tree(&[("doc.md", "intro EDITED\n\nmiddle\n\noutro\n")]);
        let remote = tree(&[("doc.md", "intro\n\nmiddle\n\noutro EDITED\n")]);

        let result = merge(&base, &local, &remote);
        assert_eq!(result.conflict_count(), 1, "file-level classification still conflicts");
        let c = &result.conflicts()[0];
        assert!(c.auto_mergeable);
        let suggested = std::str::from_utf8(c.suggested.as_deref().expect("suggested")).expect("utf8");
        assert!(suggested.contains("intro EDITED"));
        assert!(suggested.contains("outro EDITED"));
        assert!(!suggested.contains("<<<<<<<"));
    }

    #[test]
    fn overlapping_line_edits_are_not_auto_mergeable() {
        let base = tree(&[("doc.md", "line\n")]);
        let local = tree(&[("doc.md", "line local\n")]);
        let remote = tree(&[("doc.md", "line remote\n")]);
        let result = merge(&base, &local, &remote);
        assert!(!result.conflicts()[0].auto_mergeable);
    }

    #[test]
    fn applied_and_conflict_counts_are_exact() {
        let base = tree(&[("a.md", "1\n"), ("b.md", "1\n"), ("c.md", "1\n")]);
        let local = tree(&[("a.md", "L\n"), ("b.md", "1\n"), ("c.md", "X\n")]);
        let remote = tree(&[("a.md", "1\n"), ("b.md", "R\n"), ("c.md", "Y\n")]);

        let result = merge(&base, &local, &remote);
        assert_eq!(result.applied_count(), 2); // a.md local, b.md remote
        assert_eq!(result.conflict_count(), 1); // c.md
    }

    #[test]
    fn merge_of_empty_trees_is_empty() {
        let empty = ArtifactTree::new();
        let result = merge(&empty, &empty, &empty);
        assert_eq!(result.applied_count(), 0);
        let merged = result.merged_tree().expect("clean");
        assert!(merged.is_empty());
    }

    #[test]
    fn markers_terminate_sections_missing_trailing_newline() {
        let base = tree(&[("a.md", "v1")]); // no trailing newline
        let local = tree(&[("a.md", "L")]);
        let remote = tree(&[("a.md", "R")]);
        let result = merge(&base, &local, &remote);
        let text = String::from_utf8(
            result
                .working_copy()
                .get(Path::new("a.md"))
                .expect("present")
                .to_vec(),
        )
        .expect("utf8");
        assert!(text.contains("L\n|||||||"));
        assert!(text.contains("v1\n======="));
        assert!(text.contains("R\n>>>>>>>"));
    }
}
