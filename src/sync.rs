//! Sync routing: which reconciliation strategy applies to which endpoint
//! pair.
//!
//! A sync always reconciles two endpoints through a common merge base, but
//! the right conflict posture depends on the direction. Local project edits
//! are high-value, so pulling them into a collection defaults to asking;
//! a collection tracking its upstream defaults to merging. The router maps
//! a direction to a policy and dispatches to the merge engine, with `skip`
//! and `fork` policies absorbing conflicts instead of surfacing them.
//!
//! Everything here is in-memory; the caller publishes outcomes with
//! [`crate::atomic::publish_tree`] or [`crate::store::SnapshotStore`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::{ThreeWayClass, three_way_diff};
use crate::error::Result;
use crate::merge::{MergeResult, Resolution, merge};
use crate::model::{ArtifactName, ArtifactTree};

// ---------------------------------------------------------------------------
// Direction and policy
// ---------------------------------------------------------------------------

/// Which pair of endpoints a sync reconciles, and which way content flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    /// Local project edits flow back into the collection.
    ProjectToCollection,
    /// Collection updates flow out to a project deployment.
    CollectionToProject,
    /// Upstream updates flow into the tracking collection.
    UpstreamToCollection,
    /// Collection changes are proposed to the upstream source.
    CollectionToUpstream,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectToCollection => write!(f, "project-to-collection"),
            Self::CollectionToProject => write!(f, "collection-to-project"),
            Self::UpstreamToCollection => write!(f, "upstream-to-collection"),
            Self::CollectionToUpstream => write!(f, "collection-to-upstream"),
        }
    }
}

/// What to do when a sync hits conflicting changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Merge; conflicts are surfaced for resolution.
    Merge,
    /// Duplicate the artifact under a fork name instead of conflicting.
    Fork,
    /// Apply clean changes, leave conflicting paths at their current
    /// local content.
    Skip,
    /// Hand conflicts back to the caller for an interactive decision.
    Ask,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Fork => write!(f, "fork"),
            Self::Skip => write!(f, "skip"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// A direction paired with its conflict policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncMergeStrategy {
    /// The endpoint pair being reconciled.
    pub direction: SyncDirection,
    /// The conflict posture for that pair.
    pub conflict_policy: ConflictPolicy,
}

/// The default conflict policy for a direction.
///
/// Project edits are high-value and never clobbered silently, so pulling
/// them into a collection asks. Every other direction follows the flow:
/// deployments and collections are expected to track their source, so they
/// merge by default. `fork` and `skip` are explicit caller overrides, never
/// recommended.
#[must_use]
pub fn get_recommended_strategy(direction: SyncDirection) -> SyncMergeStrategy {
    let conflict_policy = match direction {
        SyncDirection::ProjectToCollection => ConflictPolicy::Ask,
        SyncDirection::CollectionToProject
        | SyncDirection::UpstreamToCollection
        | SyncDirection::CollectionToUpstream => ConflictPolicy::Merge,
    };
    SyncMergeStrategy {
        direction,
        conflict_policy,
    }
}

// ---------------------------------------------------------------------------
// SyncOutcome
// ---------------------------------------------------------------------------

/// What a routed sync produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The merge ran under the `merge` policy; it may carry conflicts for
    /// the caller to resolve.
    Merged(MergeResult),
    /// Conflicts exist and the `ask` policy defers them to the caller. The
    /// merge carries the conflicts and the marker working copy.
    NeedsInput(MergeResult),
    /// The `skip` policy applied clean changes and left conflicting paths
    /// at their local content. The result is always conflict-free.
    Skipped {
        /// The conflict-free merge with skipped paths at local content.
        result: MergeResult,
        /// Paths left untouched because they conflicted, in path order.
        skipped_paths: Vec<PathBuf>,
    },
    /// The `fork` policy split the artifact instead of conflicting: the
    /// primary keeps the remote side, the fork keeps the local side.
    Forked {
        /// The remote tree, to continue under the original name.
        primary: ArtifactTree,
        /// The local tree, to continue under the fork name.
        fork: ArtifactTree,
        /// Generated name for the fork.
        fork_name: ArtifactName,
    },
}

// ---------------------------------------------------------------------------
// route_sync_merge
// ---------------------------------------------------------------------------

/// Run a sync merge under the recommended strategy for `direction`.
///
/// `artifact_name` seeds the fork name when the `fork` policy fires; it is
/// unused otherwise.
///
/// # Errors
/// Returns a validation error only if a generated fork name is invalid,
/// which cannot happen for names produced by [`fork_artifact_name`].
pub fn route_sync_merge(
    direction: SyncDirection,
    artifact_name: &ArtifactName,
    base: &ArtifactTree,
    local: &ArtifactTree,
    remote: &ArtifactTree,
) -> Result<SyncOutcome> {
    let strategy = get_recommended_strategy(direction);
    apply_policy(strategy.conflict_policy, artifact_name, base, local, remote)
}

/// Run a sync merge under an explicit policy, bypassing the
/// recommendation table.
///
/// # Errors
/// See [`route_sync_merge`].
pub fn apply_policy(
    policy: ConflictPolicy,
    artifact_name: &ArtifactName,
    base: &ArtifactTree,
    local: &ArtifactTree,
    remote: &ArtifactTree,
) -> Result<SyncOutcome> {
    let result = merge(base, local, remote);
    debug!(
        policy = %policy,
        conflicts = result.conflict_count(),
        "sync merge routed"
    );

    let outcome = match policy {
        ConflictPolicy::Merge => SyncOutcome::Merged(result),
        ConflictPolicy::Ask => {
            if result.has_conflicts() {
                SyncOutcome::NeedsInput(result)
            } else {
                SyncOutcome::Merged(result)
            }
        }
        ConflictPolicy::Skip => {
            let skipped_paths: Vec<PathBuf> =
                result.conflicts().iter().map(|c| c.path.clone()).collect();
            let mut result = result;
            for path in &skipped_paths {
                result = result.resolve(path, Resolution::Local)?;
            }
            SyncOutcome::Skipped {
                result,
                skipped_paths,
            }
        }
        ConflictPolicy::Fork => {
            if result.has_conflicts() {
                SyncOutcome::Forked {
                    primary: remote.clone(),
                    fork: local.clone(),
                    fork_name: fork_artifact_name(artifact_name)?,
                }
            } else {
                SyncOutcome::Merged(result)
            }
        }
    };
    Ok(outcome)
}

/// Generate a fork name: the original name with a `-fork-<hex>` suffix,
/// truncated so the result stays within the name length limit.
///
/// # Errors
/// Never fails in practice; the generated name is built from an already
/// valid name plus a valid suffix.
pub fn fork_artifact_name(name: &ArtifactName) -> Result<ArtifactName> {
    let suffix = format!("-fork-{:04x}", rand::random::<u16>());
    let budget = ArtifactName::MAX_LEN - suffix.len();
    let stem = name
        .as_str()
        .chars()
        .take(budget)
        .collect::<String>()
        .trim_end_matches(['-', '_'])
        .to_owned();
    Ok(ArtifactName::new(&format!("{stem}{suffix}"))?)
}

// ---------------------------------------------------------------------------
// Dry-run analysis and preview
// ---------------------------------------------------------------------------

/// Read-only report of what a sync merge would do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeSafetyAnalysis {
    /// `true` if the merge would complete without conflicts.
    pub is_clean: bool,
    /// Number of changes the merge would apply automatically.
    pub auto_applicable: usize,
    /// Paths that would conflict, in path order.
    pub conflict_paths: Vec<PathBuf>,
}

/// Classify a merge without building any tree.
#[must_use]
pub fn analyze_merge_safety(
    base: &ArtifactTree,
    local: &ArtifactTree,
    remote: &ArtifactTree,
) -> MergeSafetyAnalysis {
    let classified = three_way_diff(base, local, remote);
    let auto_applicable = classified
        .iter()
        .filter(|(_, class)| {
            matches!(
                class,
                ThreeWayClass::LocalOnly | ThreeWayClass::RemoteOnly | ThreeWayClass::BothSame
            )
        })
        .count();
    MergeSafetyAnalysis {
        is_clean: classified.is_clean(),
        auto_applicable,
        conflict_paths: classified.conflict_paths().cloned().collect(),
    }
}

/// One changed path in a merge preview.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewEntry {
    /// Path relative to the tree root.
    pub path: PathBuf,
    /// Three-way classification of the change.
    pub class: ThreeWayClass,
    /// Unified diff of the local side against base, for text content.
    pub local_diff: Option<String>,
    /// Unified diff of the remote side against base, for text content.
    pub remote_diff: Option<String>,
}

/// Read-only rendering of every change a merge would touch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergePreview {
    /// One entry per changed path, in path order; unchanged paths omitted.
    pub entries: Vec<PreviewEntry>,
    /// Number of entries that would conflict.
    pub conflict_count: usize,
}

/// Render unified diffs for every path a merge would change, without
/// building or writing any tree.
#[must_use]
pub fn get_merge_preview(
    base: &ArtifactTree,
    local: &ArtifactTree,
    remote: &ArtifactTree,
) -> MergePreview {
    let classified = three_way_diff(base, local, remote);
    let mut entries = Vec::new();
    let mut conflict_count = 0usize;

    for (path, class) in classified.iter() {
        if class == ThreeWayClass::Unchanged {
            continue;
        }
        if class.is_conflict() {
            conflict_count += 1;
        }
        let base_text = text_of(base.get(path));
        entries.push(PreviewEntry {
            path: path.clone(),
            class,
            local_diff: unified_diff(base_text, text_of(local.get(path)), class, true),
            remote_diff: unified_diff(base_text, text_of(remote.get(path)), class, false),
        });
    }
    MergePreview {
        entries,
        conflict_count,
    }
}

fn text_of(bytes: Option<&[u8]>) -> Option<&str> {
    let bytes = bytes?;
    if crate::diff::is_binary(bytes) {
        return None;
    }
    std::str::from_utf8(bytes).ok()
}

// A side's diff is rendered only when that side actually changed; the
// other side's column stays empty so previews read as two clean columns.
fn unified_diff(
    base: Option<&str>,
    side: Option<&str>,
    class: ThreeWayClass,
    is_local: bool,
) -> Option<String> {
    let side_changed = match class {
        ThreeWayClass::Unchanged => false,
        ThreeWayClass::LocalOnly => is_local,
        ThreeWayClass::RemoteOnly => !is_local,
        ThreeWayClass::BothSame
        | ThreeWayClass::BothDifferent
        | ThreeWayClass::AddedByBoth => true,
        ThreeWayClass::DeletedModified { deleted_by } => match deleted_by {
            crate::diff::Side::Local => !is_local,
            crate::diff::Side::Remote => is_local,
        },
    };
    if !side_changed {
        return None;
    }
    let patch = diffy::create_patch(base.unwrap_or(""), side?);
    Some(patch.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
