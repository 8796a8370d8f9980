//! Version listing and change-preserving rollback.
//!
//! Rollback here is a three-way merge, not a blind restore: the target
//! snapshot is merged against the deployment's current tree using the last
//! reconciled snapshot as base, so local edits made since the last sync
//! survive the rollback wherever they don't collide with it.
//!
//! Every attempt — applied, conflicted, refused, or failed — appends one
//! entry to the collection's audit log, and every attempt that mutates the
//! deployment first captures a safety snapshot of the pre-rollback state
//! into the `rollback-safety` collection. Write ordering is fixed: safety
//! snapshot, then tree publication, then record rewrite, then audit entry.

pub mod audit;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::atomic::publish_tree;
use crate::deploy::{DeploymentRecord, RECORD_FILE_NAME};
use crate::diff::{ThreeWayClass, ThreeWayDiff, three_way_diff};
use crate::error::{Error, Result};
use crate::merge::{Conflict, MergeResult, merge};
use crate::model::{ArtifactTree, CollectionId, SnapshotId, hash_tree, load_tree};
use crate::store::{Page, Snapshot, SnapshotStore};

use audit::{RollbackAuditEntry, RollbackOutcome};

/// Collection that receives pre-rollback safety snapshots.
pub const SAFETY_COLLECTION: &str = "rollback-safety";

// ---------------------------------------------------------------------------
// RollbackSafetyAnalysis
// ---------------------------------------------------------------------------

/// Dry-run report of what a rollback would do to local changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollbackSafetyAnalysis {
    /// The snapshot the analysis was run against.
    pub target_snapshot_id: SnapshotId,
    /// `true` if the deployment carries edits made since the last
    /// reconcile; rolling back without `force` is refused in that case.
    pub would_lose_changes: bool,
    /// Paths edited locally since the last reconcile, in path order.
    pub affected_paths: Vec<PathBuf>,
    /// Paths that would conflict if the rollback were forced.
    pub conflicts_if_forced: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// RollbackResult
// ---------------------------------------------------------------------------

/// Outcome of a rollback attempt that got past the safety check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollbackResult {
    /// How the attempt ended: `Applied` or `Conflicted`.
    pub outcome: RollbackOutcome,
    /// The snapshot rolled back to.
    pub target_snapshot_id: SnapshotId,
    /// Safety snapshot of the pre-rollback deployment, when this attempt
    /// took one.
    pub safety_snapshot_id: Option<SnapshotId>,
    /// Local edits carried through the rollback, in path order.
    pub preserved_paths: Vec<PathBuf>,
    /// The underlying merge. Conflicted attempts hand this back for
    /// resolution and a later [`VersionManager::complete_rollback`].
    pub merge: MergeResult,
    /// Id of the audit entry written for this attempt.
    pub audit_entry_id: String,
}

impl RollbackResult {
    /// The tree now deployed, or `None` while conflicts remain.
    #[must_use]
    pub fn restored_tree(&self) -> Option<&ArtifactTree> {
        self.merge.merged_tree()
    }

    /// Unresolved conflicts, in path order.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        self.merge.conflicts()
    }
}

// ---------------------------------------------------------------------------
// VersionManager
// ---------------------------------------------------------------------------

/// Version history and rollback over one [`SnapshotStore`].
#[derive(Clone, Debug)]
pub struct VersionManager<'a> {
    store: &'a SnapshotStore,
}

impl<'a> VersionManager<'a> {
    /// Create a manager over `store`.
    #[must_use]
    pub fn new(store: &'a SnapshotStore) -> Self {
        Self { store }
    }

    /// List a collection's versions, newest first.
    ///
    /// # Errors
    /// Returns [`Error::Metadata`] if the collection index is malformed.
    pub fn list_versions(
        &self,
        collection: &CollectionId,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page<Snapshot>> {
        self.store.list_snapshots(collection, cursor, limit)
    }

    /// The rollback audit log for a collection, oldest entry first.
    ///
    /// # Errors
    /// Returns [`Error::Metadata`] if the log is corrupt.
    pub fn audit_log(&self, collection: &CollectionId) -> Result<Vec<RollbackAuditEntry>> {
        audit::read_log(&self.store.audit_log_path(collection))
    }

    /// Analyze what rolling `target_dir` back to `target` would do,
    /// without touching anything.
    ///
    /// # Errors
    /// Returns [`Error::SnapshotNotFound`] for an unknown target and
    /// [`Error::ReadFailure`] if the deployed tree cannot be read.
    pub fn analyze_rollback_safety(
        &self,
        target_dir: &Path,
        record: &DeploymentRecord,
        target: &SnapshotId,
    ) -> Result<RollbackSafetyAnalysis> {
        let (_, _, _, classified) = self.classify(target_dir, record, target)?;
        let affected = locally_edited_paths(&classified);
        Ok(RollbackSafetyAnalysis {
            target_snapshot_id: target.clone(),
            would_lose_changes: !affected.is_empty(),
            affected_paths: affected,
            conflicts_if_forced: classified.conflict_paths().cloned().collect(),
        })
    }

    /// Roll the deployment at `target_dir` back to snapshot `target`,
    /// preserving local edits via a three-way merge.
    ///
    /// Without `force`, a deployment carrying local edits is refused. With
    /// `force`, the rollback proceeds: non-colliding edits are carried
    /// through automatically, colliding ones come back as a `Conflicted`
    /// result whose merge must be resolved and handed to
    /// [`Self::complete_rollback`]. A conflicted attempt publishes nothing.
    ///
    /// A safety snapshot of the pre-rollback tree is taken before any
    /// mutation, so even a forced rollback is always reversible.
    ///
    /// # Errors
    /// Returns [`Error::WouldLoseChanges`] when refused, and I/O or store
    /// errors from the restore/publish steps otherwise. An audit entry is
    /// appended regardless of outcome, `Failed` entries included; once the
    /// tree has been published, a failing audit append is logged rather
    /// than propagated, so the caller never sees an applied rollback
    /// reported as an error.
    pub fn intelligent_rollback(
        &self,
        target_dir: &Path,
        record: &mut DeploymentRecord,
        target: &SnapshotId,
        force: bool,
    ) -> Result<RollbackResult> {
        let audit_path = self.store.audit_log_path(&record.source_collection_id);
        let (base, local, remote, classified) = match self.classify(target_dir, record, target) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.audit_failure(&audit_path, target, None, Vec::new());
                return Err(e);
            }
        };
        let affected = locally_edited_paths(&classified);

        if !force && !affected.is_empty() {
            let entry = RollbackAuditEntry::new(
                target.clone(),
                None,
                Vec::new(),
                classified.conflict_paths().cloned().collect(),
                RollbackOutcome::Refused,
            );
            audit::append_entry(&audit_path, &entry)?;
            info!(target = target.short(), edits = affected.len(), "rollback refused");
            return Err(Error::WouldLoseChanges { paths: affected });
        }

        // Safety snapshot before anything mutates the deployment.
        let safety = CollectionId::new(SAFETY_COLLECTION)
            .map_err(Error::from)
            .and_then(|safety_collection| self.store.create_snapshot(&safety_collection, &local));
        let safety = match safety {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.audit_failure(&audit_path, target, None, Vec::new());
                return Err(e);
            }
        };

        let result = merge(&base, &local, &remote);
        let preserved = preserved_paths(&classified);

        if result.has_conflicts() {
            let entry = RollbackAuditEntry::new(
                target.clone(),
                Some(safety.id.clone()),
                preserved.clone(),
                result.conflicts().iter().map(|c| c.path.clone()).collect(),
                RollbackOutcome::Conflicted,
            );
            audit::append_entry(&audit_path, &entry)?;
            info!(
                target = target.short(),
                conflicts = result.conflict_count(),
                "rollback conflicted, nothing published"
            );
            return Ok(RollbackResult {
                outcome: RollbackOutcome::Conflicted,
                target_snapshot_id: target.clone(),
                safety_snapshot_id: Some(safety.id),
                preserved_paths: preserved,
                merge: result,
                audit_entry_id: entry.id,
            });
        }

        let merged = result
            .merged_tree()
            .cloned()
            .ok_or(Error::ConflictPresent { count: 0 })?;
        match self.publish_and_record(target_dir, record, target, &merged) {
            Ok(()) => {
                let entry = RollbackAuditEntry::new(
                    target.clone(),
                    Some(safety.id.clone()),
                    preserved.clone(),
                    Vec::new(),
                    RollbackOutcome::Applied,
                );
                if let Err(audit_err) = audit::append_entry(&audit_path, &entry) {
                    // The tree is already published; reporting this as an
                    // error would misdescribe an applied rollback.
                    warn!(error = %audit_err, "rollback applied but audit append failed");
                }
                info!(
                    target = target.short(),
                    preserved = preserved.len(),
                    "rollback applied"
                );
                Ok(RollbackResult {
                    outcome: RollbackOutcome::Applied,
                    target_snapshot_id: target.clone(),
                    safety_snapshot_id: Some(safety.id),
                    preserved_paths: preserved,
                    merge: result,
                    audit_entry_id: entry.id,
                })
            }
            Err(e) => {
                self.audit_failure(&audit_path, target, Some(safety.id), preserved);
                Err(e)
            }
        }
    }

    /// Publish a conflicted rollback whose merge has since been fully
    /// resolved.
    ///
    /// The safety snapshot was already taken by the conflicted attempt;
    /// this step only publishes, rewrites the record, and appends the
    /// closing audit entry.
    ///
    /// # Errors
    /// Returns [`Error::ConflictPresent`] if `resolved` still carries
    /// conflicts, or I/O errors from the publish. Publish failures are
    /// audited as `Failed`; an audit append failing after a successful
    /// publish is logged, not propagated.
    pub fn complete_rollback(
        &self,
        target_dir: &Path,
        record: &mut DeploymentRecord,
        target: &SnapshotId,
        resolved: MergeResult,
    ) -> Result<RollbackResult> {
        let audit_path = self.store.audit_log_path(&record.source_collection_id);
        let merged = resolved
            .merged_tree()
            .cloned()
            .ok_or(Error::ConflictPresent {
                count: resolved.conflict_count(),
            })?;

        match self.publish_and_record(target_dir, record, target, &merged) {
            Ok(()) => {
                let entry = RollbackAuditEntry::new(
                    target.clone(),
                    None,
                    Vec::new(),
                    Vec::new(),
                    RollbackOutcome::Applied,
                );
                if let Err(audit_err) = audit::append_entry(&audit_path, &entry) {
                    warn!(error = %audit_err, "rollback applied but audit append failed");
                }
                info!(target = target.short(), "resolved rollback applied");
                Ok(RollbackResult {
                    outcome: RollbackOutcome::Applied,
                    target_snapshot_id: target.clone(),
                    safety_snapshot_id: None,
                    preserved_paths: Vec::new(),
                    merge: resolved,
                    audit_entry_id: entry.id,
                })
            }
            Err(e) => {
                self.audit_failure(&audit_path, target, None, Vec::new());
                Err(e)
            }
        }
    }

    // Append a `Failed` entry best-effort: the attempt's own error is what
    // the caller must see, so a failing append here is logged, not raised.
    fn audit_failure(
        &self,
        audit_path: &Path,
        target: &SnapshotId,
        safety: Option<SnapshotId>,
        preserved: Vec<PathBuf>,
    ) {
        let entry = RollbackAuditEntry::new(
            target.clone(),
            safety,
            preserved,
            Vec::new(),
            RollbackOutcome::Failed,
        );
        if let Err(audit_err) = audit::append_entry(audit_path, &entry) {
            warn!(error = %audit_err, "failed to record failed rollback");
        }
    }

    // Load the three trees of a rollback and classify them: base is the
    // last reconciled snapshot, local the live deployment, remote the
    // rollback target.
    fn classify(
        &self,
        target_dir: &Path,
        record: &DeploymentRecord,
        target: &SnapshotId,
    ) -> Result<(ArtifactTree, ArtifactTree, ArtifactTree, ThreeWayDiff)> {
        let base = match record
            .merge_base_snapshot_id
            .as_ref()
            .or_else(|| record.lineage_head())
        {
            Some(id) => self.store.restore_snapshot(id)?,
            None => ArtifactTree::new(),
        };
        let local = deployed_tree(target_dir)?;
        let remote = self.store.restore_snapshot(target)?;
        let classified = three_way_diff(&base, &local, &remote);
        Ok((base, local, remote, classified))
    }

    fn publish_and_record(
        &self,
        target_dir: &Path,
        record: &mut DeploymentRecord,
        target: &SnapshotId,
        tree: &ArtifactTree,
    ) -> Result<()> {
        // The publish wipes the deployment directory, record file included,
        // so the record rewrite must come second.
        publish_tree(tree, target_dir)?;
        record.baseline_hash = hash_tree(tree);
        record.merge_base_snapshot_id = Some(target.clone());
        record.push_lineage(target.clone());
        record.save(target_dir)
    }
}

/// The live deployed tree, minus the deployment record file.
fn deployed_tree(target_dir: &Path) -> Result<ArtifactTree> {
    let mut tree = load_tree(target_dir)?;
    tree.remove(Path::new(RECORD_FILE_NAME));
    Ok(tree)
}

fn locally_edited_paths(classified: &ThreeWayDiff) -> Vec<PathBuf> {
    classified
        .iter()
        .filter(|(_, class)| {
            !matches!(class, ThreeWayClass::Unchanged | ThreeWayClass::RemoteOnly)
        })
        .map(|(path, _)| path.clone())
        .collect()
}

fn preserved_paths(classified: &ThreeWayDiff) -> Vec<PathBuf> {
    classified
        .iter()
        .filter(|(_, class)| {
            matches!(class, ThreeWayClass::LocalOnly | ThreeWayClass::BothSame)
        })
        .map(|(path, _)| path.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
