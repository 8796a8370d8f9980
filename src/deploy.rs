//! Deployment records and drift detection.
//!
//! A deployed artifact carries one [`DeploymentRecord`] collocated with the
//! deployment target (`.trove-deployment.toml`, human-diffable TOML). The
//! record is read before every status check and rewritten atomically after
//! every successful sync or rollback.
//!
//! Drift is the divergence between the deployed copy's current content hash
//! and the record's baseline hash; combined with the collection's latest
//! snapshot it yields the four-state machine in [`DeployState`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atomic::write_atomic;
use crate::error::{Error, Result};
use crate::model::{ArtifactName, CollectionId, ContentHash, SnapshotId};
use crate::store::Snapshot;

/// File name of the deployment record within a deployment target.
pub const RECORD_FILE_NAME: &str = ".trove-deployment.toml";

// ---------------------------------------------------------------------------
// DeploymentRecord
// ---------------------------------------------------------------------------

/// Tracking metadata for one deployed artifact.
///
/// Owned by the target location, mutated only by sync/rollback operations,
/// and deleted when the artifact is undeployed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentRecord {
    /// The deployed artifact's name.
    pub artifact_name: ArtifactName,
    /// Free-form artifact type label (classification happens outside this
    /// core; the string is carried, never interpreted).
    pub artifact_type: String,
    /// The collection the artifact was deployed from.
    pub source_collection_id: CollectionId,
    /// Where the artifact was deployed.
    pub deployed_path: PathBuf,
    /// Deployment time, unix epoch milliseconds.
    pub deployed_at: u64,
    /// Hash of the tree at copy (or last reconcile) time.
    pub baseline_hash: ContentHash,
    /// The snapshot used as merge base for the next reconciliation.
    pub merge_base_snapshot_id: Option<SnapshotId>,
    /// Snapshot ids this deployment has been reconciled against, oldest
    /// first. Monotonically appended, never rewritten.
    pub version_lineage: Vec<SnapshotId>,
}

impl DeploymentRecord {
    /// Create a record for a fresh deployment of `artifact_name` copied
    /// from `source_collection_id` to `deployed_path`.
    ///
    /// `baseline_hash` is the hash of the tree at copy time; when the copy
    /// came from a snapshot, passing its id seeds both the merge base and
    /// the lineage.
    #[must_use]
    pub fn new(
        artifact_name: ArtifactName,
        artifact_type: impl Into<String>,
        source_collection_id: CollectionId,
        deployed_path: PathBuf,
        baseline_hash: ContentHash,
        source_snapshot: Option<SnapshotId>,
    ) -> Self {
        let mut record = Self {
            artifact_name,
            artifact_type: artifact_type.into(),
            source_collection_id,
            deployed_path,
            deployed_at: crate::store::now_millis(),
            baseline_hash,
            merge_base_snapshot_id: source_snapshot.clone(),
            version_lineage: Vec::new(),
        };
        if let Some(id) = source_snapshot {
            record.push_lineage(id);
        }
        record
    }

    /// The most recent lineage entry, if any.
    #[must_use]
    pub fn lineage_head(&self) -> Option<&SnapshotId> {
        self.version_lineage.last()
    }

    /// Append a snapshot id to the lineage.
    ///
    /// Appending the current head again is a no-op, so re-syncing against
    /// the same snapshot does not grow the lineage.
    pub fn push_lineage(&mut self, id: SnapshotId) {
        if self.lineage_head() != Some(&id) {
            self.version_lineage.push(id);
        }
    }

    /// Classify this deployment's drift state.
    ///
    /// `current_hash` is the hash of the live deployed tree;
    /// `latest` is the collection's most recent snapshot, if any.
    #[must_use]
    pub fn state(&self, current_hash: ContentHash, latest: Option<&Snapshot>) -> DeployState {
        let locally_modified = current_hash != self.baseline_hash;
        let newer_upstream = latest.is_some_and(|s| self.lineage_head() != Some(&s.id));
        match (locally_modified, newer_upstream) {
            (false, false) => DeployState::Synced,
            (true, false) => DeployState::Modified,
            (false, true) => DeployState::Outdated,
            (true, true) => DeployState::Conflicted,
        }
    }

    /// Path of the record file for a deployment at `target`.
    #[must_use]
    pub fn file_path(target: &Path) -> PathBuf {
        target.join(RECORD_FILE_NAME)
    }

    /// Load the record collocated with the deployment at `target`.
    ///
    /// # Errors
    /// Returns [`Error::RecordNotFound`] if no record file exists, or
    /// [`Error::Metadata`] if the file is not valid TOML.
    pub fn load(target: &Path) -> Result<Self> {
        let path = Self::file_path(target);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::RecordNotFound { path });
            }
            Err(e) => return Err(Error::Io(e)),
        };
        toml::from_str(&contents).map_err(|e| Error::Metadata {
            path,
            detail: format!("deployment record is not valid TOML: {e}"),
        })
    }

    /// Atomically rewrite the record collocated with the deployment at
    /// `target`.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on write failure.
    pub fn save(&self, target: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self).map_err(|e| Error::Metadata {
            path: Self::file_path(target),
            detail: format!("failed to serialize deployment record: {e}"),
        })?;
        write_atomic(&Self::file_path(target), toml.as_bytes())?;
        debug!(target = %target.display(), "deployment record saved");
        Ok(())
    }

    /// Delete the record file (undeploy).
    ///
    /// # Errors
    /// Returns [`Error::Io`] on removal failure; a missing file is not an
    /// error.
    pub fn delete(target: &Path) -> Result<()> {
        match fs::remove_file(Self::file_path(target)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// DeployState
// ---------------------------------------------------------------------------

/// Drift state of a deployment relative to its source collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployState {
    /// Current hash equals the most recent reconcile point.
    Synced,
    /// Local edits exist; no newer collection snapshot.
    Modified,
    /// A newer collection snapshot exists; no local edits.
    Outdated,
    /// Local edits and a newer collection snapshot exist simultaneously.
    Conflicted,
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "synced"),
            Self::Modified => write!(f, "modified"),
            Self::Outdated => write!(f, "outdated"),
            Self::Conflicted => write!(f, "conflicted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactTree, hash_tree};
    use tempfile::TempDir;

    fn sample_record() -> DeploymentRecord {
        DeploymentRecord {
            artifact_name: ArtifactName::new("commit-helper").unwrap(),
            artifact_type: "skill".to_owned(),
            source_collection_id: CollectionId::new("team-skills").unwrap(),
            deployed_path: PathBuf::from("/proj/.skills/commit-helper"),
            deployed_at: 1_750_000_000_000,
            baseline_hash: hash_tree(&ArtifactTree::from_entries([("SKILL.md", "v1")])),
            merge_base_snapshot_id: None,
            version_lineage: Vec::new(),
        }
    }

    fn snapshot_with(id: SnapshotId) -> Snapshot {
        Snapshot {
            id,
            collection_id: CollectionId::new("team-skills").unwrap(),
            created_at: 1_750_000_000_001,
            content_hash: ContentHash::EMPTY,
            archive_location: PathBuf::from("team-skills/snapshots/x.tar.gz"),
        }
    }

    // -- record file round trip --

    #[test]
    fn save_and_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut record = sample_record();
        record.push_lineage(SnapshotId::random());
        record.save(dir.path()).unwrap();

        let loaded = DeploymentRecord::load(dir.path()).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn record_file_is_human_diffable_toml() {
        let dir = TempDir::new().unwrap();
        sample_record().save(dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join(RECORD_FILE_NAME)).unwrap();
        assert!(text.contains("artifact_name = \"commit-helper\""));
        assert!(text.contains("source_collection_id = \"team-skills\""));
        assert!(text.contains("baseline_hash = "));
    }

    #[test]
    fn load_missing_record_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = DeploymentRecord::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { .. }));
    }

    #[test]
    fn load_malformed_record_is_metadata_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(RECORD_FILE_NAME), "not = [valid").unwrap();
        let err = DeploymentRecord::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));
    }

    #[test]
    fn delete_removes_record_and_tolerates_absence() {
        let dir = TempDir::new().unwrap();
        sample_record().save(dir.path()).unwrap();
        DeploymentRecord::delete(dir.path()).unwrap();
        assert!(!dir.path().join(RECORD_FILE_NAME).exists());
        DeploymentRecord::delete(dir.path()).unwrap();
    }

    // -- lineage --

    #[test]
    fn push_lineage_appends_in_order() {
        let mut record = sample_record();
        let a = SnapshotId::random();
        let b = SnapshotId::random();
        record.push_lineage(a.clone());
        record.push_lineage(b.clone());
        assert_eq!(record.version_lineage, vec![a, b.clone()]);
        assert_eq!(record.lineage_head(), Some(&b));
    }

    #[test]
    fn push_lineage_dedupes_consecutive_head() {
        let mut record = sample_record();
        let a = SnapshotId::random();
        record.push_lineage(a.clone());
        record.push_lineage(a.clone());
        assert_eq!(record.version_lineage, vec![a]);
    }

    // -- drift state machine --

    #[test]
    fn state_synced() {
        let mut record = sample_record();
        let head = SnapshotId::random();
        record.push_lineage(head.clone());
        let state = record.state(record.baseline_hash, Some(&snapshot_with(head)));
        assert_eq!(state, DeployState::Synced);
    }

    #[test]
    fn state_modified_on_local_drift() {
        let mut record = sample_record();
        let head = SnapshotId::random();
        record.push_lineage(head.clone());
        let drifted = hash_tree(&ArtifactTree::from_entries([("SKILL.md", "edited")]));
        let state = record.state(drifted, Some(&snapshot_with(head)));
        assert_eq!(state, DeployState::Modified);
    }

    #[test]
    fn state_outdated_on_newer_snapshot() {
        let mut record = sample_record();
        record.push_lineage(SnapshotId::random());
        let state = record.state(record.baseline_hash, Some(&snapshot_with(SnapshotId::random())));
        assert_eq!(state, DeployState::Outdated);
    }

    #[test]
    fn state_conflicted_on_both() {
        let mut record = sample_record();
        record.push_lineage(SnapshotId::random());
        let drifted = hash_tree(&ArtifactTree::from_entries([("SKILL.md", "edited")]));
        let state = record.state(drifted, Some(&snapshot_with(SnapshotId::random())));
        assert_eq!(state, DeployState::Conflicted);
    }

    #[test]
    fn state_with_no_snapshots_at_all() {
        let record = sample_record();
        assert_eq!(record.state(record.baseline_hash, None), DeployState::Synced);
        let drifted = hash_tree(&ArtifactTree::from_entries([("SKILL.md", "edited")]));
        assert_eq!(record.state(drifted, None), DeployState::Modified);
    }

    #[test]
    fn deploy_state_display() {
        assert_eq!(DeployState::Synced.to_string(), "synced");
        assert_eq!(DeployState::Conflicted.to_string(), "conflicted");
    }
}
