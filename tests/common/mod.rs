//! Shared test helpers for trove integration tests.
#![allow(dead_code)]
//!
//! All tests run against temp directories — no side effects outside the
//! test sandbox. Each test gets its own snapshot store via `setup_store()`
//! and, when needed, a deployed artifact via `deploy()`.

use std::path::Path;

use tempfile::TempDir;

use trove::deploy::DeploymentRecord;
use trove::model::{ArtifactName, ArtifactTree, CollectionId, SnapshotId, hash_tree};
use trove::store::{Snapshot, SnapshotStore};

/// The collection used by most tests.
pub fn collection() -> CollectionId {
    CollectionId::new("team-skills").expect("valid collection id")
}

/// Build a tree from `(path, content)` pairs.
pub fn tree(entries: &[(&str, &str)]) -> ArtifactTree {
    ArtifactTree::from_entries(entries.iter().map(|(p, c)| (*p, *c)))
}

/// A fresh store in its own temp directory.
///
/// The `TempDir` must be kept alive for the duration of the test.
pub fn setup_store() -> (TempDir, SnapshotStore) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let store = SnapshotStore::open(dir.path());
    (dir, store)
}

/// Deploy `snapshot`'s tree into a fresh target directory with a tracking
/// record, the way a deployment adapter would.
pub fn deploy(store: &SnapshotStore, snapshot: &Snapshot) -> (TempDir, DeploymentRecord) {
    let target = TempDir::new().expect("failed to create temp dir");
    let tree = store
        .restore_snapshot(&snapshot.id)
        .expect("snapshot restores");
    tree.write_to(target.path()).expect("tree writes");

    let record = DeploymentRecord::new(
        ArtifactName::new("helper").expect("valid artifact name"),
        "skill",
        snapshot.collection_id.clone(),
        target.path().to_path_buf(),
        hash_tree(&tree),
        Some(snapshot.id.clone()),
    );
    record.save(target.path()).expect("record saves");
    (target, record)
}

/// Overwrite one file inside a deployment target (a "local edit").
pub fn edit_file(target: &Path, rel: &str, content: &str) {
    let path = target.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("parent dirs");
    }
    std::fs::write(path, content).expect("edit writes");
}

/// Snapshot ids of a full pagination walk, newest first.
pub fn walk_all_ids(
    store: &SnapshotStore,
    collection: &CollectionId,
    page_size: usize,
) -> Vec<SnapshotId> {
    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .list_snapshots(collection, cursor.as_deref(), page_size)
            .expect("listing succeeds");
        ids.extend(page.items.into_iter().map(|s| s.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    ids
}
