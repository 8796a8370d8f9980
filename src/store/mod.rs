//! Immutable, content-addressed snapshot store.
//!
//! One directory per collection:
//!
//! ```text
//! <root>/<collection>/snapshots/<id>.tar.gz   ← immutable archives
//! <root>/<collection>/index.json              ← snapshot metadata
//! <root>/<collection>/audit.jsonl             ← rollback audit log (append-only)
//! ```
//!
//! Snapshots are never mutated after creation and never deleted by this
//! core. Every durable write goes through [`crate::atomic`]: the archive is
//! published before the index references it, so a crash mid-create leaves
//! at worst an orphan archive, never a visible snapshot without content.
//!
//! The store assumes single-writer-per-collection discipline from the
//! caller; reads need no lock and tolerate concurrent appends.

pub mod archive;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::atomic::write_atomic;
use crate::error::{Error, Result};
use crate::model::hash::hash_tree;
use crate::model::{ArtifactTree, CollectionId, ContentHash, SnapshotId};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Metadata for one immutable snapshot of a collection's state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique id assigned at creation.
    pub id: SnapshotId,
    /// The collection this snapshot belongs to.
    pub collection_id: CollectionId,
    /// Creation time, unix epoch milliseconds.
    pub created_at: u64,
    /// Hash of the archived tree.
    pub content_hash: ContentHash,
    /// Archive path relative to the store root (so a store directory can be
    /// moved wholesale without breaking its snapshots).
    pub archive_location: PathBuf,
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// One page of a cursor-based listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    /// The items on this page, newest first.
    pub items: Vec<T>,
    /// Opaque cursor for the next page; `None` when this page is the last.
    pub next_cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Filesystem-backed snapshot store rooted at a single directory.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Open a store rooted at `root`. The directory is created lazily on
    /// first write; opening never touches disk.
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the hash of `tree`, write an immutable archive, and record
    /// the snapshot's metadata in the collection index.
    ///
    /// The archive is published atomically before the index is rewritten,
    /// so a crash between the two leaves the prior index intact.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on any archive or index write failure.
    pub fn create_snapshot(
        &self,
        collection: &CollectionId,
        tree: &ArtifactTree,
    ) -> Result<Snapshot> {
        let content_hash = hash_tree(tree);
        let id = SnapshotId::random();
        let created_at = now_millis();
        let rel_location = Path::new(collection.as_str())
            .join("snapshots")
            .join(format!("{id}.tar.gz"));

        let archive_bytes = archive::pack_tree(tree)?;
        write_atomic(&self.root.join(&rel_location), &archive_bytes)?;

        let snapshot = Snapshot {
            id,
            collection_id: collection.clone(),
            created_at,
            content_hash,
            archive_location: rel_location,
        };

        let mut index = self.read_index(collection)?;
        index.push(snapshot.clone());
        self.write_index(collection, &index)?;

        info!(
            collection = %collection,
            snapshot = snapshot.id.short(),
            hash = %content_hash.short(),
            files = tree.len(),
            "snapshot created"
        );
        Ok(snapshot)
    }

    /// Look up a snapshot by id across all collections.
    ///
    /// # Errors
    /// Returns [`Error::SnapshotNotFound`] if no collection's index lists
    /// the id.
    pub fn get_snapshot(&self, id: &SnapshotId) -> Result<Snapshot> {
        for collection in self.collection_ids()? {
            if let Some(found) = self
                .read_index(&collection)?
                .into_iter()
                .find(|s| &s.id == id)
            {
                return Ok(found);
            }
        }
        Err(Error::SnapshotNotFound { id: id.clone() })
    }

    /// List a collection's snapshots, newest first, with cursor-based
    /// pagination.
    ///
    /// The cursor is opaque (internally: the last id of the previous page)
    /// and stays valid across append-only growth — new snapshots sort
    /// before the cursor position and never shift it. A cursor that no
    /// longer matches any snapshot yields an empty page. A `limit` of zero
    /// is degenerate: it yields an empty page with no cursor regardless of
    /// how many snapshots exist, so a walk driven by it terminates rather
    /// than spinning in place.
    ///
    /// # Errors
    /// Returns [`Error::Metadata`] if the collection index is malformed.
    pub fn list_snapshots(
        &self,
        collection: &CollectionId,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page<Snapshot>> {
        let mut index = self.read_index(collection)?;
        // Newest first; id breaks ties so ordering is total and stable.
        index.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));

        let start = match cursor {
            None => 0,
            Some(cursor) => match index.iter().position(|s| s.id.as_str() == cursor) {
                Some(pos) => pos + 1,
                None => index.len(),
            },
        };

        let items: Vec<Snapshot> = index.iter().skip(start).take(limit).cloned().collect();
        let next_cursor = if start + items.len() < index.len() {
            items.last().map(|s| s.id.as_str().to_owned())
        } else {
            None
        };
        Ok(Page { items, next_cursor })
    }

    /// The most recently created snapshot of a collection, if any.
    ///
    /// # Errors
    /// Returns [`Error::Metadata`] if the collection index is malformed.
    pub fn latest_snapshot(&self, collection: &CollectionId) -> Result<Option<Snapshot>> {
        Ok(self
            .list_snapshots(collection, None, 1)?
            .items
            .into_iter()
            .next())
    }

    /// Restore a snapshot's tree from its archive.
    ///
    /// The read path is self-verifying: the restored tree is re-hashed and
    /// compared against the hash recorded at creation.
    ///
    /// # Errors
    /// Returns [`Error::SnapshotNotFound`] for an unknown id,
    /// [`Error::ReadFailure`] if the archive cannot be read, and
    /// [`Error::Corrupt`] if the recomputed hash mismatches.
    pub fn restore_snapshot(&self, id: &SnapshotId) -> Result<ArtifactTree> {
        let snapshot = self.get_snapshot(id)?;
        let archive_path = self.root.join(&snapshot.archive_location);
        let bytes = fs::read(&archive_path).map_err(|source| Error::ReadFailure {
            path: archive_path,
            source,
        })?;
        let tree = archive::unpack_tree(&bytes)?;

        let actual = hash_tree(&tree);
        if actual != snapshot.content_hash {
            return Err(Error::Corrupt {
                snapshot_id: snapshot.id,
                expected: snapshot.content_hash,
                actual,
            });
        }
        debug!(snapshot = snapshot.id.short(), files = tree.len(), "snapshot restored");
        Ok(tree)
    }

    /// Every collection that has at least one snapshot or audit entry.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the root directory cannot be read.
    pub fn collection_ids(&self) -> Result<Vec<CollectionId>> {
        let mut ids = Vec::new();
        if !self.root.exists() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            // Non-collection directories (staging leftovers etc.) are skipped.
            if let Ok(id) = CollectionId::new(&entry.file_name().to_string_lossy()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Path of the audit log for `collection`.
    #[must_use]
    pub fn audit_log_path(&self, collection: &CollectionId) -> PathBuf {
        self.root.join(collection.as_str()).join("audit.jsonl")
    }

    fn index_path(&self, collection: &CollectionId) -> PathBuf {
        self.root.join(collection.as_str()).join("index.json")
    }

    fn read_index(&self, collection: &CollectionId) -> Result<Vec<Snapshot>> {
        let path = self.index_path(collection);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        serde_json::from_str(&contents).map_err(|e| Error::Metadata {
            path,
            detail: format!("snapshot index is not valid JSON: {e}"),
        })
    }

    fn write_index(&self, collection: &CollectionId, index: &[Snapshot]) -> Result<()> {
        let json = serde_json::to_string_pretty(index).map_err(|e| Error::Metadata {
            path: self.index_path(collection),
            detail: format!("failed to serialize snapshot index: {e}"),
        })?;
        write_atomic(&self.index_path(collection), json.as_bytes())
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
