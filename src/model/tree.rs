//! In-memory artifact trees.
//!
//! An [`ArtifactTree`] is a rooted set of relative file paths with byte
//! content — one artifact (or a whole collection) at one moment. Trees are
//! never mutated in place by comparison or merge operations; every diff and
//! merge operates on immutable in-memory copies, so a tree read once stays
//! stable for the duration of an operation even if the underlying directory
//! is replaced.
//!
//! Storage is a `BTreeMap` so enumeration order is deterministic regardless
//! of insertion order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// ArtifactTree
// ---------------------------------------------------------------------------

/// A rooted set of relative file paths with byte content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtifactTree {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl ArtifactTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from `(path, bytes)` pairs.
    ///
    /// Later entries win on duplicate paths.
    pub fn from_entries<P, B, I>(entries: I) -> Self
    where
        P: Into<PathBuf>,
        B: Into<Vec<u8>>,
        I: IntoIterator<Item = (P, B)>,
    {
        let files = entries
            .into_iter()
            .map(|(p, b)| (p.into(), b.into()))
            .collect();
        Self { files }
    }

    /// Insert (or replace) a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    /// Remove a file, returning its content if present.
    pub fn remove(&mut self, path: &Path) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    /// Content of a file, if present.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Returns `true` if the tree contains `path`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the tree has no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over paths in lexicographic order.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.keys()
    }

    /// Iterate over `(path, bytes)` in lexicographic path order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Vec<u8>)> {
        self.files.iter()
    }

    /// Write every file under `root`, creating parent directories as needed.
    ///
    /// This is a plain (non-atomic) write used for staging; atomic
    /// publication is the job of [`crate::atomic::publish_tree`].
    ///
    /// # Errors
    /// Returns [`Error::Io`] on the first write failure.
    pub fn write_to(&self, root: &Path) -> Result<()> {
        for (rel, bytes) in &self.files {
            let dest = root.join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, bytes)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ArtifactTree {
    type Item = (&'a PathBuf, &'a Vec<u8>);
    type IntoIter = std::collections::btree_map::Iter<'a, PathBuf, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

// ---------------------------------------------------------------------------
// load_tree
// ---------------------------------------------------------------------------

/// Load a directory into an [`ArtifactTree`], reading every regular file
/// under `root` with paths stored relative to `root`.
///
/// Symlinks are not followed. The walk aborts on the first unreadable
/// entry — a tree is never partially loaded.
///
/// # Errors
/// Returns [`Error::ReadFailure`] naming the offending path if any file or
/// directory cannot be read.
pub fn load_tree(root: &Path) -> Result<ArtifactTree> {
    let mut tree = ArtifactTree::new();
    walk_into(root, root, &mut tree)?;
    Ok(tree)
}

fn walk_into(root: &Path, dir: &Path, tree: &mut ArtifactTree) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|source| Error::ReadFailure {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| Error::ReadFailure {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| Error::ReadFailure {
            path: path.clone(),
            source,
        })?;
        if file_type.is_dir() {
            walk_into(root, &path, tree)?;
        } else if file_type.is_file() {
            let bytes = fs::read(&path).map_err(|source| Error::ReadFailure {
                path: path.clone(),
                source,
            })?;
            let rel = path
                .strip_prefix(root)
                .map_err(|_| Error::ReadFailure {
                    path: path.clone(),
                    source: std::io::Error::other("path escaped the tree root"),
                })?
                .to_path_buf();
            tree.insert(rel, bytes);
        }
        // Symlinks and other special files are ignored.
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
