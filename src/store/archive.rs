//! Snapshot archive format: gzip-compressed tar of an artifact tree.
//!
//! Archives are built fully in memory and handed to the atomic-write
//! primitive; nothing here touches the final archive path. Entry paths are
//! the tree's relative paths, so unpacking reproduces the tree exactly.

use std::io::Read;
use std::path::{Component, Path};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};
use crate::model::ArtifactTree;

/// Serialize `tree` into gzip-compressed tar bytes.
///
/// # Errors
/// Returns [`Error::Io`] if tar or gzip encoding fails.
pub fn pack_tree(tree: &ArtifactTree) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, bytes) in tree {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, bytes.as_slice())?;
    }

    let encoder = builder.into_inner()?;
    let compressed = encoder.finish()?;
    Ok(compressed)
}

/// Deserialize gzip-compressed tar bytes back into an [`ArtifactTree`].
///
/// Entries with non-relative or parent-escaping paths are rejected rather
/// than silently normalized.
///
/// # Errors
/// Returns [`Error::Io`] on a malformed archive, or [`Error::Metadata`] for
/// an entry whose path escapes the tree root.
pub fn unpack_tree(bytes: &[u8]) -> Result<ArtifactTree> {
    let decoder = GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);

    let mut tree = ArtifactTree::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.into_owned();
        validate_entry_path(&path)?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        tree.insert(path, content);
    }
    Ok(tree)
}

fn validate_entry_path(path: &Path) -> Result<()> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(Error::Metadata {
            path: path.to_path_buf(),
            detail: "archive entry path escapes the tree root".to_owned(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
