//! Atomic durable writes.
//!
//! Every durable write in this crate goes through one of two primitives:
//!
//! - [`write_atomic`] — write bytes to a temporary file in the destination
//!   directory, fsync, then rename over the target. A crash mid-write never
//!   leaves a partially-written file visible under its final name.
//! - [`publish_tree`] — materialize a whole tree in a staging directory
//!   next to the destination, then swap the staging directory into place.
//!   A crash leaves either the prior tree or the new tree, never a mix.
//!
//! Readers in other processes therefore never observe torn state even
//! without locks; multi-process safety rests entirely on the rename step
//! being atomic on the same filesystem.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::ArtifactTree;

/// Write `bytes` to `path` via write-temp-then-rename.
///
/// The temporary file lives in the same directory as `path` so the final
/// rename stays on one filesystem. Parent directories are created as
/// needed.
///
/// # Errors
/// Returns [`Error::Io`] on any create/write/fsync/rename failure; the
/// target file is left untouched in that case.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io(std::io::Error::other(format!(
            "no parent directory for {}",
            path.display()
        ))))?;
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".trove-tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "atomic write published");
    Ok(())
}

/// Append one line to `path`, creating the file if needed.
///
/// Used by the append-only audit log. The line is flushed and fsynced
/// before returning; a torn trailing line (crash mid-append) is tolerated
/// by readers, which skip an unparsable final line.
///
/// # Errors
/// Returns [`Error::Io`] on any open/write/fsync failure.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = File::options().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    Ok(())
}

/// Publish `tree` at `dest`, replacing whatever is there.
///
/// 1. Write the full tree into `<dest>.staging-<pid>` (sibling directory,
///    same filesystem).
/// 2. Rename the current `dest` (if any) aside to `<dest>.old-<pid>`.
/// 3. Rename staging into place.
/// 4. Remove the old directory.
///
/// A crash between steps 2 and 3 leaves the prior state recoverable at the
/// `.old` path and nothing at `dest`; a crash elsewhere leaves either the
/// prior or the new tree fully intact. No reader ever sees a mixed tree.
///
/// # Errors
/// Returns [`Error::Io`] on any staging or rename failure. If the swap
/// itself fails after `dest` was moved aside, the prior tree is moved back
/// before the error is returned.
pub fn publish_tree(tree: &ArtifactTree, dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::Io(std::io::Error::other(format!(
            "no parent directory for {}",
            dest.display()
        ))))?;
    fs::create_dir_all(parent)?;

    let name = dest
        .file_name()
        .map_or_else(|| "tree".to_owned(), |n| n.to_string_lossy().into_owned());
    let pid = std::process::id();
    let staging = parent.join(format!(".{name}.staging-{pid}"));
    let old = parent.join(format!(".{name}.old-{pid}"));

    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;
    tree.write_to(&staging)?;

    let had_prior = dest.exists();
    if had_prior {
        fs::rename(dest, &old)?;
    }
    if let Err(e) = fs::rename(&staging, dest) {
        // Roll the prior tree back so the destination is never left empty.
        if had_prior {
            let _ = fs::rename(&old, dest);
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(Error::Io(e));
    }
    if had_prior {
        fs::remove_dir_all(&old)?;
    }

    debug!(dest = %dest.display(), files = tree.len(), "tree published");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
