//! Snapshot, diff, merge, and rollback core for artifact collections.
//!
//! An artifact is a tree of relative paths and bytes — a skill, a prompt
//! pack, a config bundle — kept in a collection and deployed by copying
//! into target directories. This crate is the reconciliation core that
//! keeps those copies honest: content hashing, immutable snapshots,
//! pairwise and three-way diffs, conflict-marker merges, change-preserving
//! rollback, and the sync router that picks a conflict policy per
//! direction.
//!
//! The crate is a library only; CLI/HTTP surfaces are thin adapters over
//! these modules. Nothing here performs network I/O, and all durable
//! writes go through [`atomic`]'s write-temp-then-rename discipline.

pub mod atomic;
pub mod config;
pub mod deploy;
pub mod diff;
pub mod error;
pub mod merge;
pub mod model;
pub mod store;
pub mod sync;
pub mod version;

pub use error::{Error, Result};
pub use model::{ArtifactName, ArtifactTree, CollectionId, ContentHash, SnapshotId};
