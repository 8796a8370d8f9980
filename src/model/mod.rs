//! Core data model: identifier types, artifact trees, and content hashing.

pub mod hash;
pub mod tree;
pub mod types;

pub use hash::{ContentHash, file_digest, hash_tree};
pub use tree::{ArtifactTree, load_tree};
pub use types::{ArtifactName, CollectionId, SnapshotId, ValidationError};
