//! Library configuration (`trove.toml`).
//!
//! Defines the typed configuration for a collection library: where the
//! snapshot store lives and per-direction overrides of the sync conflict
//! policy. Missing fields use defaults; a missing file is all defaults,
//! not an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::sync::{ConflictPolicy, SyncDirection, SyncMergeStrategy, get_recommended_strategy};

/// File name of the library configuration.
pub const FILE_NAME: &str = "trove.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level library configuration.
///
/// Parsed from `trove.toml` at the library root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TroveConfig {
    /// Snapshot store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Sync policy overrides.
    #[serde(default)]
    pub sync: SyncPolicyConfig,
}

impl TroveConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields all defaults.
    ///
    /// # Errors
    /// Returns [`Error::Config`] on an unreadable file (other than
    /// not-found), invalid TOML, or unknown fields.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Config {
                    path: path.to_path_buf(),
                    detail: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|e| match e {
            Error::Config { detail, .. } => Error::Config {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`Error::Config`] on invalid TOML or unknown fields, with a
    /// line number when one can be derived.
    pub fn parse(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| {
            let mut detail = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                detail = format!("line {line}: {detail}");
            }
            Error::Config {
                path: PathBuf::from(FILE_NAME),
                detail,
            }
        })
    }

    /// The effective strategy for `direction`: the configured override if
    /// one is set, otherwise the recommended default.
    #[must_use]
    pub fn strategy_for(&self, direction: SyncDirection) -> SyncMergeStrategy {
        match self.sync.override_for(direction) {
            Some(conflict_policy) => SyncMergeStrategy {
                direction,
                conflict_policy,
            },
            None => get_recommended_strategy(direction),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Snapshot store settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Root directory of the snapshot store, relative to the library root
    /// unless absolute (default: `".trove/store"`).
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from(".trove/store")
}

// ---------------------------------------------------------------------------
// SyncPolicyConfig
// ---------------------------------------------------------------------------

/// Per-direction conflict policy overrides.
///
/// ```toml
/// [sync]
/// project_to_collection = "merge"
/// collection_to_upstream = "fork"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncPolicyConfig {
    /// Override for project → collection syncs.
    #[serde(default)]
    pub project_to_collection: Option<ConflictPolicy>,

    /// Override for collection → project syncs.
    #[serde(default)]
    pub collection_to_project: Option<ConflictPolicy>,

    /// Override for upstream → collection syncs.
    #[serde(default)]
    pub upstream_to_collection: Option<ConflictPolicy>,

    /// Override for collection → upstream syncs.
    #[serde(default)]
    pub collection_to_upstream: Option<ConflictPolicy>,
}

impl SyncPolicyConfig {
    fn override_for(&self, direction: SyncDirection) -> Option<ConflictPolicy> {
        match direction {
            SyncDirection::ProjectToCollection => self.project_to_collection,
            SyncDirection::CollectionToProject => self.collection_to_project,
            SyncDirection::UpstreamToCollection => self.upstream_to_collection,
            SyncDirection::CollectionToUpstream => self.collection_to_upstream,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
