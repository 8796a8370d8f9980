//! Integration tests for sync routing over real store-backed endpoints.
//!
//! Coverage:
//! - the §-style end-to-end scenario: deploy, upstream update, local edit,
//!   conflicted sync, custom resolution, publish
//! - policy overrides from `trove.toml` driving the router
//! - fork outcome persisted as a new artifact snapshot
//! - skip outcome publishing only the clean changes

mod common;

use std::path::Path;

use common::{collection, deploy, edit_file, setup_store, tree};
use trove::atomic::publish_tree;
use trove::config::TroveConfig;
use trove::model::{ArtifactName, load_tree};
use trove::sync::{
    ConflictPolicy, SyncDirection, SyncOutcome, apply_policy, route_sync_merge,
};

fn artifact() -> ArtifactName {
    ArtifactName::new("commit-helper").unwrap()
}

// ==========================================================================
// End-to-end reconciliation
// ==========================================================================

/// Collection has `foo` at S1 = "v1"; deployed to a project; upstream
/// updates to "v2" (S2); the user locally edits to "v1+local". A
/// project→collection sync must surface one conflict at `foo`, and a
/// custom resolution of "v2+local" must produce exactly that tree.
#[test]
fn deployed_artifact_reconciles_through_a_conflicted_sync() {
    let (_store_dir, store) = setup_store();
    let s1 = store
        .create_snapshot(&collection(), &tree(&[("foo", "v1")]))
        .unwrap();
    let (target, record) = deploy(&store, &s1);

    // Upstream moves on while the user edits locally.
    store
        .create_snapshot(&collection(), &tree(&[("foo", "v2")]))
        .unwrap();
    edit_file(target.path(), "foo", "v1+local");

    let base = store
        .restore_snapshot(record.merge_base_snapshot_id.as_ref().unwrap())
        .unwrap();
    let mut local = load_tree(target.path()).unwrap();
    local.remove(Path::new(".trove-deployment.toml"));
    let latest = store.latest_snapshot(&collection()).unwrap().unwrap();
    let remote = store.restore_snapshot(&latest.id).unwrap();

    let outcome = route_sync_merge(
        SyncDirection::ProjectToCollection,
        &artifact(),
        &base,
        &local,
        &remote,
    )
    .unwrap();
    let result = match outcome {
        SyncOutcome::NeedsInput(result) => result,
        other => panic!("project→collection defaults to ask, got {other:?}"),
    };
    assert_eq!(result.conflict_count(), 1);
    assert_eq!(result.conflicts()[0].path, Path::new("foo"));

    let resolved = result
        .resolve(
            Path::new("foo"),
            trove::merge::Resolution::Custom(b"v2+local".to_vec()),
        )
        .unwrap();
    assert_eq!(resolved.conflict_count(), 0);
    let merged = resolved.merged_tree().expect("fully resolved").clone();
    assert_eq!(merged.get(Path::new("foo")), Some(b"v2+local".as_slice()));

    // Publish the reconciled tree back to the collection as a snapshot.
    let reconciled = store.create_snapshot(&collection(), &merged).unwrap();
    assert_eq!(
        store.restore_snapshot(&reconciled.id).unwrap(),
        merged,
        "the reconciled state round-trips through the store"
    );
}

// ==========================================================================
// Config-driven policy overrides
// ==========================================================================

#[test]
fn config_override_changes_the_routing_outcome() {
    let cfg =
        TroveConfig::parse("[sync]\nproject_to_collection = \"skip\"").unwrap();
    let strategy = cfg.strategy_for(SyncDirection::ProjectToCollection);
    assert_eq!(strategy.conflict_policy, ConflictPolicy::Skip);

    let base = tree(&[("foo", "v1")]);
    let local = tree(&[("foo", "v1+local")]);
    let remote = tree(&[("foo", "v2")]);

    let outcome = apply_policy(strategy.conflict_policy, &artifact(), &base, &local, &remote)
        .unwrap();
    match outcome {
        SyncOutcome::Skipped {
            result,
            skipped_paths,
        } => {
            assert_eq!(skipped_paths, vec![Path::new("foo").to_path_buf()]);
            assert_eq!(
                result.merged_tree().unwrap().get(Path::new("foo")),
                Some(b"v1+local".as_slice()),
                "skipped path keeps its local content"
            );
        }
        other => panic!("expected Skipped, got {other:?}"),
    }
}

// ==========================================================================
// Fork and skip outcomes end to end
// ==========================================================================

#[test]
fn fork_outcome_persists_both_lines_as_snapshots() {
    let (_store_dir, store) = setup_store();
    let base = tree(&[("foo", "v1")]);
    let local = tree(&[("foo", "v1+local")]);
    let remote = tree(&[("foo", "v2")]);

    let outcome =
        apply_policy(ConflictPolicy::Fork, &artifact(), &base, &local, &remote).unwrap();
    let (primary, fork, fork_name) = match outcome {
        SyncOutcome::Forked {
            primary,
            fork,
            fork_name,
        } => (primary, fork, fork_name),
        other => panic!("expected Forked, got {other:?}"),
    };

    let primary_snap = store.create_snapshot(&collection(), &primary).unwrap();
    let fork_snap = store.create_snapshot(&collection(), &fork).unwrap();
    assert_ne!(primary_snap.content_hash, fork_snap.content_hash);
    assert!(fork_name.as_str().starts_with("commit-helper-fork-"));
    assert_eq!(
        store.restore_snapshot(&fork_snap.id).unwrap().get(Path::new("foo")),
        Some(b"v1+local".as_slice())
    );
}

#[test]
fn skip_outcome_publishes_only_clean_changes() {
    let (_store_dir, _store) = setup_store();
    let deploy_dir = tempfile::TempDir::new().unwrap();
    let base = tree(&[("foo", "v1"), ("bar", "v1")]);
    let local = tree(&[("foo", "v1+local"), ("bar", "v1")]);
    let remote = tree(&[("foo", "v2"), ("bar", "v2")]);

    let outcome =
        apply_policy(ConflictPolicy::Skip, &artifact(), &base, &local, &remote).unwrap();
    let result = match outcome {
        SyncOutcome::Skipped { result, .. } => result,
        other => panic!("expected Skipped, got {other:?}"),
    };

    let dest = deploy_dir.path().join("deployed");
    publish_tree(result.merged_tree().unwrap(), &dest).unwrap();
    let published = load_tree(&dest).unwrap();
    assert_eq!(published.get(Path::new("bar")), Some(b"v2".as_slice()));
    assert_eq!(
        published.get(Path::new("foo")),
        Some(b"v1+local".as_slice()),
        "conflicting path left untouched by the skip policy"
    );
}
