//! Benchmarks for tree hashing, pairwise diff, and three-way
//! classification.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench diff_engine
//! ```
//!
//! Targets: a library-scale tree (hundreds of files, a few KiB each) must
//! hash and classify in well under a second; these benches track where the
//! time actually goes as tree size grows.

use std::path::PathBuf;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use trove::diff::{diff, three_way_diff};
use trove::merge::merge;
use trove::model::{ArtifactTree, hash_tree};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Build a tree of `files` markdown-ish files, each around 2 KiB, with
/// deterministic content so every run measures the same inputs.
fn synthetic_tree(files: usize) -> ArtifactTree {
    let mut tree = ArtifactTree::new();
    for i in 0..files {
        let path = PathBuf::from(format!("artifact-{:03}/file-{i:04}.md", i / 4));
        let mut content = String::with_capacity(2048);
        for line in 0..64 {
            content.push_str(&format!("file {i} line {line}: reusable instruction text\n"));
        }
        tree.insert(path, content);
    }
    tree
}

/// A copy of `tree` with every 10th file edited and a handful added.
fn edited_copy(tree: &ArtifactTree) -> ArtifactTree {
    let mut edited = tree.clone();
    for (i, path) in tree.paths().enumerate() {
        if i % 10 == 0 {
            edited.insert(path.clone(), format!("edited variant of entry {i}\n"));
        }
    }
    for i in 0..8 {
        edited.insert(format!("added-{i}.md"), "fresh content\n");
    }
    edited
}

// ---------------------------------------------------------------------------
// Benches
// ---------------------------------------------------------------------------

fn bench_hash_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_tree");
    for files in [50, 200, 500] {
        let tree = synthetic_tree(files);
        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(BenchmarkId::from_parameter(files), &tree, |b, tree| {
            b.iter(|| hash_tree(tree));
        });
    }
    group.finish();
}

fn bench_pairwise_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise_diff");
    for files in [50, 200, 500] {
        let a = synthetic_tree(files);
        let b_tree = edited_copy(&a);
        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(files),
            &(a, b_tree),
            |bench, (a, b_tree)| {
                bench.iter(|| diff(a, b_tree));
            },
        );
    }
    group.finish();
}

fn bench_three_way_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("three_way_diff");
    for files in [50, 200, 500] {
        let base = synthetic_tree(files);
        let local = edited_copy(&base);
        let remote = {
            let mut r = base.clone();
            for i in 0..8 {
                r.insert(format!("remote-{i}.md"), "upstream addition\n");
            }
            r
        };
        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(files),
            &(base, local, remote),
            |bench, (base, local, remote)| {
                bench.iter(|| three_way_diff(base, local, remote));
            },
        );
    }
    group.finish();
}

fn bench_clean_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("clean_merge");
    for files in [50, 200] {
        let base = synthetic_tree(files);
        let local = edited_copy(&base);
        let remote = base.clone();
        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(files),
            &(base, local, remote),
            |bench, (base, local, remote)| {
                bench.iter(|| merge(base, local, remote));
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_hash_tree,
    bench_pairwise_diff,
    bench_three_way_diff,
    bench_clean_merge
);
criterion_main!(benches);
