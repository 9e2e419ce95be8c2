//! Union-Find Tests
//!
//! N singletons merged by randomly ordered `union` items under checked
//! ownership. The parallel forest must match a serial reference and every
//! acquire must be matched by a release.

use crate::common::*;
use amorph::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

type Pair = (usize, usize);

/// Root of `x`, acquiring every node on the path
fn find<'env>(
    nodes: &'env [Node],
    ctx: &mut Context<'_, 'env, Pair>,
    mut x: usize,
) -> std::result::Result<usize, IterationError> {
    loop {
        ctx.acquire(&nodes[x])?;
        let parent = nodes[x].parent();
        if parent == x {
            return Ok(x);
        }
        x = parent;
    }
}

/// Union by rank with undo for every mutation
fn union<'env>(
    nodes: &'env [Node],
    ctx: &mut Context<'_, 'env, Pair>,
    (a, b): Pair,
) -> std::result::Result<(), IterationError> {
    let ra = find(nodes, ctx, a)?;
    let rb = find(nodes, ctx, b)?;
    if ra == rb {
        return Err(ctx.signal_not_useful());
    }
    let (hi, lo) = if nodes[ra].rank() >= nodes[rb].rank() {
        (ra, rb)
    } else {
        (rb, ra)
    };

    ctx.register_undo_for(&nodes[lo], move || nodes[lo].set_parent(lo));
    nodes[lo].set_parent(hi);

    let (hi_rank, lo_rank) = (nodes[hi].rank(), nodes[lo].rank());
    if hi_rank == lo_rank {
        ctx.register_undo_for(&nodes[hi], move || nodes[hi].set_rank(hi_rank));
        nodes[hi].set_rank(hi_rank + 1);
    }
    Ok(())
}

/// Random spanning tree edges plus `extra` redundant ones, shuffled
fn random_unions(n: usize, extra: usize, seed: u64) -> Vec<Pair> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pairs: Vec<Pair> = (1..n).map(|i| (i, rng.gen_range(0..i))).collect();
    for _ in 0..extra {
        pairs.push((rng.gen_range(0..n), rng.gen_range(0..n)));
    }
    pairs.shuffle(&mut rng);
    pairs
}

fn check_forest(nodes: &[Node]) {
    let root = root_of(nodes, 0);
    for (x, node) in nodes.iter().enumerate() {
        assert_eq!(root_of(nodes, x), root, "node {x} not in the single tree");
        if node.parent() != x {
            assert!(
                nodes[node.parent()].rank() > node.rank(),
                "rank must grow towards the root"
            );
        }
        assert!(node.owner_slot().is_free(), "node {x} still owned");
    }
}

fn run_unions(rt: &Runtime, n: usize, extra: usize, seed: u64) -> ForeachReport {
    let pairs = random_unions(n, extra, seed);

    let mut reference = SerialUnionFind::new(n);
    let merged = pairs.iter().filter(|&&(a, b)| reference.union(a, b)).count();
    assert_eq!(merged, n - 1);
    assert_eq!(reference.components(), 1);

    let nodes = forest(n);
    let nodes = &nodes[..];
    let report = rt
        .foreach(pairs, rt.default_schedule(), |&pair, ctx| union(nodes, ctx, pair))
        .unwrap();

    check_forest(nodes);
    assert_eq!(report.committed, (n - 1) as u64);
    report
}

#[test]
fn test_union_find_matches_serial_reference() {
    let rt = runtime(8);
    let report = run_unions(&rt, 2_000, 0, 7);
    assert_eq!(report.acquisitions, report.releases);
    assert_eq!(report.aborted_not_useful, 0);
}

/// Redundant unions find both ends in one set and are abandoned
#[test]
fn test_redundant_unions_not_useful() {
    let rt = runtime(4);
    let extra = 300;
    let report = run_unions(&rt, 500, extra, 11);
    // a self-pair or an edge inside an existing set is exactly redundant
    assert_eq!(report.aborted_not_useful, extra as u64);
    assert_eq!(report.acquisitions, report.releases);
}

#[test]
fn test_union_find_younger_aborts() {
    let rt = runtime_with(8, ConflictPolicy::YoungerAborts);
    let report = run_unions(&rt, 2_000, 100, 23);
    assert_eq!(report.acquisitions, report.releases);
    assert_eq!(report.aborted_not_useful, 100);
}

#[test]
fn test_union_find_serial() {
    let rt = serial_runtime();
    let report = run_unions(&rt, 300, 20, 3);
    assert_eq!(report.aborted_conflict, 0);
    assert_eq!(report.threads, 1);
}
