//! Bulk-Synchronous Round Tests

use crate::common::*;
use amorph::prelude::*;
use parking_lot::Mutex;

/// Nodes of a complete binary tree with 6 levels
const TREE_NODES: u32 = 63;

fn depth(node: u32) -> u32 {
    31 - (node + 1).leading_zeros()
}

#[test]
fn test_rounds_follow_tree_levels() {
    let rt = runtime(4);
    let depths = Mutex::new(Vec::new());
    let schedule = Schedule::first(Rule::BulkSynchronous).then(Rule::Fifo);

    let report = rt
        .foreach([0u32], schedule, |&node, ctx| {
            depths.lock().push(depth(node));
            for child in [2 * node + 1, 2 * node + 2] {
                if child < TREE_NODES {
                    ctx.add(child);
                }
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(report.committed, TREE_NODES as u64);
    assert_eq!(report.rounds, 6);

    let depths = depths.into_inner();
    assert!(depths.windows(2).all(|w| w[0] <= w[1]), "{depths:?}");
    assert_eq!(depths.last(), Some(&5));
}

#[test]
fn test_retried_items_stay_in_their_round() {
    let rt = runtime(4);
    let hot = SpecCell::new(0u32);
    let depths = Mutex::new(Vec::new());
    let schedule = Schedule::first(Rule::BulkSynchronous).then(Rule::chunked(2));

    let report = rt
        .foreach(0..16u32, schedule, |&n, ctx| {
            // every item of a level contends for one cell
            hot.update(ctx, |v| *v += 1)?;
            let level = n / 16;
            ctx.on_commit({
                let depths = &depths;
                move || depths.lock().push(level)
            });
            if n < 32 {
                ctx.add(n + 16);
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(report.committed, 48);
    assert_eq!(report.rounds, 3);
    assert_eq!(hot.into_inner(), 48);
    let depths = depths.into_inner();
    assert!(depths.windows(2).all(|w| w[0] <= w[1]), "{depths:?}");
}

#[test]
fn test_single_round_without_additions() {
    let rt = runtime(2);
    let report = rt
        .foreach(0..10u32, Schedule::first(Rule::BulkSynchronous), |_, _| Ok(()))
        .unwrap();
    assert_eq!(report.committed, 10);
    assert_eq!(report.rounds, 1);
}
