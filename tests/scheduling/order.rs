//! Dequeue Order Tests
//!
//! On a single worker every rule hands out items in a fully determined
//! order, which the body records as it runs.

use crate::common::*;
use amorph::prelude::*;
use parking_lot::Mutex;

/// Run `initial` on a serial runtime and return the items in body order
///
/// Items below `spawn_below` add `item + 10` when they commit.
fn serial_order(initial: Vec<u32>, schedule: Schedule<u32>, spawn_below: u32) -> Vec<u32> {
    let rt = serial_runtime();
    let seen = Mutex::new(Vec::new());
    rt.foreach(initial, schedule, |&n, ctx| {
        seen.lock().push(n);
        if n < spawn_below {
            ctx.add(n + 10);
        }
        Ok(())
    })
    .unwrap();
    seen.into_inner()
}

#[test]
fn test_fifo_order() {
    let order = serial_order((0..5).collect(), Schedule::fifo(), 3);
    assert_eq!(order, vec![0, 1, 2, 3, 4, 10, 11, 12]);
}

#[test]
fn test_lifo_order() {
    let order = serial_order((0..5).collect(), Schedule::first(Rule::Lifo), 3);
    assert_eq!(order, vec![4, 3, 2, 12, 1, 11, 0, 10]);
}

#[test]
fn test_ordered_pops_smallest_first() {
    let rt = serial_runtime();
    let seen = Mutex::new(Vec::new());
    rt.foreach(
        vec![5u32, 3, 9, 1, 7],
        Schedule::first(Rule::ordered_by_key(|&n: &u32| n)),
        |&n, ctx| {
            seen.lock().push(n);
            if n < 4 {
                ctx.add(n * 2);
            }
            Ok(())
        },
    )
    .unwrap();
    assert_eq!(seen.into_inner(), vec![1, 2, 3, 4, 5, 6, 7, 9]);
}

#[test]
fn test_ordered_ties_follow_next_rule() {
    let rt = serial_runtime();
    let seen = Mutex::new(Vec::new());
    let items = vec![(1u32, 'a'), (0, 'b'), (1, 'c'), (0, 'd')];
    let schedule = Schedule::first(Rule::ordered_by_key(|&(k, _): &(u32, char)| k)).then(Rule::Lifo);
    rt.foreach(items, schedule, |&(_, label), _| {
        seen.lock().push(label);
        Ok(())
    })
    .unwrap();
    assert_eq!(seen.into_inner(), vec!['d', 'b', 'c', 'a']);
}

#[test]
fn test_chunks_follow_inner_order() {
    let schedule = Schedule::first(Rule::chunked(4)).then(Rule::Lifo);
    let order = serial_order((0..8).collect(), schedule, 0);
    assert_eq!(order, vec![3, 2, 1, 0, 7, 6, 5, 4]);
}

#[test]
fn test_buckets_ascending_and_descending() {
    let keys = vec![5u32, 1, 3, 1, 2];

    let up = serial_order(keys.clone(), Schedule::first(Rule::bucketed(2, |&k: &u32| (k / 3) as usize)), 0);
    assert_eq!(up, vec![1, 1, 2, 5, 3]);

    let down = serial_order(
        keys,
        Schedule::first(Rule::bucketed_descending(2, |&k: &u32| (k / 3) as usize)),
        0,
    );
    assert_eq!(down, vec![5, 3, 1, 1, 2]);
}

#[test]
fn test_out_of_range_keys_share_last_bucket() {
    let schedule = Schedule::first(Rule::bucketed(3, |&k: &u32| k as usize)).then(Rule::Lifo);
    let order = serial_order(vec![7, 0, 9, 1, 2], schedule, 0);
    assert_eq!(order, vec![0, 1, 2, 9, 7]);
}

#[test]
fn test_parallel_ordered_completes_everything() {
    let rt = runtime(4);
    let seen = Mutex::new(Vec::new());
    let schedule = Schedule::first(Rule::ordered_by_key(|&n: &u32| n)).then(Rule::chunked(8));
    let report = rt
        .foreach(0..500u32, schedule, |&n, _| {
            seen.lock().push(n);
            Ok(())
        })
        .unwrap();
    assert_eq!(report.committed, 500);

    let mut seen = seen.into_inner();
    seen.sort_unstable();
    assert_eq!(seen, (0..500).collect::<Vec<_>>());
}
