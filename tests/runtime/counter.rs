//! Shared Counter Tests
//!
//! One hot object, every iteration touches it:
//! - Injected first-attempt conflicts are rolled back and retried
//! - Commit actions and added items only survive commits

use crate::common::*;
use amorph::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

const ITEMS: usize = 100;

fn first_attempts() -> Vec<AtomicBool> {
    (0..ITEMS).map(|_| AtomicBool::new(true)).collect()
}

/// Half the items conflict on their first attempt; the counter must still
/// end at exactly one increment per item
#[test]
fn test_counter_survives_injected_conflicts() {
    let rt = runtime(4);
    let counter = SpecCell::new(0u64);
    let first = first_attempts();

    let report = rt
        .foreach(0..ITEMS, rt.default_schedule(), |&i, ctx| {
            counter.update(ctx, |c| *c += 1)?;
            if i % 2 == 0 && first[i].swap(false, Ordering::Relaxed) {
                return Err(ctx.raise_conflict());
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(counter.into_inner(), ITEMS as u64);
    assert_eq!(report.committed, ITEMS as u64);
    assert!(report.aborted_conflict >= (ITEMS / 2) as u64);
    assert!(report.undo_actions_replayed >= (ITEMS / 2) as u64);
    assert_eq!(report.acquisitions, report.releases);
}

/// On one worker the injected conflicts are the only ones
#[test]
fn test_counter_serial_counts_exactly() {
    let rt = serial_runtime();
    let counter = SpecCell::new(0u64);
    let first = first_attempts();

    let report = rt
        .foreach(0..ITEMS, Schedule::fifo(), |&i, ctx| {
            counter.update(ctx, |c| *c += 1)?;
            if i % 2 == 0 && first[i].swap(false, Ordering::Relaxed) {
                return Err(ctx.raise_conflict());
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(counter.into_inner(), ITEMS as u64);
    assert_eq!(report.aborted_conflict, (ITEMS / 2) as u64);
    assert_eq!(report.undo_actions_replayed, (ITEMS / 2) as u64);
    assert_eq!(report.max_attempts, 2);
    assert!((report.commit_rate() - 100.0 / 150.0).abs() < 1e-9);
}

/// Commit actions run once per committed item, never for aborted attempts
#[test]
fn test_commit_actions_only_for_commits() {
    let rt = runtime(4);
    let counter = SpecCell::new(0u64);
    let first = first_attempts();
    let log = Mutex::new(Vec::new());

    rt.foreach(0..ITEMS, rt.default_schedule(), |&i, ctx| {
        counter.update(ctx, |c| *c += 1)?;
        let log = &log;
        ctx.on_commit(move || log.lock().push(i));
        if i % 3 == 0 && first[i].swap(false, Ordering::Relaxed) {
            return Err(ctx.raise_conflict());
        }
        Ok(())
    })
    .unwrap();

    let mut log = log.into_inner();
    log.sort_unstable();
    assert_eq!(log, (0..ITEMS).collect::<Vec<_>>());
}

/// Items added by an aborted attempt are discarded; the retry adds them again
#[test]
fn test_added_items_published_once() {
    let rt = runtime(3);
    let first = first_attempts();
    let seen = Mutex::new(Vec::new());

    let report = rt
        .foreach(0..10usize, Schedule::fifo(), |&i, ctx| {
            seen.lock().push(i);
            if i < 10 {
                ctx.add(i + 10);
                if first[i].swap(false, Ordering::Relaxed) {
                    return Err(ctx.raise_conflict());
                }
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(report.committed, 20);
    let mut children: Vec<_> = seen.into_inner().into_iter().filter(|&i| i >= 10).collect();
    children.sort_unstable();
    assert_eq!(children, (10..20).collect::<Vec<_>>());
}

/// Not-useful items are dropped without retry
#[test]
fn test_not_useful_items_dropped() {
    let rt = runtime(2);
    let removed: Vec<bool> = (0..50).map(|i| i % 5 == 0).collect();
    let counter = SpecCell::new(0u32);

    let report = rt
        .foreach(0..50usize, rt.default_schedule(), |&i, ctx| {
            if removed[i] {
                return Err(ctx.signal_not_useful());
            }
            counter.update(ctx, |c| *c += 1)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(report.aborted_not_useful, 10);
    assert_eq!(report.committed, 40);
    assert_eq!(counter.into_inner(), 40);
}
