//! Serializability Tests
//!
//! Committed iterations must behave as some serial order:
//! - No two iterations ever hold the same object at once
//! - Conserved quantities stay conserved under heavy contention
//! - Cautious bodies that acquire everything first never need undo

use crate::common::*;
use amorph::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Object that detects overlapping holders
struct Guarded {
    slot: OwnerSlot,
    busy: AtomicBool,
    hits: AtomicU64,
}

impl Guarded {
    fn new() -> Self {
        Guarded {
            slot: OwnerSlot::new(),
            busy: AtomicBool::new(false),
            hits: AtomicU64::new(0),
        }
    }
}

impl Lockable for Guarded {
    fn owner_slot(&self) -> &OwnerSlot {
        &self.slot
    }
}

fn enter<'env>(
    object: &'env Guarded,
    ctx: &mut Context<'_, 'env, (usize, usize)>,
) -> std::result::Result<(), IterationError> {
    ctx.acquire(object)?;
    if object.busy.swap(true, Ordering::Relaxed) {
        return Err(IterationError::invariant("two iterations hold one object"));
    }
    ctx.register_undo_for(object, move || object.busy.store(false, Ordering::Relaxed));
    ctx.on_commit(move || object.busy.store(false, Ordering::Relaxed));
    Ok(())
}

#[test]
fn test_no_overlapping_ownership() {
    let rt = runtime(8);
    let objects: Vec<Guarded> = (0..8).map(|_| Guarded::new()).collect();
    let objects = &objects[..];
    let mut rng = StdRng::seed_from_u64(5);
    let items: Vec<(usize, usize)> = (0..5_000)
        .map(|_| (rng.gen_range(0..8), rng.gen_range(0..8)))
        .collect();

    let report = rt
        .foreach(items, rt.default_schedule(), |&(a, b), ctx| {
            enter(&objects[a], ctx)?;
            if b != a {
                enter(&objects[b], ctx)?;
            }
            objects[a].hits.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();

    assert_eq!(report.committed, 5_000);
    let hits: u64 = objects.iter().map(|o| o.hits.load(Ordering::Relaxed)).sum();
    assert_eq!(hits, 5_000);
    assert!(objects.iter().all(|o| !o.busy.load(Ordering::Relaxed)));
}

fn transfers(rt: &Runtime) -> ForeachReport {
    const ACCOUNTS: usize = 16;
    const START: i64 = 1_000;

    let accounts: Vec<SpecCell<i64>> = (0..ACCOUNTS).map(|_| SpecCell::new(START)).collect();
    let accounts = &accounts[..];
    let mut rng = StdRng::seed_from_u64(99);
    let items: Vec<(usize, usize, i64)> = (0..4_000)
        .map(|_| {
            (
                rng.gen_range(0..ACCOUNTS),
                rng.gen_range(0..ACCOUNTS),
                rng.gen_range(1..200),
            )
        })
        .collect();

    let report = rt
        .foreach(items, rt.default_schedule(), |&(from, to, amount), ctx| {
            if from == to {
                return Err(ctx.signal_not_useful());
            }
            accounts[from].update(ctx, |b| *b -= amount)?;
            accounts[to].update(ctx, |b| *b += amount)?;
            // overdrafts are rolled back
            if accounts[from].read(ctx)? < 0 {
                return Err(ctx.signal_not_useful());
            }
            Ok(())
        })
        .unwrap();

    let balances: Vec<i64> = accounts.iter().map(SpecCell::get_unchecked).collect();
    assert_eq!(balances.iter().sum::<i64>(), START * ACCOUNTS as i64);
    assert!(balances.iter().all(|&b| b >= 0));
    assert_eq!(report.acquisitions, report.releases);
    report
}

#[test]
fn test_transfers_conserve_total() {
    let rt = runtime(8);
    let report = transfers(&rt);
    assert_eq!(report.attempts(), report.committed + report.aborted());
}

#[test]
fn test_transfers_conserve_total_younger_aborts() {
    let rt = runtime_with(8, ConflictPolicy::YoungerAborts);
    transfers(&rt);
    assert_eq!(rt.conflict_policy(), ConflictPolicy::YoungerAborts);
}

/// Cautious bodies acquire their whole neighborhood, then mutate undo-free
#[test]
fn test_cautious_body_needs_no_undo() {
    let rt = runtime(4);
    let cells: Vec<SpecCell<u64>> = (0..32).map(|_| SpecCell::new(0)).collect();
    let cells = &cells[..];

    let report = rt
        .foreach(0..2_000usize, rt.default_schedule(), |&i, ctx| {
            let neighborhood = [i % 32, (i * 7 + 1) % 32, (i * 13 + 5) % 32];
            ctx.acquire_all(neighborhood.iter().map(|&n| &cells[n]))?;
            ctx.fail_safe();
            for &n in &neighborhood {
                cells[n].update_with(ctx, AccessMode::Unchecked, |v| *v += 1)?;
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(report.fail_safe_violations, 0);
    assert_eq!(report.undo_actions_replayed, 0);
    let total: u64 = cells.iter().map(SpecCell::get_unchecked).sum();
    assert_eq!(total, 6_000);
}
