//! Failure Propagation Tests
//!
//! Only client failures cross the `foreach` boundary:
//! - Invariant violations stop the loop and roll back the failing attempt
//! - Panics are caught, rolled back and reported
//! - The runtime stays usable afterwards

use crate::common::*;
use amorph::prelude::*;
use amorph::ExecutionError;
use std::sync::atomic::{AtomicBool, Ordering};

#[test]
fn test_invariant_violation_rolls_back_and_stops() {
    let rt = serial_runtime();
    let cells: Vec<SpecCell<u32>> = (0..10).map(|_| SpecCell::new(0)).collect();
    let cells = &cells[..];

    let err = rt
        .foreach(0..10usize, Schedule::fifo(), |&i, ctx| {
            cells[i].write(ctx, 1)?;
            if i == 3 {
                return Err(IterationError::invariant("item three is corrupt"));
            }
            Ok(())
        })
        .unwrap_err();

    match &err {
        ExecutionError::ClientInvariant { message, .. } => {
            assert_eq!(message, "item three is corrupt")
        }
        other => panic!("expected ClientInvariant, got {other:?}"),
    }
    let values: Vec<u32> = cells.iter().map(SpecCell::get_unchecked).collect();
    assert_eq!(values, vec![1, 1, 1, 0, 0, 0, 0, 0, 0, 0]);
    assert!(cells[3].owner_slot().is_free());

    let err: Error = err.into();
    assert!(err.is_fatal());
}

#[test]
fn test_panic_is_reported_and_released() {
    let rt = runtime(4);
    let shared = SpecCell::new(0u64);

    let err = rt
        .foreach(0..100u64, rt.default_schedule(), |&i, ctx| {
            shared.update(ctx, |v| *v += 1)?;
            if i == 42 {
                panic!("body failed on {i}");
            }
            Ok(())
        })
        .unwrap_err();

    match err {
        ExecutionError::WorkerPanicked { message, .. } => {
            assert_eq!(message, "body failed on 42")
        }
        other => panic!("expected WorkerPanicked, got {other:?}"),
    }
    assert!(shared.owner_slot().is_free());

    // the runtime and the object remain usable
    let before = shared.get_unchecked();
    let report = rt
        .foreach(0..10u64, rt.default_schedule(), |_, ctx| {
            shared.update(ctx, |v| *v += 1)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(report.committed, 10);
    assert_eq!(shared.get_unchecked(), before + 10);

    let totals = rt.totals();
    assert_eq!(totals.failed_invocations, 1);
    assert_eq!(totals.invocations, 1);
}

#[test]
fn test_invalid_schedule_fails_before_running() {
    let rt = runtime(2);
    let ran = SpecCell::new(false);
    let schedule: Schedule<u32> = Schedule::first(Rule::chunked(4)).then(Rule::BulkSynchronous);

    let err = rt
        .foreach(vec![1, 2, 3], schedule, |_, ctx| ran.write(ctx, true))
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Schedule(_)));
    assert!(!ran.get_unchecked());
    assert!(Error::from(err).is_config());
}

#[test]
fn test_undo_for_unowned_object_is_skipped() {
    let rt = serial_runtime();
    let cell = SpecCell::new(5u32);
    let undo_ran = AtomicBool::new(false);
    let first_attempt = AtomicBool::new(true);

    let report = rt
        .foreach([0u32], Schedule::fifo(), |_, ctx| {
            // the cell is never acquired by this iteration
            let undo_ran = &undo_ran;
            ctx.register_undo_for(&cell, move || undo_ran.store(true, Ordering::Relaxed));
            if first_attempt.swap(false, Ordering::Relaxed) {
                return Err(ctx.raise_conflict());
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(report.committed, 1);
    assert_eq!(report.aborted_conflict, 1);
    assert_eq!(report.undo_actions_replayed, 0);
    assert!(!undo_ran.load(Ordering::Relaxed));
    assert_eq!(cell.get_unchecked(), 5);
}
