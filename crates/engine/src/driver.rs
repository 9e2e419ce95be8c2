//! The foreach driver
//!
//! One [`Driver`] runs one invocation. Each worker loops:
//!
//! ```text
//!   pop ─► begin ─► body ─┬─► Ok          ─► commit ─► publish added items
//!                         ├─► Conflict    ─► abort   ─► push_retry (birth kept)
//!                         ├─► NotUseful   ─► abort   ─► drop item
//!                         └─► Invariant / panic ─► abort ─► stop invocation
//! ```
//!
//! ## Termination
//!
//! `pending` counts items that are queued or being executed. A commit adds
//! its published items *before* it retires its own, and a retry leaves the
//! count unchanged, so `pending == 0` means the worklist is empty and no
//! iteration can add more.
//!
//! ## Rounds
//!
//! For bulk-synchronous schedules workers hold `round_gate` for reading
//! from pop to completion. A worker that finds the current wave empty and
//! nothing in flight takes the gate for writing and advances the round, so
//! a round change never overlaps an iteration.

use crate::context::Context;
use crate::stats::WorkerStats;
use amorph_concurrency::{AbortReason, Iteration, IterationManager};
use amorph_core::{Conflict, ExecutionError, IterationError, IterationId, WorkerId};
use amorph_worklist::Worklist;
use crossbeam_utils::Backoff;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::borrow::Borrow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, debug_span, trace, Span};

/// Sleep between polls once an idle worker exhausted its spin budget
const IDLE_SLEEP: Duration = Duration::from_micros(50);

/// A work item plus its retry bookkeeping
pub(crate) struct Task<T> {
    item: T,
    /// Id of the first attempt; age under the younger-aborts policy
    birth: Option<IterationId>,
    attempts: u32,
}

impl<T> Task<T> {
    fn new(item: T) -> Self {
        Task {
            item,
            birth: None,
            attempts: 0,
        }
    }
}

impl<T> Borrow<T> for Task<T> {
    fn borrow(&self) -> &T {
        &self.item
    }
}

/// Shared state of one invocation
pub(crate) struct Driver<'s, T> {
    worklist: Box<dyn Worklist<Task<T>> + 's>,
    manager: &'s IterationManager,
    pending: AtomicUsize,
    in_flight: AtomicUsize,
    round_gate: RwLock<()>,
    barriered: bool,
    rounds: AtomicU64,
    failed: AtomicBool,
    failure: Mutex<Option<ExecutionError>>,
    spin_limit: u32,
}

impl<'s, T: Send> Driver<'s, T> {
    pub(crate) fn new(
        worklist: Box<dyn Worklist<Task<T>> + 's>,
        manager: &'s IterationManager,
        spin_limit: u32,
    ) -> Self {
        let barriered = worklist.has_rounds();
        Driver {
            worklist,
            manager,
            pending: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            round_gate: RwLock::new(()),
            barriered,
            rounds: AtomicU64::new(0),
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
            spin_limit,
        }
    }

    /// Queue the initial items; returns how many were queued
    pub(crate) fn load(&self, items: impl IntoIterator<Item = T>) -> usize {
        let first = WorkerId::new(0);
        let mut count = 0;
        for item in items {
            self.pending.fetch_add(1, Ordering::AcqRel);
            self.worklist.push(first, Task::new(item));
            count += 1;
        }
        // Initial items form the first round
        if self.barriered {
            self.advance_round();
        }
        count
    }

    /// Bulk-synchronous rounds started
    pub(crate) fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Acquire)
    }

    /// Run the invocation on `threads` workers
    ///
    /// A single worker runs on the calling thread. Returns the merged
    /// worker counters and the first failure, if any.
    pub(crate) fn run<'env, F>(
        &self,
        threads: usize,
        body: &F,
    ) -> (WorkerStats, Option<ExecutionError>)
    where
        F: Fn(&T, &mut Context<'_, 'env, T>) -> Result<(), IterationError> + Sync,
    {
        let mut total = WorkerStats::default();
        if threads <= 1 {
            total.merge(&self.guarded_worker(WorkerId::new(0), body));
        } else {
            let parent = Span::current();
            std::thread::scope(|scope| {
                let mut handles = Vec::with_capacity(threads);
                for index in 0..threads {
                    let worker = WorkerId::new(index);
                    let parent = parent.clone();
                    let spawned = std::thread::Builder::new()
                        .name(format!("amorph-worker-{index}"))
                        .spawn_scoped(scope, move || {
                            let _enter = parent.enter();
                            self.guarded_worker(worker, body)
                        });
                    match spawned {
                        Ok(handle) => handles.push(handle),
                        Err(e) => {
                            self.fail(ExecutionError::ResourceExhausted(format!(
                                "could not spawn worker {index}: {e}"
                            )));
                            break;
                        }
                    }
                }
                for handle in handles {
                    // Worker panics are caught in guarded_worker
                    if let Ok(stats) = handle.join() {
                        total.merge(&stats);
                    }
                }
            });
        }
        (total, self.failure.lock().take())
    }

    fn guarded_worker<'env, F>(&self, worker: WorkerId, body: &F) -> WorkerStats
    where
        F: Fn(&T, &mut Context<'_, 'env, T>) -> Result<(), IterationError> + Sync,
    {
        let _span = debug_span!("worker", %worker).entered();
        match panic::catch_unwind(AssertUnwindSafe(|| self.worker_loop(worker, body))) {
            Ok(stats) => stats,
            // A panic outside the body (commit action or undo entry)
            Err(payload) => {
                self.fail(ExecutionError::WorkerPanicked {
                    worker,
                    message: panic_message(payload.as_ref()),
                });
                WorkerStats::default()
            }
        }
    }

    fn worker_loop<'env, F>(&self, worker: WorkerId, body: &F) -> WorkerStats
    where
        F: Fn(&T, &mut Context<'_, 'env, T>) -> Result<(), IterationError> + Sync,
    {
        let mut stats = WorkerStats::default();
        let mut iteration = Iteration::new(worker);
        let mut added = Vec::new();
        let idle = Backoff::new();
        let contention = Backoff::new();
        let mut idle_steps = 0u32;

        while !self.failed.load(Ordering::Acquire) {
            let gate = self.barriered.then(|| self.round_gate.read());
            match self.worklist.pop(worker) {
                Some(task) => {
                    self.in_flight.fetch_add(1, Ordering::AcqRel);
                    let conflicted =
                        self.execute(task, &mut iteration, &mut added, &mut stats, body);
                    self.in_flight.fetch_sub(1, Ordering::AcqRel);
                    drop(gate);

                    idle.reset();
                    idle_steps = 0;
                    if conflicted {
                        contention.snooze();
                    } else {
                        contention.reset();
                    }
                }
                None => {
                    drop(gate);
                    if self.pending.load(Ordering::Acquire) == 0 {
                        break;
                    }
                    if self.barriered
                        && self.in_flight.load(Ordering::Acquire) == 0
                        && self.try_advance_round()
                    {
                        continue;
                    }
                    if idle_steps < self.spin_limit {
                        idle.snooze();
                        idle_steps += 1;
                    } else {
                        std::thread::sleep(IDLE_SLEEP);
                    }
                }
            }
        }
        stats
    }

    /// Run one attempt of `task`; returns `true` if it lost a conflict
    fn execute<'env, F>(
        &self,
        mut task: Task<T>,
        iteration: &mut Iteration<'env>,
        added: &mut Vec<T>,
        stats: &mut WorkerStats,
        body: &F,
    ) -> bool
    where
        F: Fn(&T, &mut Context<'_, 'env, T>) -> Result<(), IterationError> + Sync,
    {
        let worker = iteration.worker();
        let id = self.manager.begin(iteration, task.birth);
        task.attempts += 1;
        added.clear();

        let outcome = {
            let mut ctx = Context::new(iteration, self.manager, added, stats);
            panic::catch_unwind(AssertUnwindSafe(|| body(&task.item, &mut ctx)))
        };
        // A wounded iteration must not commit even if its body finished
        let outcome = match outcome {
            Ok(Ok(())) if self.manager.is_wounded(iteration) => {
                Ok(Err(IterationError::Conflict(Conflict::voluntary(id))))
            }
            other => other,
        };

        let mut conflicted = false;
        match outcome {
            Ok(Ok(())) => {
                let completion = iteration.commit();
                stats.record_commit(&completion, task.attempts);
                self.pending.fetch_add(added.len(), Ordering::AcqRel);
                for item in added.drain(..) {
                    self.worklist.push(worker, Task::new(item));
                }
                self.pending.fetch_sub(1, Ordering::AcqRel);
            }
            Ok(Err(IterationError::Conflict(conflict))) => {
                let completion = iteration.abort(AbortReason::Conflict(conflict));
                stats.aborted_conflict += 1;
                stats.record_abort(&completion);
                trace!(iteration = %id, attempts = task.attempts, %conflict, "aborted on conflict");
                task.birth = Some(iteration.birth());
                self.worklist.push_retry(worker, task);
                conflicted = true;
            }
            Ok(Err(IterationError::NotUseful)) => {
                let completion = iteration.abort(AbortReason::NotUseful);
                stats.aborted_not_useful += 1;
                stats.record_abort(&completion);
                trace!(iteration = %id, attempts = task.attempts, "aborted as not useful");
                self.pending.fetch_sub(1, Ordering::AcqRel);
            }
            Ok(Err(IterationError::Invariant(message))) => {
                let completion = iteration.abort(AbortReason::Invariant(message.clone()));
                stats.aborted_fatal += 1;
                stats.record_abort(&completion);
                self.fail(ExecutionError::ClientInvariant {
                    iteration: id,
                    message,
                });
            }
            Err(payload) => {
                let completion = iteration.abort(AbortReason::Panicked);
                stats.aborted_fatal += 1;
                stats.record_abort(&completion);
                self.fail(ExecutionError::WorkerPanicked {
                    worker,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
        added.clear();
        self.manager.finish(worker);
        conflicted
    }

    /// Advance the round if no iteration is running; `true` on success
    fn try_advance_round(&self) -> bool {
        match self.round_gate.try_write() {
            Some(_exclusive) => self.advance_round(),
            None => false,
        }
    }

    fn advance_round(&self) -> bool {
        if !self.worklist.advance_round() {
            return false;
        }
        let round = self.rounds.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(
            round,
            pending = self.pending.load(Ordering::Acquire),
            "round advanced"
        );
        true
    }

    /// Record the first failure and stop every worker
    fn fail(&self, error: ExecutionError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error);
        }
        self.failed.store(true, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
