//! Invocation statistics
//!
//! Each worker counts into its own [`WorkerStats`]; the counters are merged
//! when the workers are joined, so the hot path never touches shared
//! memory for bookkeeping.

use amorph_concurrency::Completion;
use amorph_core::InvocationId;
use serde::Serialize;
use std::time::Duration;

/// Counters kept by one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Iterations committed
    pub committed: u64,
    /// Iterations aborted on a conflict (and retried)
    pub aborted_conflict: u64,
    /// Iterations abandoned as not useful
    pub aborted_not_useful: u64,
    /// Iterations rolled back for an invariant violation or panic
    pub aborted_fatal: u64,
    /// Ownership records acquired
    pub acquisitions: u64,
    /// Ownership records released
    pub releases: u64,
    /// Undo entries replayed
    pub undo_actions_replayed: u64,
    /// Commit actions run
    pub commit_actions_run: u64,
    /// Owners wounded under the younger-aborts policy
    pub wounds: u64,
    /// Conflicts raised after a declared fail-safe point
    pub fail_safe_violations: u64,
    /// Most attempts any committed item needed
    pub max_attempts: u32,
}

impl WorkerStats {
    /// Count a completed commit of an item on its `attempts`-th try
    pub fn record_commit(&mut self, completion: &Completion, attempts: u32) {
        self.committed += 1;
        self.record(completion);
        self.max_attempts = self.max_attempts.max(attempts);
    }

    /// Count the bookkeeping of an abort; the caller counts the reason
    pub fn record_abort(&mut self, completion: &Completion) {
        self.record(completion);
    }

    fn record(&mut self, completion: &Completion) {
        self.acquisitions += completion.acquired as u64;
        self.releases += completion.released as u64;
        self.undo_actions_replayed += completion.undone as u64;
        self.commit_actions_run += completion.commit_actions as u64;
    }

    /// Add another worker's counters
    pub fn merge(&mut self, other: &WorkerStats) {
        self.committed += other.committed;
        self.aborted_conflict += other.aborted_conflict;
        self.aborted_not_useful += other.aborted_not_useful;
        self.aborted_fatal += other.aborted_fatal;
        self.acquisitions += other.acquisitions;
        self.releases += other.releases;
        self.undo_actions_replayed += other.undo_actions_replayed;
        self.commit_actions_run += other.commit_actions_run;
        self.wounds += other.wounds;
        self.fail_safe_violations += other.fail_safe_violations;
        self.max_attempts = self.max_attempts.max(other.max_attempts);
    }
}

/// Summary of one `foreach` invocation
#[derive(Debug, Clone, Serialize)]
pub struct ForeachReport {
    /// Invocation identifier (also recorded on the tracing span)
    pub invocation: InvocationId,
    /// Workers used
    pub threads: usize,
    /// Iterations committed
    pub committed: u64,
    /// Iterations aborted on a conflict
    pub aborted_conflict: u64,
    /// Iterations abandoned as not useful
    pub aborted_not_useful: u64,
    /// Ownership records acquired
    pub acquisitions: u64,
    /// Ownership records released
    pub releases: u64,
    /// Undo entries replayed
    pub undo_actions_replayed: u64,
    /// Owners wounded under the younger-aborts policy
    pub wounds: u64,
    /// Bulk-synchronous rounds executed (0 for other schedules)
    pub rounds: u64,
    /// Conflicts raised after a declared fail-safe point
    pub fail_safe_violations: u64,
    /// Most attempts any committed item needed
    pub max_attempts: u32,
    /// Wall-clock time of the invocation
    pub elapsed: Duration,
}

impl ForeachReport {
    pub(crate) fn new(
        invocation: InvocationId,
        threads: usize,
        stats: &WorkerStats,
        rounds: u64,
        elapsed: Duration,
    ) -> Self {
        ForeachReport {
            invocation,
            threads,
            committed: stats.committed,
            aborted_conflict: stats.aborted_conflict,
            aborted_not_useful: stats.aborted_not_useful,
            acquisitions: stats.acquisitions,
            releases: stats.releases,
            undo_actions_replayed: stats.undo_actions_replayed,
            wounds: stats.wounds,
            rounds,
            fail_safe_violations: stats.fail_safe_violations,
            max_attempts: stats.max_attempts,
            elapsed,
        }
    }

    /// Iterations aborted for any reason
    pub fn aborted(&self) -> u64 {
        self.aborted_conflict + self.aborted_not_useful
    }

    /// Iterations started
    pub fn attempts(&self) -> u64 {
        self.committed + self.aborted()
    }

    /// Committed share of attempts (0.0 - 1.0)
    pub fn commit_rate(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            n => self.committed as f64 / n as f64,
        }
    }

    /// Conflict-aborted share of attempts (0.0 - 1.0)
    pub fn abort_rate(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            n => self.aborted_conflict as f64 / n as f64,
        }
    }
}

/// Counters accumulated over every invocation of a runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeTotals {
    /// Invocations that completed successfully
    pub invocations: u64,
    /// Invocations that returned an error
    pub failed_invocations: u64,
    /// Iterations committed
    pub committed: u64,
    /// Iterations aborted on a conflict
    pub aborted_conflict: u64,
    /// Iterations abandoned as not useful
    pub aborted_not_useful: u64,
    /// Bulk-synchronous rounds executed
    pub rounds: u64,
}

impl RuntimeTotals {
    pub(crate) fn add(&mut self, stats: &WorkerStats, rounds: u64, failed: bool) {
        if failed {
            self.failed_invocations += 1;
        } else {
            self.invocations += 1;
        }
        self.committed += stats.committed;
        self.aborted_conflict += stats.aborted_conflict;
        self.aborted_not_useful += stats.aborted_not_useful;
        self.rounds += rounds;
    }

    /// Committed share of all attempts (0.0 - 1.0)
    pub fn commit_rate(&self) -> f64 {
        let attempts = self.committed + self.aborted_conflict + self.aborted_not_useful;
        if attempts == 0 {
            0.0
        } else {
            self.committed as f64 / attempts as f64
        }
    }
}
