//! Iteration context handed to loop bodies
//!
//! A [`Context`] is the body's only handle on the runtime: it acquires
//! shared objects for the running iteration, records compensating actions,
//! buffers new work and raises the voluntary signals. Every fallible call
//! returns [`IterationError`] so bodies propagate with `?`.
//!
//! ```ignore
//! runtime.foreach(edges, Schedule::fifo(), |&(a, b), ctx| {
//!     ctx.acquire_all([&nodes[a], &nodes[b]])?;
//!     let old = nodes[a].rank();
//!     ctx.register_undo(move || nodes[a].set_rank(old));
//!     nodes[a].set_rank(old + 1);
//!     Ok(())
//! })?;
//! ```

use crate::stats::WorkerStats;
use amorph_concurrency::{Iteration, IterationManager, Lockable, UndoEntry};
use amorph_core::{AccessMode, Conflict, IterationError, IterationId, WorkerId};
use tracing::warn;

/// Handle on the running iteration
///
/// `'env` is the lifetime of the shared objects the body may acquire;
/// `T` is the work item type, so [`Context::add`] can enqueue new items.
pub struct Context<'a, 'env, T> {
    iteration: &'a mut Iteration<'env>,
    manager: &'a IterationManager,
    added: &'a mut Vec<T>,
    stats: &'a mut WorkerStats,
}

impl<'a, 'env, T> Context<'a, 'env, T> {
    pub(crate) fn new(
        iteration: &'a mut Iteration<'env>,
        manager: &'a IterationManager,
        added: &'a mut Vec<T>,
        stats: &'a mut WorkerStats,
    ) -> Self {
        Context {
            iteration,
            manager,
            added,
            stats,
        }
    }

    /// Worker running this iteration
    pub fn worker_id(&self) -> WorkerId {
        self.iteration.worker()
    }

    /// Identifier of this attempt
    pub fn iteration_id(&self) -> IterationId {
        self.iteration.id()
    }

    /// Enqueue a new work item
    ///
    /// The item becomes visible to other workers only if this iteration
    /// commits; an aborted attempt drops everything it added.
    pub fn add(&mut self, item: T) {
        self.added.push(item);
    }

    /// Number of items added by this attempt so far
    pub fn added_len(&self) -> usize {
        self.added.len()
    }

    /// Acquire `object` for this iteration through the conflict protocol
    ///
    /// Re-acquiring an object this iteration already owns succeeds without
    /// effect. On failure the body should return the error immediately;
    /// the driver rolls the iteration back and retries the item.
    pub fn acquire<L: Lockable + ?Sized>(&mut self, object: &'env L) -> Result<(), IterationError> {
        if self.manager.is_wounded(self.iteration) {
            return Err(self.wounded());
        }
        match self.iteration.acquire(object.owner_slot()) {
            Ok(_) => Ok(()),
            Err(conflict) => {
                if self.manager.resolve_conflict(self.iteration, &conflict) {
                    self.stats.wounds += 1;
                }
                self.note_conflict(&conflict);
                Err(IterationError::Conflict(conflict))
            }
        }
    }

    /// Access `object` under `mode`
    ///
    /// Only modes that check conflicts acquire ownership; the others
    /// assume the caller already holds the object.
    pub fn access<L: Lockable + ?Sized>(
        &mut self,
        object: &'env L,
        mode: AccessMode,
    ) -> Result<(), IterationError> {
        if mode.checks_conflict() {
            self.acquire(object)
        } else {
            Ok(())
        }
    }

    /// Acquire every object before touching any of them
    ///
    /// Cautious bodies acquire their whole neighborhood first and mutate
    /// afterwards, so a conflict never has anything to undo.
    pub fn acquire_all<L, I>(&mut self, objects: I) -> Result<(), IterationError>
    where
        L: Lockable + ?Sized + 'env,
        I: IntoIterator<Item = &'env L>,
    {
        for object in objects {
            self.acquire(object)?;
        }
        Ok(())
    }

    /// Check if this iteration currently owns `object`
    pub fn owns<L: Lockable + ?Sized>(&self, object: &L) -> bool {
        self.iteration.owns(object.owner_slot())
    }

    /// Register a compensating action, run newest-first on abort
    pub fn register_undo(&mut self, inverse: impl FnOnce() + 'env) {
        self.iteration.register_undo(UndoEntry::new(inverse));
    }

    /// Register a compensating action for a mutation of `object`
    ///
    /// The entry is skipped on replay if this iteration does not own the
    /// object at rollback.
    pub fn register_undo_for<L: Lockable + ?Sized>(
        &mut self,
        object: &'env L,
        inverse: impl FnOnce() + 'env,
    ) {
        self.iteration
            .register_undo(UndoEntry::for_object(object, inverse));
    }

    /// Register an action run only if this iteration commits
    pub fn on_commit(&mut self, action: impl FnOnce() + 'env) {
        self.iteration.on_commit(action);
    }

    /// Abort this iteration and retry its item later
    ///
    /// ```ignore
    /// return Err(ctx.raise_conflict());
    /// ```
    pub fn raise_conflict(&mut self) -> IterationError {
        IterationError::Conflict(Conflict::voluntary(self.iteration.id()))
    }

    /// Abandon this iteration without retrying its item
    pub fn signal_not_useful(&mut self) -> IterationError {
        IterationError::NotUseful
    }

    /// Declare that this iteration acquires nothing further
    ///
    /// The promise is not enforced. A conflict raised afterwards is still
    /// handled (rolled back and retried) but is logged and counted as a
    /// fail-safe violation.
    pub fn fail_safe(&mut self) {
        self.iteration.mark_fail_safe();
    }

    /// Check if the fail-safe point was declared
    pub fn is_fail_safe(&self) -> bool {
        self.iteration.past_fail_safe()
    }

    fn wounded(&mut self) -> IterationError {
        let conflict = Conflict::voluntary(self.iteration.id());
        self.note_conflict(&conflict);
        IterationError::Conflict(conflict)
    }

    fn note_conflict(&mut self, conflict: &Conflict) {
        if self.iteration.past_fail_safe() {
            self.stats.fail_safe_violations += 1;
            warn!(%conflict, "conflict after fail-safe point");
        }
    }
}

impl<T> std::fmt::Debug for Context<'_, '_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("iteration", &self.iteration)
            .field("added", &self.added.len())
            .finish()
    }
}
