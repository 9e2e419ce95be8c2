//! Ready-made shared objects
//!
//! [`SpecCell`] wraps a value together with its ownership record, so simple
//! clients need not implement [`Lockable`] and undo by hand. Reads and
//! writes inside a body go through the iteration [`Context`]; a write in a
//! mode that saves undo logs the previous value before replacing it.

use crate::context::Context;
use amorph_concurrency::{Lockable, OwnerSlot};
use amorph_core::{AccessMode, IterationError};
use parking_lot::Mutex;

/// A value guarded by speculative ownership
///
/// The inner mutex is only ever taken by the current owner (or outside any
/// `foreach`), so it is uncontended; it exists to make the cell `Sync`.
pub struct SpecCell<V> {
    slot: OwnerSlot,
    value: Mutex<V>,
}

impl<V> SpecCell<V> {
    /// Wrap `value`
    pub fn new(value: V) -> Self {
        SpecCell {
            slot: OwnerSlot::new(),
            value: Mutex::new(value),
        }
    }

    /// Acquire the cell and read it through `f`
    pub fn with<'env, T, R>(
        &'env self,
        ctx: &mut Context<'_, 'env, T>,
        f: impl FnOnce(&V) -> R,
    ) -> Result<R, IterationError> {
        ctx.acquire(self)?;
        let guard = self.value.lock();
        Ok(f(&*guard))
    }

    /// Acquire the cell and clone its value
    pub fn read<'env, T>(&'env self, ctx: &mut Context<'_, 'env, T>) -> Result<V, IterationError>
    where
        V: Clone,
    {
        self.with(ctx, V::clone)
    }

    /// Acquire the cell and replace its value; restored on abort
    pub fn write<'env, T>(
        &'env self,
        ctx: &mut Context<'_, 'env, T>,
        value: V,
    ) -> Result<(), IterationError>
    where
        V: Clone + 'env,
    {
        self.update(ctx, |v| *v = value)
    }

    /// Acquire the cell and mutate it in place; restored on abort
    pub fn update<'env, T, R>(
        &'env self,
        ctx: &mut Context<'_, 'env, T>,
        f: impl FnOnce(&mut V) -> R,
    ) -> Result<R, IterationError>
    where
        V: Clone + 'env,
    {
        self.update_with(ctx, AccessMode::Full, f)
    }

    /// Mutate the cell under an explicit [`AccessMode`]
    ///
    /// The cell is acquired only if `mode` checks conflicts and the old
    /// value is saved only if `mode` saves undo. Modes that skip the
    /// acquire are only correct when the iteration already owns the cell;
    /// a saved value is not restored on abort unless the cell is owned.
    pub fn update_with<'env, T, R>(
        &'env self,
        ctx: &mut Context<'_, 'env, T>,
        mode: AccessMode,
        f: impl FnOnce(&mut V) -> R,
    ) -> Result<R, IterationError>
    where
        V: Clone + 'env,
    {
        ctx.access(self, mode)?;
        let mut guard = self.value.lock();
        if mode.saves_undo() {
            let old = guard.clone();
            ctx.register_undo_for(self, move || *self.value.lock() = old);
        }
        Ok(f(&mut *guard))
    }

    /// Clone the value without any ownership check
    ///
    /// For use outside `foreach`, or on cells the iteration already owns.
    pub fn get_unchecked(&self) -> V
    where
        V: Clone,
    {
        self.value.lock().clone()
    }

    /// Mutable access through exclusive borrow
    pub fn get_mut(&mut self) -> &mut V {
        self.value.get_mut()
    }

    /// Unwrap the value
    pub fn into_inner(self) -> V {
        self.value.into_inner()
    }
}

impl<V: Default> Default for SpecCell<V> {
    fn default() -> Self {
        SpecCell::new(V::default())
    }
}

impl<V> Lockable for SpecCell<V> {
    fn owner_slot(&self) -> &OwnerSlot {
        &self.slot
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for SpecCell<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("SpecCell");
        s.field("owner", &self.slot.owner());
        match self.value.try_lock() {
            Some(v) => s.field("value", &*v),
            None => s.field("value", &"<locked>"),
        };
        s.finish()
    }
}
