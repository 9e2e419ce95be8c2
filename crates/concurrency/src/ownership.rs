//! Ownership registry
//!
//! Every shared mutable object embeds an [`OwnerSlot`]: one atomic word
//! naming the iteration that currently holds exclusive access, or zero.
//!
//! ## Protocol
//!
//! - Acquire is a single compare-and-set from "unowned" to the caller's id.
//!   It never waits. A failed CAS reports the current owner so the caller
//!   can abort itself.
//! - Acquiring an object the caller already owns is a no-op (re-entrant).
//! - Release is a compare-and-set from the caller's id back to zero, so a
//!   stale release can never free someone else's ownership.
//!
//! Since acquisition never blocks there is no lock ordering to respect and
//! deadlock cannot occur.

use amorph_core::IterationId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of [`OwnerSlot::try_acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The slot was free and now belongs to the caller
    Granted,
    /// The caller already owned the slot
    Reentrant,
    /// Another iteration owns the slot
    Held(IterationId),
}

/// Atomic owner record of one shared object
///
/// # Invariant
///
/// At most one iteration id is stored at any instant.
#[derive(Debug, Default)]
pub struct OwnerSlot {
    owner: AtomicU64,
}

impl OwnerSlot {
    /// Create an unowned slot
    pub const fn new() -> Self {
        OwnerSlot {
            owner: AtomicU64::new(0),
        }
    }

    /// Current owner, if any
    #[inline]
    pub fn owner(&self) -> Option<IterationId> {
        IterationId::from_raw(self.owner.load(Ordering::Acquire))
    }

    /// Check if no iteration owns this slot
    #[inline]
    pub fn is_free(&self) -> bool {
        self.owner.load(Ordering::Acquire) == 0
    }

    /// Check if `id` owns this slot
    #[inline]
    pub fn is_owned_by(&self, id: IterationId) -> bool {
        self.owner.load(Ordering::Acquire) == id.raw()
    }

    /// Try to take ownership for `id` without waiting
    ///
    /// A successful acquire synchronizes with the previous owner's release,
    /// so every mutation the previous owner made is visible to `id`.
    #[inline]
    pub fn try_acquire(&self, id: IterationId) -> Acquire {
        let raw = id.raw();
        let mut current = self.owner.load(Ordering::Acquire);
        loop {
            if current == raw {
                return Acquire::Reentrant;
            }
            if let Some(owner) = IterationId::from_raw(current) {
                return Acquire::Held(owner);
            }
            match self
                .owner
                .compare_exchange(0, raw, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Acquire::Granted,
                Err(actual) => current = actual,
            }
        }
    }

    /// Release ownership held by `id`
    ///
    /// Returns `false` (and changes nothing) if `id` is not the owner.
    #[inline]
    pub fn release(&self, id: IterationId) -> bool {
        self.owner
            .compare_exchange(id.raw(), 0, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }
}

/// Capability every shared mutable object must provide
///
/// The runtime only needs access to the object's owner record; mutation
/// stays in client code. Checked and unchecked access are offered by the
/// iteration context on top of this.
///
/// # Example
///
/// ```
/// use amorph_concurrency::{Lockable, OwnerSlot};
///
/// struct Vertex {
///     slot: OwnerSlot,
///     label: std::sync::atomic::AtomicU32,
/// }
///
/// impl Lockable for Vertex {
///     fn owner_slot(&self) -> &OwnerSlot {
///         &self.slot
///     }
/// }
/// ```
pub trait Lockable {
    /// The object's ownership record
    fn owner_slot(&self) -> &OwnerSlot;
}

impl Lockable for OwnerSlot {
    fn owner_slot(&self) -> &OwnerSlot {
        self
    }
}

impl<L: Lockable + ?Sized> Lockable for std::sync::Arc<L> {
    fn owner_slot(&self) -> &OwnerSlot {
        (**self).owner_slot()
    }
}

impl<L: Lockable + ?Sized> Lockable for Box<L> {
    fn owner_slot(&self) -> &OwnerSlot {
        (**self).owner_slot()
    }
}
