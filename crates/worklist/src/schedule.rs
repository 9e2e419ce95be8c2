//! Scheduling rules and their composition
//!
//! A [`Schedule`] is a chain of [`Rule`]s. The first rule decides the
//! outer structure of the worklist; each later rule says how the previous
//! one orders the items it considers equivalent.
//!
//! ## Composition
//!
//! | Rule | Contents are organised by the rest of the chain as |
//! |------|-----------------------------------------------------|
//! | `Fifo`, `Lifo` | terminal; nothing may follow |
//! | `Chunked(n)` | order of items inside each chunk |
//! | `Ordered(cmp)` | tie-breaks; a later `Chunked(n)` claims `n` items at a time |
//! | `Bucketed(n)` | a full worklist per bucket |
//! | `BulkSynchronous` | a full worklist per round; only allowed first |
//!
//! Inside a chunk or as a tie-break, `Ordered` contributes its comparator,
//! `Bucketed` contributes its key, and `Fifo`/`Lifo` pick the arrival order
//! (FIFO when neither is given).
//!
//! ```
//! use amorph_worklist::{Rule, Schedule};
//!
//! // delta-stepping: 64 distance buckets, chunked FIFO inside each bucket
//! let by_distance = |&(_, d): &(u32, u64)| (d / 10) as usize;
//! let schedule = Schedule::first(Rule::bucketed(64, by_distance)).then(Rule::chunked(16));
//! assert!(schedule.validate().is_ok());
//! assert_eq!(schedule.to_string(), "bucketed(64) > chunked(16)");
//! ```

use crate::{Bucketed, BulkSynchronous, Chunked, Fifo, Lifo, Ordered, Worklist};
use amorph_core::ScheduleError;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Default chunk size of [`Schedule::default`]
pub const DEFAULT_CHUNK_SIZE: usize = 32;

/// Total order over work items; `Less` is dequeued first
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Integer key of a work item
pub type KeyFn<T> = Arc<dyn Fn(&T) -> usize + Send + Sync>;

/// One scheduling policy in a chain
pub enum Rule<T> {
    /// Arrival order
    Fifo,
    /// Reverse arrival order
    Lifo,
    /// Client comparator; smallest first
    Ordered(Comparator<T>),
    /// Batches of the given size
    Chunked(usize),
    /// Integer-keyed buckets
    Bucketed {
        /// Number of buckets; keys at or above are clamped to the last one
        buckets: usize,
        /// Bucket index of an item
        key: KeyFn<T>,
        /// Lowest bucket first if `true`, highest first otherwise
        ascending: bool,
    },
    /// Rounds separated by a barrier
    BulkSynchronous,
}

impl<T> Rule<T> {
    /// Priority order by comparator
    pub fn ordered(cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        Rule::Ordered(Arc::new(cmp))
    }

    /// Priority order by a key; smallest key first
    pub fn ordered_by_key<K: Ord>(key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        Rule::Ordered(Arc::new(move |a: &T, b: &T| key(a).cmp(&key(b))))
    }

    /// Batches of `size` items
    pub fn chunked(size: usize) -> Self {
        Rule::Chunked(size)
    }

    /// `buckets` buckets, lowest key first
    pub fn bucketed(buckets: usize, key: impl Fn(&T) -> usize + Send + Sync + 'static) -> Self {
        Rule::Bucketed {
            buckets,
            key: Arc::new(key),
            ascending: true,
        }
    }

    /// `buckets` buckets, highest key first
    pub fn bucketed_descending(
        buckets: usize,
        key: impl Fn(&T) -> usize + Send + Sync + 'static,
    ) -> Self {
        Rule::Bucketed {
            buckets,
            key: Arc::new(key),
            ascending: false,
        }
    }

    /// Short name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Fifo => "fifo",
            Rule::Lifo => "lifo",
            Rule::Ordered(_) => "ordered",
            Rule::Chunked(_) => "chunked",
            Rule::Bucketed { .. } => "bucketed",
            Rule::BulkSynchronous => "bulk_synchronous",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Rule::Fifo | Rule::Lifo)
    }
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        match self {
            Rule::Fifo => Rule::Fifo,
            Rule::Lifo => Rule::Lifo,
            Rule::Ordered(cmp) => Rule::Ordered(Arc::clone(cmp)),
            Rule::Chunked(n) => Rule::Chunked(*n),
            Rule::Bucketed {
                buckets,
                key,
                ascending,
            } => Rule::Bucketed {
                buckets: *buckets,
                key: Arc::clone(key),
                ascending: *ascending,
            },
            Rule::BulkSynchronous => Rule::BulkSynchronous,
        }
    }
}

impl<T> fmt::Display for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Chunked(n) => write!(f, "chunked({})", n),
            Rule::Bucketed {
                buckets, ascending, ..
            } => {
                if *ascending {
                    write!(f, "bucketed({})", buckets)
                } else {
                    write!(f, "bucketed_desc({})", buckets)
                }
            }
            other => f.write_str(other.name()),
        }
    }
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// One step of a [`Tiebreak`]
enum TieStep<T> {
    Compare(Comparator<T>),
    Key { key: KeyFn<T>, ascending: bool },
}

impl<T> TieStep<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        match self {
            TieStep::Compare(cmp) => cmp(a, b),
            TieStep::Key { key, ascending } => {
                let order = key(a).cmp(&key(b));
                if *ascending {
                    order
                } else {
                    order.reverse()
                }
            }
        }
    }
}

impl<T> Clone for TieStep<T> {
    fn clone(&self) -> Self {
        match self {
            TieStep::Compare(cmp) => TieStep::Compare(Arc::clone(cmp)),
            TieStep::Key { key, ascending } => TieStep::Key {
                key: Arc::clone(key),
                ascending: *ascending,
            },
        }
    }
}

/// Composite order used for tie-breaks and for ordering inside a chunk
///
/// Comparators and keys apply in sequence; items equal under all of them
/// are ordered by arrival (oldest first unless `lifo`).
pub struct Tiebreak<T> {
    steps: Vec<TieStep<T>>,
    lifo: bool,
}

impl<T> Tiebreak<T> {
    /// Plain arrival order
    pub fn arrival(lifo: bool) -> Self {
        Tiebreak {
            steps: Vec::new(),
            lifo,
        }
    }

    /// Put `cmp` in front of the existing steps
    pub fn prepend(mut self, cmp: Comparator<T>) -> Self {
        self.steps.insert(0, TieStep::Compare(cmp));
        self
    }

    /// Check if only arrival order applies
    pub fn is_arrival_only(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check if equal items come out newest first
    pub fn is_lifo(&self) -> bool {
        self.lifo
    }

    /// Compare two items, ignoring arrival
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        for step in &self.steps {
            match step.compare(a, b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    /// Compare two items, breaking final ties by arrival sequence
    pub fn compare_with_arrival(&self, a: &T, a_seq: u64, b: &T, b_seq: u64) -> Ordering {
        self.compare(a, b).then_with(|| {
            if self.lifo {
                b_seq.cmp(&a_seq)
            } else {
                a_seq.cmp(&b_seq)
            }
        })
    }

    /// Sort `items` (given in arrival order) into dequeue order
    pub fn sort<W: Borrow<T>>(&self, items: &mut [W]) {
        if self.lifo {
            items.reverse();
        }
        if !self.steps.is_empty() {
            items.sort_by(|a, b| self.compare(a.borrow(), b.borrow()));
        }
    }
}

impl<T> Clone for Tiebreak<T> {
    fn clone(&self) -> Self {
        Tiebreak {
            steps: self.steps.clone(),
            lifo: self.lifo,
        }
    }
}

impl<T> fmt::Debug for Tiebreak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tiebreak")
            .field("steps", &self.steps.len())
            .field("lifo", &self.lifo)
            .finish()
    }
}

/// Ordered chain of scheduling rules
pub struct Schedule<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Schedule<T> {
    /// Start a chain with its outermost rule
    pub fn first(rule: Rule<T>) -> Self {
        Schedule { rules: vec![rule] }
    }

    /// Append a rule refining the previous one
    pub fn then(mut self, rule: Rule<T>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Build a chain from a list of rules
    pub fn from_rules(rules: Vec<Rule<T>>) -> Self {
        Schedule { rules }
    }

    /// Plain FIFO
    pub fn fifo() -> Self {
        Schedule::first(Rule::Fifo)
    }

    /// Chunked FIFO with chunks of `size`
    pub fn chunked(size: usize) -> Self {
        Schedule::first(Rule::Chunked(size))
    }

    /// Rules in precedence order
    pub fn rules(&self) -> &[Rule<T>] {
        &self.rules
    }

    /// Check if the schedule runs in bulk-synchronous rounds
    pub fn is_barriered(&self) -> bool {
        matches!(self.rules.first(), Some(Rule::BulkSynchronous))
    }

    /// Check that the chain can be built
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.rules.is_empty() {
            return Err(ScheduleError::Empty);
        }
        // Once an Ordered or Chunked rule is seen the rest of the chain only
        // contributes tie-breaks; `batch_allowed` tracks whether an Ordered
        // rule still accepts a Chunked batch size.
        let mut in_tiebreak = false;
        let mut batch_allowed = false;
        for (index, rule) in self.rules.iter().enumerate() {
            if index > 0 && self.rules[index - 1].is_terminal() {
                return Err(ScheduleError::UnreachableRule {
                    index,
                    rule: rule.name(),
                });
            }
            match rule {
                Rule::BulkSynchronous if index > 0 => {
                    return Err(ScheduleError::MisplacedBarrier { index });
                }
                Rule::Chunked(0) => return Err(ScheduleError::ZeroChunkSize),
                Rule::Bucketed { buckets: 0, .. } => return Err(ScheduleError::ZeroBuckets),
                Rule::Chunked(_) => {
                    if in_tiebreak && !batch_allowed {
                        return Err(ScheduleError::NestedChunk { index });
                    }
                    in_tiebreak = true;
                    batch_allowed = false;
                }
                Rule::Ordered(_) => {
                    if !in_tiebreak {
                        batch_allowed = true;
                    }
                    in_tiebreak = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Build the worklist for an invocation with `workers` workers
    ///
    /// The list stores `W`, usually `T` itself; rules see each item
    /// through `W: Borrow<T>`.
    pub fn build<'a, W>(&self, workers: usize) -> Result<Box<dyn Worklist<W> + 'a>, ScheduleError>
    where
        T: 'a,
        W: Borrow<T> + Send + 'a,
    {
        self.validate()?;
        Ok(build_chain(&self.rules, workers.max(1)))
    }
}

/// Build a validated chain
fn build_chain<'a, T, W>(rules: &[Rule<T>], workers: usize) -> Box<dyn Worklist<W> + 'a>
where
    T: 'a,
    W: Borrow<T> + Send + 'a,
{
    let Some((head, rest)) = rules.split_first() else {
        return Box::new(Fifo::new());
    };
    match head {
        Rule::Fifo => Box::new(Fifo::new()),
        Rule::Lifo => Box::new(Lifo::new()),
        Rule::Ordered(cmp) => {
            let (tiebreak, batch) = tiebreak_chain(rest);
            Box::new(Ordered::<T, W>::new(
                tiebreak.prepend(Arc::clone(cmp)),
                batch.unwrap_or(1),
                workers,
            ))
        }
        Rule::Chunked(size) => {
            let (tiebreak, _) = tiebreak_chain(rest);
            Box::new(Chunked::<T, W>::with_order(*size, tiebreak, workers))
        }
        Rule::Bucketed {
            buckets,
            key,
            ascending,
        } => {
            let inner = (0..*buckets).map(|_| build_chain(rest, workers)).collect();
            Box::new(Bucketed::<T, W>::from_parts(inner, Arc::clone(key), *ascending))
        }
        Rule::BulkSynchronous => Box::new(BulkSynchronous::from_waves(
            build_chain(rest, workers),
            build_chain(rest, workers),
        )),
    }
}

/// Fold the rest of a chain into a tie-break order and optional batch size
fn tiebreak_chain<T>(rules: &[Rule<T>]) -> (Tiebreak<T>, Option<usize>) {
    let mut tiebreak = Tiebreak::arrival(false);
    let mut batch = None;
    for rule in rules {
        match rule {
            Rule::Fifo => tiebreak.lifo = false,
            Rule::Lifo => tiebreak.lifo = true,
            Rule::Ordered(cmp) => tiebreak.steps.push(TieStep::Compare(Arc::clone(cmp))),
            Rule::Chunked(n) => batch = batch.or(Some(*n)),
            Rule::Bucketed { key, ascending, .. } => tiebreak.steps.push(TieStep::Key {
                key: Arc::clone(key),
                ascending: *ascending,
            }),
            Rule::BulkSynchronous => {}
        }
    }
    (tiebreak, batch)
}

impl<T> Default for Schedule<T> {
    fn default() -> Self {
        Schedule::chunked(DEFAULT_CHUNK_SIZE)
    }
}

impl<T> Clone for Schedule<T> {
    fn clone(&self) -> Self {
        Schedule {
            rules: self.rules.clone(),
        }
    }
}

impl<T> From<Rule<T>> for Schedule<T> {
    fn from(rule: Rule<T>) -> Self {
        Schedule::first(rule)
    }
}

impl<T> fmt::Display for Schedule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{}", rule)?;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Schedule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schedule({})", self)
    }
}
