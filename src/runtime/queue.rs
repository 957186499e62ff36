//! Priority-ordered work queue of pending computations.
//!
//! The comparator is supplied once, at queue construction. Priority is a
//! pure function of the payload, recomputed through the comparator on every
//! insertion and never cached: the queue never reorders two entries without
//! the comparator being invoked. Ties retain relative insertion order.

use std::cmp::Ordering;
use std::fmt;

use crate::program::Transformation;
use crate::runtime::value::Value;

/// One value paired with its remaining instruction stack; the unit the
/// queue schedules. The top of the stack is the last element.
#[derive(Debug)]
pub struct Entry<P> {
    /// The value this lineage is computing.
    pub value: Value<P>,
    /// Not-yet-applied transformations, next instruction last.
    pub stack: Vec<Transformation>,
}

impl<P> Entry<P> {
    /// Create an entry over the given instruction stack (next instruction
    /// last).
    pub fn new(value: Value<P>, stack: Vec<Transformation>) -> Self {
        Self { value, stack }
    }

    /// Whether this lineage has finished evaluating.
    pub fn completed(&self) -> bool {
        self.stack.is_empty()
    }
}

type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Ordered collection of entries, highest priority first.
///
/// `compare(a, b) == Greater` means `a` executes sooner.
pub struct WorkQueue<T: 'static> {
    entries: Vec<T>,
    compare: Comparator<T>,
}

impl<T: 'static> WorkQueue<T> {
    /// Create an empty queue ordered by the given comparator.
    pub fn new(compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        Self {
            entries: Vec::new(),
            compare: Box::new(compare),
        }
    }

    /// Insert keeping descending priority order; ties go after existing
    /// entries of equal priority (stable).
    pub fn push(&mut self, item: T) {
        let position = self
            .entries
            .iter()
            .position(|existing| (self.compare)(&item, existing) == Ordering::Greater)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, item);
    }

    /// Remove and return the highest-priority item, if any.
    pub fn pop(&mut self) -> Option<T> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// The highest-priority item without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.entries.first()
    }

    /// Iterate items in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_value(a: &i32, b: &i32) -> Ordering {
        a.cmp(b)
    }

    #[test]
    fn pop_returns_highest_priority_first() {
        let mut queue = WorkQueue::new(by_value);
        for n in [3, 1, 4, 1, 5] {
            queue.push(n);
        }

        let mut drained = Vec::new();
        while let Some(n) = queue.pop() {
            drained.push(n);
        }
        assert_eq!(drained, vec![5, 4, 3, 1, 1]);
    }

    #[test]
    fn peek_matches_pop() {
        let mut queue = WorkQueue::new(by_value);
        queue.push(2);
        queue.push(7);
        assert_eq!(queue.peek(), Some(&7));
        assert_eq!(queue.pop(), Some(7));
        assert_eq!(queue.peek(), Some(&2));
    }

    #[test]
    fn ties_retain_insertion_order() {
        // Compare only the priority component; the payload tells insertion
        // order apart.
        let mut queue =
            WorkQueue::new(|a: &(i32, &'static str), b: &(i32, &'static str)| a.0.cmp(&b.0));
        queue.push((1, "first"));
        queue.push((1, "second"));
        queue.push((1, "third"));

        assert_eq!(queue.pop().unwrap().1, "first");
        assert_eq!(queue.pop().unwrap().1, "second");
        assert_eq!(queue.pop().unwrap().1, "third");
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let mut queue: WorkQueue<i32> = WorkQueue::new(by_value);
        assert!(queue.pop().is_none());
        assert!(queue.peek().is_none());
    }
}
