//! Dedup-interning worklists.

use crate::types::Map;
use std::{collections::VecDeque, hash::Hash};

/// A worklist fused with an interning map.
///
/// Every distinct key is assigned an ascending index at first enqueue and
/// keeps it for the lifetime of the process; the queue carries indices that
/// still need processing, each at most once. The key is an entry's identity,
/// the value the payload that callers widen as lookaheads merge; a fixpoint
/// has been reached once no merge reports a change and the queue drains.
#[derive(Debug)]
pub struct ConvergentProcess<K, V> {
    entries: Map<K, V>,
    queue: VecDeque<usize>,
    queued: Vec<bool>,
}

impl<K, V> Default for ConvergentProcess<K, V> {
    fn default() -> Self {
        Self {
            entries: Map::default(),
            queue: VecDeque::new(),
            queued: Vec::new(),
        }
    }
}

impl<K, V> ConvergentProcess<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `key` and put its index on the queue.
    ///
    /// Returns the index and whether the key was already interned. An
    /// existing entry keeps its stored value (the passed `value` is dropped)
    /// and is re-queued only if it is not pending already.
    pub fn enqueue(&mut self, key: K, value: V) -> (usize, bool) {
        use indexmap::map::Entry;
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                let index = entry.index();
                self.push(index);
                (index, true)
            }
            Entry::Vacant(entry) => {
                let index = entry.index();
                entry.insert(value);
                self.queued.push(false);
                self.push(index);
                (index, false)
            }
        }
    }

    /// Pop the next pending index, marking it not-queued.
    pub fn next(&mut self) -> Option<usize> {
        let index = self.queue.pop_front()?;
        self.queued[index] = false;
        Some(index)
    }

    /// Put an interned entry back on the queue, unless it is pending already.
    pub fn requeue(&mut self, index: usize) {
        self.push(index);
    }

    fn push(&mut self, index: usize) {
        if !self.queued[index] {
            self.queued[index] = true;
            self.queue.push_back(index);
        }
    }

    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    pub fn get(&self, index: usize) -> Option<(&K, &V)> {
        self.entries.get_index(index)
    }

    pub fn value_mut(&mut self, index: usize) -> Option<&mut V> {
        self.entries.get_index_mut(index).map(|(_, v)| v)
    }

    /// The interned entries, in interning order. Append-only: indices handed
    /// out earlier keep pointing at the same entry.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.entries.into_values()
    }
}
