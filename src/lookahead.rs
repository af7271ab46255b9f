//! Lookahead terminal sets.

use crate::grammar::{Grammar, TerminalID};
use std::fmt;

/// A fixed-width set of terminal symbols, eof included.
///
/// Bit positions are raw `TerminalID`s, so bit 0 holds the end-of-input
/// marker. `FirstSets` overloads that bit to mean "derives ε"; the set
/// itself attaches no meaning to it.
#[derive(Clone, PartialEq, Eq)]
pub struct LookaheadSet {
    inner: bit_set::BitSet,
}

impl LookaheadSet {
    /// An empty set sized for every terminal of `g` plus eof.
    pub fn new(g: &Grammar) -> Self {
        Self {
            inner: bit_set::BitSet::with_capacity(g.terminal_count()),
        }
    }

    pub fn insert(&mut self, t: TerminalID) -> bool {
        self.inner.insert(t.index())
    }

    pub fn remove(&mut self, t: TerminalID) -> bool {
        self.inner.remove(t.index())
    }

    pub fn contains(&self, t: TerminalID) -> bool {
        self.inner.contains(t.index())
    }

    pub fn clear(&mut self) {
        self.inner.clear()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// OR `other` into `self`, reporting whether any bit was gained.
    ///
    /// Every fixpoint loop built on these sets terminates on this report
    /// turning false.
    pub fn merge(&mut self, other: &Self) -> bool {
        let before = self.inner.len();
        self.inner.union_with(&other.inner);
        self.inner.len() != before
    }

    /// The contained terminals in ascending bit order.
    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner.iter().map(|raw| TerminalID::from_raw(raw as u16))
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        crate::util::display_fn(|f| {
            f.write_str("[")?;
            for (i, t) in self.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                f.write_str(g.terminal(t).name())?;
            }
            f.write_str("]")
        })
    }
}

impl fmt::Debug for LookaheadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
