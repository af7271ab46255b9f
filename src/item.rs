//! LR(1) items and item sets.

use crate::grammar::{Grammar, NonterminalID, ProductionID, SymbolID};
use crate::lookahead::LookaheadSet;
use crate::util::display_fn;
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A dotted production: the identity half of an LR(1) item.
///
/// The lookahead is deliberately not part of this type. Everything that
/// hashes or compares items does so on the core alone; the lookahead is a
/// merged value attached to the core. Folding the lookahead into the
/// identity would yield canonical LR(1) states and defeat the LALR merge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemCore {
    pub production: ProductionID,
    pub dot: u16,
}

impl ItemCore {
    /// The item `A : · α` for the given production.
    pub fn start(production: ProductionID) -> Self {
        Self { production, dot: 0 }
    }

    /// The symbol right after the dot, if any.
    pub fn symbol_at_dot(&self, g: &Grammar) -> Option<SymbolID> {
        g.production(self.production).right().get(self.dot as usize).copied()
    }

    /// The nonterminal right after the dot, if any.
    pub fn nonterminal_at_dot(&self, g: &Grammar) -> Option<NonterminalID> {
        match self.symbol_at_dot(g) {
            Some(SymbolID::N(n)) => Some(n),
            _ => None,
        }
    }

    /// The symbols following the one at the dot (the β of `A : α · B β`).
    pub fn tail<'g>(&self, g: &'g Grammar) -> &'g [SymbolID] {
        let right = g.production(self.production).right();
        right.get(self.dot as usize + 1..).unwrap_or(&[])
    }

    /// The core with the dot advanced over one symbol, unless exhausted.
    pub fn shifted(&self, g: &Grammar) -> Option<ItemCore> {
        (!self.is_complete(g)).then(|| ItemCore {
            production: self.production,
            dot: self.dot + 1,
        })
    }

    /// Whether the dot sits at the end of the production.
    pub fn is_complete(&self, g: &Grammar) -> bool {
        self.dot as usize >= g.production(self.production).right().len()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            let production = g.production(self.production);
            write!(f, "({} :", g.nonterminal(production.left()).name())?;
            for (i, symbol) in production.right().iter().enumerate() {
                if i == self.dot as usize {
                    f.write_str(" .")?;
                }
                match symbol {
                    SymbolID::T(t) => write!(f, " {}", g.terminal(*t).name())?,
                    SymbolID::N(n) => write!(f, " {}", g.nonterminal(*n).name())?,
                }
            }
            if self.dot as usize == production.right().len() {
                f.write_str(" .")?;
            }
            f.write_str(")")
        })
    }
}

/// An ordered, deduplicated collection of items: cores mapped to their
/// merged lookaheads.
///
/// The map keeps `(production, dot)` order at all times, so equality of two
/// sets with the same cores is a single ordered scan and hashing is
/// deterministic. Equality and hash cover the cores only.
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    items: BTreeMap<ItemCore, LookaheadSet>,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, merging lookaheads when the core is present already.
    /// Reports whether the set gained a core or any lookahead bit.
    pub fn insert(&mut self, core: ItemCore, lookahead: LookaheadSet) -> bool {
        match self.items.entry(core) {
            btree_map::Entry::Occupied(mut entry) => entry.get_mut().merge(&lookahead),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(lookahead);
                true
            }
        }
    }

    /// Pairwise-OR the lookaheads of `other` into `self`.
    ///
    /// Both sets must hold identical cores; this is the LALR merge of two
    /// LR(0)-equivalent states.
    pub fn merge_lookaheads(&mut self, other: &ItemSet) -> bool {
        debug_assert!(self.same_cores(other), "cores differ");
        let mut changed = false;
        for (lookahead, other_lookahead) in self.items.values_mut().zip(other.items.values()) {
            changed |= lookahead.merge(other_lookahead);
        }
        changed
    }

    pub fn same_cores(&self, other: &ItemSet) -> bool {
        self.items.keys().eq(other.items.keys())
    }

    pub fn cores(&self) -> impl Iterator<Item = ItemCore> + '_ {
        self.items.keys().copied()
    }

    /// The cores as a vector, in canonical order. This is the LR(0) identity
    /// of the set, used as the interning key during family construction.
    pub fn core_vec(&self) -> Vec<ItemCore> {
        self.cores().collect()
    }

    pub fn lookahead(&self, core: &ItemCore) -> Option<&LookaheadSet> {
        self.items.get(core)
    }

    pub fn contains(&self, core: &ItemCore) -> bool {
        self.items.contains_key(core)
    }

    /// Items in canonical `(production, dot)` order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemCore, &LookaheadSet)> + '_ {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (core, lookahead) in &self.items {
                writeln!(f, "- {}  {}", core.display(g), lookahead.display(g))?;
            }
            Ok(())
        })
    }
}

impl PartialEq for ItemSet {
    fn eq(&self, other: &Self) -> bool {
        self.same_cores(other)
    }
}

impl Eq for ItemSet {}

impl Hash for ItemSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for core in self.items.keys() {
            core.hash(state);
        }
    }
}
