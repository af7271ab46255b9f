//! Calculation of FIRST sets.

use crate::grammar::{Grammar, NonterminalID, SymbolID, TerminalID};
use crate::lookahead::LookaheadSet;

/// Per-nonterminal FIRST sets.
///
/// ε-derivability is folded into the eof bit: `first[n]` containing
/// `TerminalID::EOI` means that `n` can derive the empty string. Callers
/// must interpret the bit in context; [`FirstSets::first`] substitutes it
/// with the outer lookahead, which is what item closure wants.
#[derive(Debug)]
pub struct FirstSets {
    sets: Vec<LookaheadSet>,
}

impl FirstSets {
    /// Run the fixpoint over all productions of `g`.
    pub fn new(g: &Grammar) -> Self {
        let mut sets = vec![LookaheadSet::new(g); g.nonterminal_count()];

        // Full passes until a pass stops adding bits anywhere. The merge
        // report is the termination condition.
        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = false;
            for (_, p) in g.productions() {
                let contribution = sequence_first(g, &sets, p.right());
                changed |= sets[p.left().index()].merge(&contribution);
            }
            if !changed {
                break;
            }
        }
        tracing::trace!("first sets stabilized after {} passes", passes);

        Self { sets }
    }

    /// FIRST of a single nonterminal; the eof bit means ε.
    pub fn of(&self, n: NonterminalID) -> &LookaheadSet {
        &self.sets[n.index()]
    }

    /// Terminals that can begin a derivation of `symbols`; the eof bit is
    /// set iff every symbol of the sequence can derive ε.
    pub fn base_first(&self, g: &Grammar, symbols: &[SymbolID]) -> LookaheadSet {
        sequence_first(g, &self.sets, symbols)
    }

    /// Proper `FIRST(symbols · lookahead)`: ε is replaced by the outer
    /// lookahead, so the eof bit survives only if `lookahead` contains it.
    pub fn first(
        &self,
        g: &Grammar,
        symbols: &[SymbolID],
        lookahead: &LookaheadSet,
    ) -> LookaheadSet {
        let mut result = self.base_first(g, symbols);
        if result.remove(TerminalID::EOI) {
            result.merge(lookahead);
        }
        result
    }
}

fn sequence_first(g: &Grammar, sets: &[LookaheadSet], symbols: &[SymbolID]) -> LookaheadSet {
    let mut result = LookaheadSet::new(g);
    for symbol in symbols {
        match symbol {
            SymbolID::T(t) => {
                result.insert(*t);
                return result;
            }
            SymbolID::N(n) => {
                let first = &sets[n.index()];
                let nullable = first.contains(TerminalID::EOI);
                result.merge(first);
                result.remove(TerminalID::EOI);
                if !nullable {
                    return result;
                }
            }
        }
    }
    // every symbol of the sequence may vanish
    result.insert(TerminalID::EOI);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    // A : B C a
    // B : b | ε
    // C : c | ε
    fn nullable_grammar() -> (Grammar, [TerminalID; 3], [NonterminalID; 3]) {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let a = g.terminal("a", None)?;
            let b = g.terminal("b", None)?;
            let c = g.terminal("c", None)?;

            let na = g.nonterminal("A")?;
            let nb = g.nonterminal("B")?;
            let nc = g.nonterminal("C")?;

            g.rule("a_seq", na, [N(nb), N(nc), T(a)], None)?;
            g.rule("b_b", nb, [T(b)], None)?;
            g.rule("b_eps", nb, std::iter::empty(), None)?;
            g.rule("c_c", nc, [T(c)], None)?;
            g.rule("c_eps", nc, std::iter::empty(), None)?;

            ids = Some(([a, b, c], [na, nb, nc]));
            Ok(())
        })
        .unwrap();
        let (terminals, nonterminals) = ids.unwrap();
        (grammar, terminals, nonterminals)
    }

    #[test]
    fn nullable_prefixes_contribute() {
        let (g, [a, b, c], [na, nb, nc]) = nullable_grammar();
        let first_sets = FirstSets::new(&g);

        // B and C are nullable, A is not
        assert!(first_sets.of(nb).contains(TerminalID::EOI));
        assert!(first_sets.of(nc).contains(TerminalID::EOI));
        assert!(!first_sets.of(na).contains(TerminalID::EOI));

        // First(A) sees through both nullable prefixes
        for t in [a, b, c] {
            assert!(first_sets.of(na).contains(t));
        }
    }

    #[test]
    fn base_first_tracks_epsilon_of_the_whole_sequence() {
        let (g, [_, b, c], [_, nb, nc]) = nullable_grammar();
        let first_sets = FirstSets::new(&g);

        let base = first_sets.base_first(&g, &[N(nb), N(nc)]);
        assert!(base.contains(b));
        assert!(base.contains(c));
        assert!(base.contains(TerminalID::EOI));

        let base = first_sets.base_first(&g, &[N(nb), T(c)]);
        assert!(!base.contains(TerminalID::EOI));
    }

    #[test]
    fn first_substitutes_the_outer_lookahead() {
        let (g, [a, b, _], [_, nb, _]) = nullable_grammar();
        let first_sets = FirstSets::new(&g);

        let mut outer = LookaheadSet::new(&g);
        outer.insert(a);

        let first = first_sets.first(&g, &[N(nb)], &outer);
        assert!(first.contains(b));
        assert!(first.contains(a));
        assert!(!first.contains(TerminalID::EOI));
    }

    #[test]
    fn every_terminal_of_first_is_derivable() {
        // completeness spot check: every contribution of a production body
        // is contained in the FIRST set of its left-hand side
        let (g, _, _) = nullable_grammar();
        let first_sets = FirstSets::new(&g);

        for (_, p) in g.productions() {
            let mut base = first_sets.base_first(&g, p.right());
            base.remove(TerminalID::EOI);
            for t in base.iter() {
                assert!(
                    first_sets.of(p.left()).contains(t),
                    "First({:?}) is missing {:?}",
                    p.left(),
                    t
                );
            }
        }
    }
}
