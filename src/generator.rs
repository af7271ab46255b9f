//! LALR(1) family construction and parse table emission.

use crate::convergent::ConvergentProcess;
use crate::first_sets::FirstSets;
use crate::grammar::{
    Assoc, Grammar, Precedence, ProductionID, SymbolID, TerminalID,
};
use crate::item::{ItemCore, ItemSet};
use crate::lookahead::LookaheadSet;
use crate::parse_table::{Action, Conflict, ParseTable, StateID};
use crate::types::Map;
use std::fmt;

/// The LALR(1) table generator.
///
/// All intermediate allocations (lookahead sets, item sets, worklists) stay
/// owned by the generator's call frames and are dropped when generation
/// returns; only the emitted [`ParseTable`] escapes.
#[derive(Debug)]
pub struct Generator<'g> {
    grammar: &'g Grammar,
    first_sets: FirstSets,
}

impl<'g> Generator<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            first_sets: FirstSets::new(grammar),
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn first_sets(&self) -> &FirstSets {
        &self.first_sets
    }

    /// CLOSURE(I): saturate `set` with an item `B : · γ` for every
    /// production of a nonterminal B found after a dot, carrying
    /// `FIRST(β · λ)` as its lookahead.
    ///
    /// Runs a [`ConvergentProcess`] keyed by item cores: widening the
    /// lookahead of an interned item puts it back on the worklist, so new
    /// bits keep flowing until the finite lookahead lattice stops growing.
    pub fn closure(&self, set: &mut ItemSet) {
        let g = self.grammar;

        let mut process: ConvergentProcess<ItemCore, LookaheadSet> = ConvergentProcess::new();
        for (core, lookahead) in set.iter() {
            process.enqueue(*core, lookahead.clone());
        }

        while let Some(index) = process.next() {
            let (core, lookahead) = {
                let (core, lookahead) = process.get(index).expect("interned index");
                (*core, lookahead.clone())
            };
            let Some(b) = core.nonterminal_at_dot(g) else {
                continue;
            };

            let chi = self.first_sets.first(g, core.tail(g), &lookahead);
            for (production, _) in g.productions_of(b) {
                let derived = ItemCore::start(production);
                match process.index_of(&derived) {
                    Some(existing) => {
                        let widened = process
                            .value_mut(existing)
                            .expect("interned index")
                            .merge(&chi);
                        if widened {
                            process.requeue(existing);
                        }
                    }
                    None => {
                        process.enqueue(derived, chi.clone());
                    }
                }
            }
        }

        let mut closed = ItemSet::new();
        for (core, lookahead) in process.iter() {
            closed.insert(*core, lookahead.clone());
        }
        *set = closed;
    }

    /// GOTO(I, X): advance the dot over `symbol` in every matching item,
    /// cloning its lookahead, then close the result.
    pub fn goto(&self, set: &ItemSet, symbol: SymbolID) -> ItemSet {
        let g = self.grammar;
        let mut next = ItemSet::new();
        for (core, lookahead) in set.iter() {
            if core.symbol_at_dot(g) == Some(symbol) {
                let shifted = core.shifted(g).expect("dot not at end");
                next.insert(shifted, lookahead.clone());
            }
        }
        self.closure(&mut next);
        next
    }

    /// Build the LALR(1) family of item sets.
    ///
    /// A second [`ConvergentProcess`] interns states by their core vector
    /// (LR(0) identity). A successor whose cores are known already is merged
    /// into the existing state; if the merge widened any lookahead, that
    /// state is replayed so the widened lookaheads reach its own successors
    /// through renewed GOTO and CLOSURE.
    #[tracing::instrument(skip_all)]
    pub fn family(&self) -> Family {
        let g = self.grammar;

        let mut process: ConvergentProcess<Vec<ItemCore>, ItemSet> = ConvergentProcess::new();
        let mut edges: Vec<Map<SymbolID, StateID>> = Vec::new();

        let mut initial = ItemSet::new();
        let mut eoi = LookaheadSet::new(g);
        eoi.insert(TerminalID::EOI);
        initial.insert(ItemCore::start(ProductionID::ACCEPT), eoi);
        self.closure(&mut initial);
        process.enqueue(initial.core_vec(), initial);
        edges.push(Map::default());

        while let Some(index) = process.next() {
            let (_, item_set) = process.get(index).expect("interned index");
            let item_set = item_set.clone();

            // Kernels of all successors in one scan, keyed by the symbol
            // after the dot. Insertion order follows the canonical item
            // order, which keeps state numbering deterministic.
            let mut transitions: Map<SymbolID, ItemSet> = Map::default();
            for (core, lookahead) in item_set.iter() {
                let Some(symbol) = core.symbol_at_dot(g) else {
                    continue;
                };
                let shifted = core.shifted(g).expect("dot not at end");
                transitions
                    .entry(symbol)
                    .or_default()
                    .insert(shifted, lookahead.clone());
            }

            let mut state_edges = Map::default();
            for (symbol, mut successor) in transitions {
                self.closure(&mut successor);
                let cores = successor.core_vec();
                let target = match process.index_of(&cores) {
                    Some(existing) => {
                        let widened = process
                            .value_mut(existing)
                            .expect("interned index")
                            .merge_lookaheads(&successor);
                        if widened {
                            tracing::trace!(
                                "state {} widened while expanding state {}, replaying",
                                existing,
                                index,
                            );
                            process.requeue(existing);
                        }
                        existing
                    }
                    None => {
                        let (interned, _) = process.enqueue(cores, successor);
                        edges.push(Map::default());
                        interned
                    }
                };
                let target = StateID::from_raw(u16::try_from(target).expect("too many states"));
                state_edges.insert(symbol, target);
            }
            edges[index] = state_edges;
        }

        tracing::trace!("family stabilized with {} states", process.len());
        Family {
            states: process.into_values().collect(),
            edges,
        }
    }

    /// Build the family and emit the action/goto tables.
    #[tracing::instrument(skip_all)]
    pub fn generate(&self) -> Result<ParseTable, Conflict> {
        let family = self.family();
        self.emit(&family)
    }

    /// Resolve every state of `family` into table rows.
    ///
    /// Shift edges and completed items are gathered per lookahead terminal
    /// first, then settled at once: a lone shift or reduce is written
    /// directly, a shift/reduce pair goes through precedence resolution, and
    /// everything else is a hard [`Conflict`]. Items are visited in
    /// canonical order, so the reported pair of a conflict is deterministic.
    pub fn emit(&self, family: &Family) -> Result<ParseTable, Conflict> {
        let g = self.grammar;
        let mut table = ParseTable::new(g, family.len());

        for (id, item_set) in family.states() {
            #[derive(Default)]
            struct PendingAction {
                shift: Option<StateID>,
                reduces: Vec<ProductionID>,
                accepted: bool,
            }
            let mut pending: Map<TerminalID, PendingAction> = Map::default();

            for (symbol, target) in family.edges(id) {
                match symbol {
                    SymbolID::T(t) => {
                        pending.entry(t).or_default().shift = Some(target);
                    }
                    SymbolID::N(n) => table.put_goto(id, n, target)?,
                }
            }

            for (core, lookahead) in item_set.iter() {
                if !core.is_complete(g) {
                    continue;
                }
                if core.production == ProductionID::ACCEPT {
                    pending.entry(TerminalID::EOI).or_default().accepted = true;
                } else {
                    for t in lookahead.iter() {
                        pending.entry(t).or_default().reduces.push(core.production);
                    }
                }
            }

            for (terminal, action) in pending {
                if let Some(resolved) =
                    self.resolve_actions(id, terminal, action.shift, &action.reduces, action.accepted)?
                {
                    table.put_action(id, terminal, resolved)?;
                }
            }
        }

        Ok(table)
    }

    /// Settle the set of actions competing for one `(state, terminal)` cell.
    ///
    /// `Ok(None)` means the cell stays `Err`: a nonassociative shift/reduce
    /// pair rejects the lookahead outright.
    fn resolve_actions(
        &self,
        state: StateID,
        terminal: TerminalID,
        shift: Option<StateID>,
        reduces: &[ProductionID],
        accepted: bool,
    ) -> Result<Option<Action>, Conflict> {
        let g = self.grammar;
        let conflict = |existing: Action, incoming: Action| Conflict {
            state,
            lookahead: terminal,
            existing,
            incoming,
        };

        if accepted {
            let accept = Action::Accept(ProductionID::ACCEPT);
            if let Some(next) = shift {
                return Err(conflict(accept, Action::Shift(next)));
            }
            if let Some(reduce) = reduces.first() {
                return Err(conflict(accept, Action::Reduce(*reduce)));
            }
            return Ok(Some(accept));
        }

        match (shift, reduces) {
            (Some(next), []) => Ok(Some(Action::Shift(next))),
            (None, [reduce]) => Ok(Some(Action::Reduce(*reduce))),
            (None, [first, second, ..]) => {
                Err(conflict(Action::Reduce(*first), Action::Reduce(*second)))
            }
            (None, []) => unreachable!("empty pending action"),

            (Some(next), reduces) => {
                // Precedence may settle a shift/reduce pair; all pairs of
                // this cell must agree on the outcome.
                let shift_prec = g.terminal(terminal).precedence();
                let mut resolution = None;
                for &reduce in reduces {
                    let reduce_prec = g.production(reduce).precedence(g);
                    let preferred = compare_precedences(shift_prec, reduce_prec).ok_or_else(
                        || conflict(Action::Shift(next), Action::Reduce(reduce)),
                    )?;
                    match (resolution, preferred) {
                        (None, preferred) => resolution = Some(preferred),
                        (Some(previous), preferred) if previous == preferred => {}
                        (Some(_), _) => {
                            return Err(conflict(Action::Shift(next), Action::Reduce(reduce)));
                        }
                    }
                }

                match resolution.expect("at least one reduce") {
                    Preference::Shift => Ok(Some(Action::Shift(next))),
                    Preference::Reduce => match reduces {
                        [reduce] => Ok(Some(Action::Reduce(*reduce))),
                        [first, second, ..] => {
                            Err(conflict(Action::Reduce(*first), Action::Reduce(*second)))
                        }
                        [] => unreachable!(),
                    },
                    Preference::Neither => Ok(None),
                }
            }
        }
    }
}

/// The ordered family of LALR(1) item sets, along with the successor edges
/// recorded during construction. States are numbered in interning order;
/// state 0 holds the closed initial set.
#[derive(Debug)]
pub struct Family {
    states: Vec<ItemSet>,
    edges: Vec<Map<SymbolID, StateID>>,
}

impl Family {
    pub fn states(&self) -> impl Iterator<Item = (StateID, &ItemSet)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(i, set)| (StateID::from_raw(i as u16), set))
    }

    pub fn state(&self, id: StateID) -> &ItemSet {
        &self.states[id.index()]
    }

    pub fn edges(&self, id: StateID) -> impl Iterator<Item = (SymbolID, StateID)> + '_ {
        self.edges[id.index()]
            .iter()
            .map(|(symbol, target)| (*symbol, *target))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        crate::util::display_fn(|f| {
            for (id, item_set) in self.states() {
                writeln!(f, "#### State {:?}", id)?;
                write!(f, "{}", item_set.display(g))?;
                for (symbol, target) in self.edges(id) {
                    let name = match symbol {
                        SymbolID::T(t) => g.terminal(t).name(),
                        SymbolID::N(n) => g.nonterminal(n).name(),
                    };
                    writeln!(f, "- {} => {:?}", name, target)?;
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Preference {
    Shift,
    Reduce,
    Neither,
}

fn compare_precedences(
    shift_prec: Option<Precedence>,
    reduce_prec: Option<Precedence>,
) -> Option<Preference> {
    use std::cmp::Ordering;

    match (shift_prec, reduce_prec) {
        (Some(p1), Some(p2)) => match Ord::cmp(&p1.priority, &p2.priority) {
            Ordering::Greater => Some(Preference::Shift),
            Ordering::Less => Some(Preference::Reduce),
            Ordering::Equal => match p1.assoc {
                Assoc::Left => Some(Preference::Reduce),
                Assoc::Right => Some(Preference::Shift),
                Assoc::Nonassoc => Some(Preference::Neither),
            },
        },
        _ => None,
    }
}
