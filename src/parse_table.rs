//! Dense action/goto tables.

use crate::generator::Generator;
use crate::grammar::{Grammar, NonterminalID, ProductionID, TerminalID};
use crate::util::display_fn;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: u16,
}

impl StateID {
    /// The state a fresh parser starts in.
    pub const INITIAL: Self = Self::from_raw(0);

    #[inline]
    pub(crate) const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.raw)
    }
}

/// The action a state performs on a particular lookahead terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Consume the lookahead and transition to the specified state.
    Shift(StateID),

    /// Match the specified production rule, leaving the lookahead pending.
    Reduce(ProductionID),

    /// Match the augmented start production; the input is recognized.
    Accept(ProductionID),

    /// Reject the lookahead.
    Err,
}

/// Table cells assigned incompatible actions during emission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "conflict in state {state:?} on lookahead {lookahead:?}: {existing:?} vs {incoming:?}"
)]
pub struct Conflict {
    pub state: StateID,
    pub lookahead: TerminalID,
    pub existing: Action,
    pub incoming: Action,
}

/// The generated parse table: row-major dense arrays indexed by state.
///
/// Actions are indexed by raw terminal (eof included), gotos by raw
/// nonterminal. The table also carries each production's left-hand side and
/// arity, so a driver can reduce without consulting the grammar; it owns all
/// of its storage and borrows nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTable {
    states: usize,
    terminals: usize,
    nonterminals: usize,
    actions: Vec<Action>,
    gotos: Vec<Option<StateID>>,
    reductions: Vec<Reduction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reduction {
    pub(crate) left: NonterminalID,
    pub(crate) arity: usize,
}

impl ParseTable {
    /// Generate the LALR(1) parse table for `grammar`.
    pub fn generate(grammar: &Grammar) -> Result<Self, Conflict> {
        Generator::new(grammar).generate()
    }

    /// A table of `states` rows, every action `Err`, every goto vacant.
    pub(crate) fn new(grammar: &Grammar, states: usize) -> Self {
        let terminals = grammar.terminal_count();
        let nonterminals = grammar.nonterminal_count();
        Self {
            states,
            terminals,
            nonterminals,
            actions: vec![Action::Err; states * terminals],
            gotos: vec![None; states * nonterminals],
            reductions: grammar
                .productions()
                .map(|(_, p)| Reduction {
                    left: p.left(),
                    arity: p.right().len(),
                })
                .collect(),
        }
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn action(&self, state: StateID, lookahead: TerminalID) -> Action {
        self.actions[state.index() * self.terminals + lookahead.index()]
    }

    pub fn goto(&self, state: StateID, nonterminal: NonterminalID) -> Option<StateID> {
        self.gotos[state.index() * self.nonterminals + nonterminal.index()]
    }

    pub(crate) fn reduction(&self, production: ProductionID) -> &Reduction {
        &self.reductions[production.index()]
    }

    pub(crate) fn put_action(
        &mut self,
        state: StateID,
        lookahead: TerminalID,
        action: Action,
    ) -> Result<(), Conflict> {
        let cell = &mut self.actions[state.index() * self.terminals + lookahead.index()];
        match *cell {
            Action::Err => {
                *cell = action;
                Ok(())
            }
            existing if existing == action => Ok(()),
            existing => Err(Conflict {
                state,
                lookahead,
                existing,
                incoming: action,
            }),
        }
    }

    // A goto conflict cannot arise from the family construction, which keys
    // successors by symbol; the check mirrors `put_action` anyway. The two
    // transition targets are reported as shift actions.
    pub(crate) fn put_goto(
        &mut self,
        state: StateID,
        nonterminal: NonterminalID,
        target: StateID,
    ) -> Result<(), Conflict> {
        let cell = &mut self.gotos[state.index() * self.nonterminals + nonterminal.index()];
        match *cell {
            None => {
                *cell = Some(target);
                Ok(())
            }
            Some(existing) if existing == target => Ok(()),
            Some(existing) => Err(Conflict {
                state,
                lookahead: TerminalID::EOI,
                existing: Action::Shift(existing),
                incoming: Action::Shift(target),
            }),
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for state in 0..self.states {
                let state = StateID::from_raw(state as u16);
                writeln!(f, "#### State {:?}", state)?;
                writeln!(f, "## actions")?;
                for (terminal, symbol) in g.terminals() {
                    match self.action(state, terminal) {
                        Action::Shift(next) => {
                            writeln!(f, "- {} => shift({:?})", symbol.name(), next)?;
                        }
                        Action::Reduce(p) => {
                            writeln!(
                                f,
                                "- {} => reduce({})",
                                symbol.name(),
                                g.production(p).display(g)
                            )?;
                        }
                        Action::Accept(..) => {
                            writeln!(f, "- {} => accept", symbol.name())?;
                        }
                        Action::Err => {}
                    }
                }
                writeln!(f, "## gotos")?;
                for (nonterminal, symbol) in g.nonterminals() {
                    if let Some(next) = self.goto(state, nonterminal) {
                        writeln!(f, "- {} => goto({:?})", symbol.name(), next)?;
                    }
                }
            }
            Ok(())
        })
    }
}
