//! The shift-reduce driver.

use crate::grammar::{ProductionID, TerminalID};
use crate::parse_table::{Action, ParseTable, StateID};

/// The table-driven LR parser.
///
/// [`Parser::feed`] performs exactly one table action per call. A reduce
/// leaves the lookahead unconsumed, so the caller re-feeds the same terminal
/// until a shift (or accept) is reported; [`Parser::parse`] wraps that loop
/// for whole token streams. Several parsers may share one table.
#[derive(Debug)]
pub struct Parser<'t> {
    table: &'t ParseTable,
    stack: Vec<StateID>,
}

/// The outcome of feeding one lookahead terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// The lookahead was consumed and the target state pushed.
    Shift(StateID),

    /// A production matched; the lookahead is still pending.
    Reduce(ProductionID),

    /// The augmented start production matched under eof.
    Accept(ProductionID),
}

/// No action exists for the current state and lookahead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error in state {state:?} on lookahead {lookahead:?}")]
pub struct ParseError {
    pub state: StateID,
    pub lookahead: TerminalID,
}

impl<'t> Parser<'t> {
    /// Create a parser over the specified parse table.
    pub fn new(table: &'t ParseTable) -> Self {
        Self {
            table,
            stack: vec![StateID::INITIAL],
        }
    }

    /// Perform the table action for `lookahead` in the current state.
    pub fn feed(&mut self, lookahead: TerminalID) -> Result<ParseEvent, ParseError> {
        let current = *self.stack.last().unwrap();
        match self.table.action(current, lookahead) {
            Action::Shift(next) => {
                self.stack.push(next);
                Ok(ParseEvent::Shift(next))
            }
            Action::Reduce(production) => {
                let reduction = self.table.reduction(production);
                self.stack.truncate(self.stack.len() - reduction.arity);
                let top = *self.stack.last().unwrap();
                let next = self
                    .table
                    .goto(top, reduction.left)
                    .expect("missing goto for reduced nonterminal");
                self.stack.push(next);
                Ok(ParseEvent::Reduce(production))
            }
            Action::Accept(production) => Ok(ParseEvent::Accept(production)),
            Action::Err => Err(ParseError {
                state: current,
                lookahead,
            }),
        }
    }

    /// Drive a whole token stream to acceptance, appending eof after the
    /// last token. Each terminal is re-fed across the reduces it triggers.
    pub fn parse<I>(&mut self, tokens: I) -> Result<ProductionID, ParseError>
    where
        I: IntoIterator<Item = TerminalID>,
    {
        for token in tokens {
            loop {
                match self.feed(token)? {
                    ParseEvent::Shift(..) => break,
                    ParseEvent::Reduce(..) => continue,
                    ParseEvent::Accept(production) => return Ok(production),
                }
            }
        }
        loop {
            match self.feed(TerminalID::EOI)? {
                ParseEvent::Shift(..) => unreachable!("eof is never shifted"),
                ParseEvent::Reduce(..) => continue,
                ParseEvent::Accept(production) => return Ok(production),
            }
        }
    }

    /// The state stack, bottom first. Left intact by a failed feed, so the
    /// rejection context stays inspectable.
    pub fn stack(&self) -> &[StateID] {
        &self.stack
    }
}
