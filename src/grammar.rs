//! Grammar types.

use crate::util::display_fn;
use std::{borrow::Cow, fmt, ops::Range};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}

impl TerminalID {
    /// Reserved terminal symbol that marks the end of input.
    ///
    /// Its raw value is also the lookahead bit position reserved for eof, so
    /// the raw terminal space doubles as the lookahead index space.
    pub const EOI: Self = Self::from_raw(0);

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

impl fmt::Debug for TerminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EOI => f.write_str("$end"),
            Self { raw } => write!(f, "T#{:02}", raw),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}

impl NonterminalID {
    /// Reserved nonterminal for the augmented start symbol `$start`.
    pub const START: Self = Self::from_raw(0);

    const OFFSET: u16 = 1;

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

impl fmt::Debug for NonterminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::START => f.write_str("$start"),
            Self { raw } => write!(f, "N#{:02}", raw),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID {
    raw: u16,
}

impl ProductionID {
    /// Reserved ID of the augmented production `$start : <start-symbol>`.
    ///
    /// Reducing it under the eof lookahead is what acceptance means; eof
    /// itself never appears on a right-hand side.
    pub const ACCEPT: Self = Self::from_raw(0);

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

impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::ACCEPT => f.write_str("$accept"),
            Self { raw } => write!(f, "P#{:02}", raw),
        }
    }
}

/// A terminal or nonterminal occurrence on a right-hand side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

/// Operator associativity used when a shift/reduce pair is resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Precedence {
    pub priority: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: u16, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }
}

#[derive(Debug)]
pub struct Terminal {
    name: Cow<'static, str>,
    precedence: Option<Precedence>,
}

impl Terminal {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    name: Cow<'static, str>,
    // Contiguous block of this nonterminal's productions, filled in `end`.
    productions: Range<usize>,
}

impl Nonterminal {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A production rule `A : α`.
#[derive(Debug)]
pub struct Production {
    left: NonterminalID,
    right: Vec<SymbolID>,
    tag: Cow<'static, str>,
    precedence: Option<Precedence>,
}

impl Production {
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    pub fn right(&self) -> &[SymbolID] {
        &self.right
    }

    /// The human-readable tag, unique among the productions of one
    /// left-hand side.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The production's own precedence, falling back to the precedence of
    /// the last terminal on its right-hand side.
    pub fn precedence(&self, g: &Grammar) -> Option<Precedence> {
        match self.precedence {
            Some(prec) => Some(prec),
            None => {
                for symbol in self.right.iter().rev() {
                    if let SymbolID::T(t) = symbol {
                        return g.terminal(*t).precedence();
                    }
                }
                None
            }
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} :", g.nonterminal(self.left).name())?;
            for symbol in &self.right {
                match symbol {
                    SymbolID::T(t) => write!(f, " {}", g.terminal(*t).name())?,
                    SymbolID::N(n) => write!(f, " {}", g.nonterminal(*n).name())?,
                }
            }
            Ok(())
        })
    }
}

/// The grammar definition used to derive the parse table.
///
/// Immutable once built; index spaces are dense and productions are stored
/// grouped by their left-hand side, so all productions of one nonterminal
/// form a contiguous range.
#[derive(Debug)]
pub struct Grammar {
    terminals: Vec<Terminal>,
    nonterminals: Vec<Nonterminal>,
    productions: Vec<Production>,
    start_symbol: NonterminalID,
}

impl Grammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    pub fn terminals(&self) -> impl Iterator<Item = (TerminalID, &Terminal)> + '_ {
        self.terminals
            .iter()
            .enumerate()
            .map(|(i, t)| (TerminalID::from_raw(i as u16), t))
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = (NonterminalID, &Nonterminal)> + '_ {
        self.nonterminals
            .iter()
            .enumerate()
            .map(|(i, n)| (NonterminalID::from_raw(i as u16), n))
    }

    pub fn productions(&self) -> impl Iterator<Item = (ProductionID, &Production)> + '_ {
        self.productions
            .iter()
            .enumerate()
            .map(|(i, p)| (ProductionID::from_raw(i as u16), p))
    }

    /// The productions of `n`, a contiguous slice of the production table.
    pub fn productions_of(
        &self,
        n: NonterminalID,
    ) -> impl Iterator<Item = (ProductionID, &Production)> + '_ {
        let range = self.nonterminals[n.index()].productions.clone();
        range.map(move |i| (ProductionID::from_raw(i as u16), &self.productions[i]))
    }

    pub fn terminal(&self, id: TerminalID) -> &Terminal {
        &self.terminals[id.index()]
    }

    pub fn nonterminal(&self, id: NonterminalID) -> &Nonterminal {
        &self.nonterminals[id.index()]
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[id.index()]
    }

    /// Look a production up by its left-hand side and tag.
    pub fn production_by_tag(&self, left: NonterminalID, tag: &str) -> Option<ProductionID> {
        self.productions_of(left)
            .find_map(|(id, p)| (p.tag() == tag).then_some(id))
    }

    pub fn start_symbol(&self) -> NonterminalID {
        self.start_symbol
    }

    /// Number of terminal symbols, eof included. This is also the width of
    /// every lookahead set derived from this grammar.
    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn nonterminal_count(&self) -> usize {
        self.nonterminals.len()
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminals:")?;
        for (id, terminal) in self.terminals() {
            if id != TerminalID::EOI {
                write!(f, " {}", terminal.name())?;
            }
        }
        write!(f, "\nnonterminals:")?;
        for (id, nonterminal) in self.nonterminals() {
            if id != NonterminalID::START {
                write!(f, " {}", nonterminal.name())?;
            }
        }
        writeln!(
            f,
            "\nstart_symbol: {}",
            self.nonterminal(self.start_symbol).name()
        )?;
        writeln!(f, "productions:")?;
        for (id, production) in self.productions() {
            writeln!(f, "  [{:02}] {}", id.into_raw(), production.display(self))?;
        }
        Ok(())
    }
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Vec<Terminal>,
    nonterminals: Vec<Nonterminal>,
    rules: Vec<Production>,
    start: Option<NonterminalID>,
}

impl Default for GrammarDef {
    fn default() -> Self {
        Self {
            terminals: vec![Terminal {
                name: Cow::Borrowed("$end"),
                precedence: None,
            }],
            nonterminals: vec![Nonterminal {
                name: Cow::Borrowed("$start"),
                productions: 0..0,
            }],
            rules: vec![],
            start: None,
        }
    }
}

impl GrammarDef {
    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        precedence: Option<Precedence>,
    ) -> Result<TerminalID, GrammarDefError> {
        let name = name.into();
        if self.terminals.iter().any(|t| t.name == name) {
            return Err(GrammarDefError::DuplicateSymbol {
                name: name.into_owned(),
            });
        }
        let id = TerminalID::from_raw(self.terminals.len() as u16);
        self.terminals.push(Terminal { name, precedence });
        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(
        &mut self,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<NonterminalID, GrammarDefError> {
        let name = name.into();
        if self.nonterminals.iter().any(|n| n.name == name) {
            return Err(GrammarDefError::DuplicateSymbol {
                name: name.into_owned(),
            });
        }
        let id = NonterminalID::from_raw(self.nonterminals.len() as u16);
        self.nonterminals.push(Nonterminal {
            name,
            productions: 0..0,
        });
        Ok(id)
    }

    /// Add a production rule `left : right` into this grammar.
    pub fn rule<I>(
        &mut self,
        tag: impl Into<Cow<'static, str>>,
        left: NonterminalID,
        right: I,
        precedence: Option<Precedence>,
    ) -> Result<(), GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        if left == NonterminalID::START || left.index() >= self.nonterminals.len() {
            return Err(GrammarDefError::DanglingSymbol);
        }
        let right: Vec<SymbolID> = right.into_iter().collect();
        for symbol in &right {
            match symbol {
                SymbolID::T(TerminalID::EOI) => return Err(GrammarDefError::ReservedTerminal),
                SymbolID::N(NonterminalID::START) => {
                    return Err(GrammarDefError::ReservedNonterminal);
                }
                SymbolID::T(t) if t.index() >= self.terminals.len() => {
                    return Err(GrammarDefError::DanglingSymbol);
                }
                SymbolID::N(n) if n.index() >= self.nonterminals.len() => {
                    return Err(GrammarDefError::DanglingSymbol);
                }
                _ => {}
            }
        }
        let tag = tag.into();
        if self.rules.iter().any(|p| p.left == left && p.tag == tag) {
            return Err(GrammarDefError::DuplicateTag {
                name: self.nonterminals[left.index()].name.clone().into_owned(),
                tag: tag.into_owned(),
            });
        }
        self.rules.push(Production {
            left,
            right,
            tag,
            precedence,
        });
        Ok(())
    }

    /// Specify the start symbol. Defaults to the first declared nonterminal.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarDefError> {
        if symbol == NonterminalID::START || symbol.index() >= self.nonterminals.len() {
            return Err(GrammarDefError::DanglingSymbol);
        }
        self.start.replace(symbol);
        Ok(())
    }

    /// Validate the definition and freeze it into a `Grammar`.
    pub fn end(mut self) -> Result<Grammar, GrammarDefError> {
        let start = match self.start.take() {
            Some(start) => start,
            None if self.nonterminals.len() > NonterminalID::OFFSET as usize => {
                NonterminalID::from_raw(NonterminalID::OFFSET)
            }
            None => return Err(GrammarDefError::MissingStart),
        };

        // The start symbol and every nonterminal occurring on a right-hand
        // side must be productive.
        let mut used = vec![false; self.nonterminals.len()];
        used[start.index()] = true;
        for rule in &self.rules {
            for symbol in &rule.right {
                if let SymbolID::N(n) = symbol {
                    used[n.index()] = true;
                }
            }
        }
        for (i, used) in used.iter().enumerate().skip(NonterminalID::OFFSET as usize) {
            let n = NonterminalID::from_raw(i as u16);
            if *used && !self.rules.iter().any(|p| p.left == n) {
                return Err(GrammarDefError::MissingProductions {
                    name: self.nonterminals[i].name.clone().into_owned(),
                });
            }
        }

        // Group productions by their left-hand side. The sort is stable, so
        // the relative order within one group is the declaration order.
        let mut productions = vec![Production {
            left: NonterminalID::START,
            right: vec![SymbolID::N(start)],
            tag: Cow::Borrowed("$accept"),
            precedence: None,
        }];
        self.rules.sort_by_key(|p| p.left);
        productions.extend(self.rules);

        let mut nonterminals = self.nonterminals;
        let mut i = 0;
        while i < productions.len() {
            let left = productions[i].left;
            let lo = i;
            while i < productions.len() && productions[i].left == left {
                i += 1;
            }
            nonterminals[left.index()].productions = lo..i;
        }

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals,
            productions,
            start_symbol: start,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("no nonterminal symbols are defined")]
    MissingStart,

    #[error("duplicate symbol name `{name}`")]
    DuplicateSymbol { name: String },

    #[error("duplicate production tag `{tag}` for nonterminal `{name}`")]
    DuplicateTag { name: String, tag: String },

    #[error("nonterminal `{name}` is used but has no production")]
    MissingProductions { name: String },

    #[error("the end-of-input marker cannot appear in a production")]
    ReservedTerminal,

    #[error("the augmented start symbol cannot appear in a production")]
    ReservedNonterminal,

    #[error("symbol does not belong to this grammar")]
    DanglingSymbol,
}
