//! Grammar types: plain BNF productions over interned symbols.

use crate::symbols::{SymbolId, SymbolTable};
use crate::types::{Map, Set};
use crate::util::display_fn;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleId {
    raw: u32,
}

impl RuleId {
    pub(crate) const fn new(raw: usize) -> Self {
        Self { raw: raw as u32 }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// A single production `left → right`. The empty body is an ε-rule.
#[derive(Debug)]
pub struct Rule {
    left: SymbolId,
    right: Vec<SymbolId>,
}

impl Rule {
    pub fn left(&self) -> SymbolId {
        self.left
    }

    pub fn right(&self) -> &[SymbolId] {
        &self.right[..]
    }

    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            write!(f, "{} =", symbols.name(self.left))?;
            for &symbol in &self.right {
                write!(f, " {}", symbols.name(symbol))?;
            }
            write!(f, ";")
        })
    }
}

/// The lowered grammar: the rule list, the symbol classification and the
/// augmented start symbol. Read-only once built.
#[derive(Debug)]
pub struct Grammar {
    rules: Vec<Rule>,
    rules_of: Map<SymbolId, Set<RuleId>>,
    terminals: Set<SymbolId>,
    nonterminals: Set<SymbolId>,
    start: SymbolId,
}

impl Grammar {
    pub(crate) fn new(
        rules: Vec<(SymbolId, Vec<SymbolId>)>,
        terminals: Set<SymbolId>,
        nonterminals: Set<SymbolId>,
        start: SymbolId,
    ) -> Self {
        let mut rules_of: Map<SymbolId, Set<RuleId>> = Map::default();
        for &nt in &nonterminals {
            rules_of.entry(nt).or_default();
        }
        let rules: Vec<Rule> = rules
            .into_iter()
            .map(|(left, right)| Rule { left, right })
            .collect();
        for (index, rule) in rules.iter().enumerate() {
            rules_of
                .entry(rule.left)
                .or_default()
                .insert(RuleId::new(index));
        }
        Self {
            rules,
            rules_of,
            terminals,
            nonterminals,
            start,
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> + '_ {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| (RuleId::new(index), rule))
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    /// All rules whose left-hand side is `nt` (empty for terminals).
    pub fn rules_of(&self, nt: SymbolId) -> impl Iterator<Item = RuleId> + '_ {
        self.rules_of
            .get(&nt)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn is_terminal(&self, symbol: SymbolId) -> bool {
        self.terminals.contains(&symbol)
    }

    pub fn is_nonterminal(&self, symbol: SymbolId) -> bool {
        self.nonterminals.contains(&symbol)
    }

    /// Terminal symbols in insertion order. `$` is not a member; it exists
    /// only in FOLLOW sets and table rows.
    pub fn terminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.terminals.iter().copied()
    }

    /// Nonterminal symbols in insertion order, the augmented start first.
    pub fn nonterminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.nonterminals.iter().copied()
    }

    /// The augmented start symbol `^`.
    pub fn start(&self) -> SymbolId {
        self.start
    }

    /// Render the rule list the way the verbose dump shows it.
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            writeln!(f, "rule-list:")?;
            for (id, rule) in self.rules() {
                writeln!(f, "  # rule {}", id)?;
                writeln!(f, "  {}", rule.display(symbols))?;
            }
            Ok(())
        })
    }
}
