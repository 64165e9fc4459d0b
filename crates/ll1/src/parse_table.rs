//! Construction of the LL(1) parse table and conflict detection.

use crate::first_sets::FirstSets;
use crate::follow_sets::FollowSets;
use crate::grammar::{Grammar, RuleId};
use crate::symbols::SymbolId;
use crate::types::Map;

/// One cell of the parse table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cell {
    /// No rule applies on this lookahead.
    Empty,
    Rule(RuleId),
    /// More than one rule claimed the cell: an LL(1) violation.
    Conflict,
}

/// A cell that was claimed twice.
///
/// `previous` is the earlier occupant, absent when the cell had already
/// degenerated into a conflict. `resolved` bookings were settled by the
/// nullable tiebreak and are soft warnings, not violations.
#[derive(Debug, Clone)]
pub struct Booking {
    pub nonterminal: SymbolId,
    pub lookahead: SymbolId,
    pub rule: RuleId,
    pub previous: Option<RuleId>,
    pub resolved: bool,
}

/// The LL(1) table: `(nonterminal, lookahead) → Cell`, with lookaheads
/// drawn from the terminals plus `$`.
#[derive(Debug)]
pub struct ParseTable {
    cells: Map<SymbolId, Map<SymbolId, Cell>>,
    bookings: Vec<Booking>,
}

impl ParseTable {
    /// Fill the table from FIRST and, for nullable rules, FOLLOW.
    ///
    /// With `nullable_tiebreak` enabled, a clash in which exactly one
    /// contender is nullable keeps the rule that is not; every other clash
    /// marks the cell as a conflict.
    pub fn build(
        grammar: &Grammar,
        first: &FirstSets,
        follow: &FollowSets,
        nullable_tiebreak: bool,
    ) -> Self {
        let mut cells: Map<SymbolId, Map<SymbolId, Cell>> = Map::default();
        for nt in grammar.nonterminals() {
            let mut row: Map<SymbolId, Cell> = Map::default();
            for terminal in grammar.terminals() {
                row.insert(terminal, Cell::Empty);
            }
            row.insert(SymbolId::EOI, Cell::Empty);
            cells.insert(nt, row);
        }

        let mut table = Self {
            cells,
            bookings: Vec::new(),
        };

        for (id, rule) in grammar.rules() {
            let left = rule.left();
            if grammar.is_terminal(left) {
                continue;
            }
            for &lookahead in first.get(id) {
                if lookahead == SymbolId::EPSILON {
                    continue;
                }
                table.book(first, nullable_tiebreak, left, lookahead, id);
            }
            if first.is_nullable(id) {
                for &lookahead in follow.get(left) {
                    table.book(first, nullable_tiebreak, left, lookahead, id);
                }
            }
        }

        table
    }

    fn book(
        &mut self,
        first: &FirstSets,
        nullable_tiebreak: bool,
        nonterminal: SymbolId,
        lookahead: SymbolId,
        rule: RuleId,
    ) {
        let cell = self
            .cells
            .get_mut(&nonterminal)
            .and_then(|row| row.get_mut(&lookahead))
            .expect("lookahead outside the terminal set");
        match *cell {
            Cell::Empty => *cell = Cell::Rule(rule),
            Cell::Rule(previous) if previous == rule => {}
            Cell::Rule(previous) => {
                let resolved = if !nullable_tiebreak {
                    None
                } else if first.is_nullable(rule) {
                    Some(previous)
                } else if first.is_nullable(previous) {
                    Some(rule)
                } else {
                    None
                };
                match resolved {
                    Some(winner) => {
                        *cell = Cell::Rule(winner);
                        self.bookings.push(Booking {
                            nonterminal,
                            lookahead,
                            rule,
                            previous: Some(previous),
                            resolved: true,
                        });
                    }
                    None => {
                        *cell = Cell::Conflict;
                        self.bookings.push(Booking {
                            nonterminal,
                            lookahead,
                            rule,
                            previous: Some(previous),
                            resolved: false,
                        });
                    }
                }
            }
            Cell::Conflict => {
                self.bookings.push(Booking {
                    nonterminal,
                    lookahead,
                    rule,
                    previous: None,
                    resolved: false,
                });
            }
        }
    }

    pub fn get(&self, nonterminal: SymbolId, lookahead: SymbolId) -> Cell {
        self.cells
            .get(&nonterminal)
            .and_then(|row| row.get(&lookahead))
            .copied()
            .unwrap_or(Cell::Empty)
    }

    /// Nonterminals in insertion order, the table's column order.
    pub fn nonterminals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.cells.keys().copied()
    }

    /// Every booking, hard and soft, in booking order.
    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    /// Hard conflicts only.
    pub fn conflicts(&self) -> impl Iterator<Item = &Booking> + '_ {
        self.bookings.iter().filter(|b| !b.resolved)
    }

    pub fn has_partial_bookings(&self) -> bool {
        self.bookings.iter().any(|b| b.resolved)
    }

    /// The grammar is LL(1) iff no cell degenerated into a conflict.
    pub fn is_ll1(&self) -> bool {
        self.conflicts().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lower;
    use crate::symbols::SymbolTable;
    use crate::syntax;

    fn analyze(source: &str, tiebreak: bool) -> (Grammar, ParseTable, SymbolTable) {
        let mut symbols = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let tree = syntax::parse(source.as_bytes(), &mut symbols, &mut diags).unwrap();
        let grammar = lower::lower(&tree, &mut symbols, &mut diags).unwrap();
        let first = FirstSets::new(&grammar);
        let follow = FollowSets::new(&grammar, &first);
        let table = ParseTable::build(&grammar, &first, &follow, tiebreak);
        (grammar, table, symbols)
    }

    fn cell(table: &ParseTable, symbols: &SymbolTable, nt: &str, t: &str) -> Cell {
        table.get(symbols.get(nt).unwrap(), symbols.get(t).unwrap())
    }

    #[test]
    fn trivial_grammar_is_ll1() {
        let (grammar, table, symbols) = analyze("S = 'a' ;", false);
        assert!(table.is_ll1());
        let s = symbols.get("S").unwrap();
        let a = symbols.get("'a'").unwrap();
        let rule = grammar.rules_of(s).next().unwrap();
        assert_eq!(table.get(s, a), Cell::Rule(rule));
        let start = symbols.get("^").unwrap();
        let start_rule = grammar.rules_of(start).next().unwrap();
        assert_eq!(table.get(start, a), Cell::Rule(start_rule));
        assert_eq!(table.get(s, SymbolId::EOI), Cell::Empty);
    }

    #[test]
    fn nullable_rule_books_follow() {
        let (grammar, table, symbols) = analyze("S = 'a' ? 'b' ;", false);
        assert!(table.is_ll1());
        let helper = symbols.get("S[1]").unwrap();
        let a = symbols.get("'a'").unwrap();
        let b = symbols.get("'b'").unwrap();
        let mut rules = grammar.rules_of(helper);
        let takes_a = rules.next().unwrap();
        let epsilon = rules.next().unwrap();
        assert_eq!(table.get(helper, a), Cell::Rule(takes_a));
        assert_eq!(table.get(helper, b), Cell::Rule(epsilon));
    }

    #[test]
    fn common_prefix_conflicts() {
        let (_, table, symbols) = analyze("S = 'a' 'b' | 'a' 'c' ;", false);
        assert!(!table.is_ll1());
        assert_eq!(cell(&table, &symbols, "S", "'a'"), Cell::Conflict);
        assert_eq!(table.conflicts().count(), 1);
    }

    #[test]
    fn left_recursion_conflicts() {
        let (_, table, symbols) = analyze("S = S 'a' | 'b' ;", false);
        assert!(!table.is_ll1());
        assert_eq!(cell(&table, &symbols, "S", "'b'"), Cell::Conflict);
    }

    #[test]
    fn tiebreak_cannot_settle_two_non_nullable_rules() {
        // both alternatives start with 'a' and neither is nullable, so the
        // tiebreak does not apply
        let source = "S = A 'b' ; A = 'a' | 'a' 'a' | ;";
        let (_, table, _) = analyze(source, false);
        assert!(!table.is_ll1());
        let (_, table, symbols) = analyze(source, true);
        assert!(!table.is_ll1());
        let a_nt = symbols.get("A").unwrap();
        assert!(table.conflicts().all(|b| b.nonterminal == a_nt));
    }

    #[test]
    fn tiebreak_resolves_nullable_clash() {
        // A → 'a' | ε conflicts on FOLLOW(A) = {'a'} without the tiebreak
        let source = "S = A 'a' ; A = 'a' | ;";
        let (_, table, _) = analyze(source, false);
        assert!(!table.is_ll1());
        let (_, table, _) = analyze(source, true);
        assert!(table.is_ll1());
        assert!(table.has_partial_bookings());
    }

    #[test]
    fn soundness() {
        let sources = [
            "S = 'a' ? 'b' ;",
            "S = ( 'a' | 'b' ) * 'c' ;",
            "S = /[a-c]/ ;",
        ];
        for source in sources {
            let mut symbols = SymbolTable::new();
            let mut diags = Diagnostics::new();
            let tree = syntax::parse(source.as_bytes(), &mut symbols, &mut diags).unwrap();
            let grammar = lower::lower(&tree, &mut symbols, &mut diags).unwrap();
            let first = FirstSets::new(&grammar);
            let follow = FollowSets::new(&grammar, &first);
            let table = ParseTable::build(&grammar, &first, &follow, false);
            for nt in table.nonterminals() {
                for t in grammar.terminals().chain([SymbolId::EOI]) {
                    if let Cell::Rule(rule) = table.get(nt, t) {
                        let by_first = first.contains(rule, t);
                        let by_follow =
                            first.is_nullable(rule) && follow.get(nt).contains(&t);
                        assert!(
                            by_first || by_follow,
                            "{}: unsound cell [{}, {}]",
                            source,
                            symbols.name(nt),
                            symbols.name(t),
                        );
                    }
                }
            }
        }
    }
}
