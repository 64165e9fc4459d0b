//! Calculation of the FIRST set function.

use crate::grammar::{Grammar, RuleId};
use crate::symbols::{SymbolId, SymbolTable};
use crate::types::{Map, Set};
use crate::util::display_fn;
use std::fmt;

/// Per-rule FIRST sets over `T ∪ {ε}`.
///
/// The worklist marks a rule `complete` once a pass adds nothing new and
/// none of its dependencies were still provisional; a rule left incomplete
/// at the fixpoint indicates a structurally broken grammar.
#[derive(Debug)]
pub struct FirstSets {
    sets: Map<RuleId, Set<SymbolId>>,
    complete: Map<RuleId, bool>,
}

impl FirstSets {
    pub fn new(grammar: &Grammar) -> Self {
        let mut sets: Map<RuleId, Set<SymbolId>> = Map::default();
        let mut complete: Map<RuleId, bool> = Map::default();
        for (id, _) in grammar.rules() {
            sets.insert(id, Set::default());
            complete.insert(id, false);
        }

        let mut updated = true;
        while updated {
            updated = false;
            for (id, rule) in grammar.rules() {
                if complete[&id] {
                    continue;
                }
                let mut provisional = false;
                let mut nullable_prefix = true;
                for &symbol in rule.right() {
                    nullable_prefix = false;
                    if grammar.is_terminal(symbol) {
                        if sets[&id].insert(symbol) {
                            updated = true;
                        }
                        break;
                    }
                    for dep in grammar.rules_of(symbol) {
                        if dep == id {
                            // a rule never waits on itself; direct left
                            // recursion surfaces as a table conflict instead
                            continue;
                        }
                        if !complete[&dep] {
                            provisional = true;
                            continue;
                        }
                        let mut added = Vec::new();
                        for &first in &sets[&dep] {
                            if first == SymbolId::EPSILON {
                                nullable_prefix = true;
                            } else if !sets[&id].contains(&first) {
                                added.push(first);
                            }
                        }
                        if !added.is_empty() {
                            updated = true;
                            sets[&id].extend(added);
                        }
                    }
                    if !nullable_prefix {
                        break;
                    }
                }
                if nullable_prefix && sets[&id].insert(SymbolId::EPSILON) {
                    updated = true;
                }
                if !provisional {
                    complete.insert(id, true);
                }
            }
        }

        Self { sets, complete }
    }

    pub fn get(&self, rule: RuleId) -> &Set<SymbolId> {
        &self.sets[&rule]
    }

    pub fn contains(&self, rule: RuleId, symbol: SymbolId) -> bool {
        self.sets[&rule].contains(&symbol)
    }

    pub fn is_nullable(&self, rule: RuleId) -> bool {
        self.contains(rule, SymbolId::EPSILON)
    }

    pub fn is_complete(&self, rule: RuleId) -> bool {
        self.complete[&rule]
    }

    /// Rules whose sets never stabilized, in rule order.
    pub fn incomplete(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.complete
            .iter()
            .filter(|(_, &done)| !done)
            .map(|(&id, _)| id)
    }

    /// Render the per-rule sets the way the verbose dump shows them.
    pub fn display<'a>(
        &'a self,
        grammar: &'a Grammar,
        symbols: &'a SymbolTable,
    ) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            writeln!(f, "first:")?;
            for (id, rule) in grammar.rules() {
                write!(f, "  rule {}: {} ->", id, symbols.name(rule.left()))?;
                for &symbol in self.get(id) {
                    write!(f, " {}", symbols.name(symbol))?;
                }
                let status = if self.is_complete(id) { "ok" } else { "bad" };
                writeln!(f, " : {}", status)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lower;
    use crate::syntax;

    fn analyze(source: &str) -> (Grammar, FirstSets, SymbolTable) {
        let mut symbols = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let tree = syntax::parse(source.as_bytes(), &mut symbols, &mut diags).unwrap();
        let grammar = lower::lower(&tree, &mut symbols, &mut diags).unwrap();
        let first = FirstSets::new(&grammar);
        (grammar, first, symbols)
    }

    fn first_of(
        grammar: &Grammar,
        first: &FirstSets,
        symbols: &SymbolTable,
        head: &str,
        nth: usize,
    ) -> Vec<String> {
        let head = symbols.get(head).unwrap();
        let rule = grammar.rules_of(head).nth(nth).unwrap();
        let mut names: Vec<String> = first
            .get(rule)
            .iter()
            .map(|&s| symbols.name(s).to_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn terminal_rule() {
        let (grammar, first, symbols) = analyze("S = 'a' ;");
        assert_eq!(first_of(&grammar, &first, &symbols, "S", 0), ["'a'"]);
        assert_eq!(first_of(&grammar, &first, &symbols, "^", 0), ["'a'"]);
        for (id, _) in grammar.rules() {
            assert!(first.is_complete(id));
        }
    }

    #[test]
    fn nullable_rules_carry_epsilon() {
        let (grammar, first, symbols) = analyze("S = 'a' ? 'b' ;");
        // the helper's ε-rule and the helper chain
        assert_eq!(
            first_of(&grammar, &first, &symbols, "S[1]", 0),
            ["'a'"]
        );
        assert_eq!(
            first_of(&grammar, &first, &symbols, "S[1]", 1),
            ["<epsilon>"]
        );
        // S itself starts with 'a' or, through the nullable helper, 'b'
        assert_eq!(
            first_of(&grammar, &first, &symbols, "S", 0),
            ["'a'", "'b'"]
        );
    }

    #[test]
    fn left_recursion_still_completes() {
        let (grammar, first, symbols) = analyze("S = S 'a' | 'b' ;");
        assert_eq!(first_of(&grammar, &first, &symbols, "S", 0), ["'b'"]);
        assert_eq!(first_of(&grammar, &first, &symbols, "S", 1), ["'b'"]);
        for (id, _) in grammar.rules() {
            assert!(first.is_complete(id), "rule {} incomplete", id);
        }
    }

    #[test]
    fn mutual_recursion_diverges() {
        let (_, first, _) = analyze("A = B 'x' ; B = A 'y' ;");
        assert!(first.incomplete().next().is_some());
    }
}
