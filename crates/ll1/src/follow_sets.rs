//! Calculation of the FOLLOW set function.

use crate::first_sets::FirstSets;
use crate::grammar::Grammar;
use crate::symbols::{SymbolId, SymbolTable};
use crate::types::{Map, Set};
use crate::util::display_fn;
use std::fmt;

/// Per-nonterminal FOLLOW sets over `T ∪ {$}`.
///
/// Only nonterminals with a nullable rule strictly require their pass to
/// complete (`need_complete`); the others are reported as converged even
/// when a dependency never settled.
#[derive(Debug)]
pub struct FollowSets {
    sets: Map<SymbolId, Set<SymbolId>>,
    complete: Map<SymbolId, bool>,
    need_complete: Map<SymbolId, bool>,
}

impl FollowSets {
    pub fn new(grammar: &Grammar, first: &FirstSets) -> Self {
        let mut sets: Map<SymbolId, Set<SymbolId>> = Map::default();
        let mut complete: Map<SymbolId, bool> = Map::default();
        let mut need_complete: Map<SymbolId, bool> = Map::default();
        for nt in grammar.nonterminals() {
            sets.insert(nt, Set::default());
            complete.insert(nt, false);
            let nullable = grammar.rules_of(nt).any(|rule| first.is_nullable(rule));
            need_complete.insert(nt, nullable);
        }

        sets[&grammar.start()].insert(SymbolId::EOI);

        let mut updated = true;
        while updated {
            updated = false;
            for target in grammar.nonterminals() {
                if complete[&target] {
                    continue;
                }
                let mut provisional = false;
                for (_, rule) in grammar.rules() {
                    let left = rule.left();
                    for (position, &symbol) in rule.right().iter().enumerate() {
                        if symbol != target {
                            continue;
                        }
                        // FIRST of the suffix after this occurrence
                        let mut suffix_first: Set<SymbolId> = Set::default();
                        let mut nullable_suffix = true;
                        for &follower in &rule.right()[position + 1..] {
                            nullable_suffix = false;
                            if grammar.is_terminal(follower) {
                                suffix_first.insert(follower);
                                break;
                            }
                            for dep in grammar.rules_of(follower) {
                                for &head in first.get(dep) {
                                    if head == SymbolId::EPSILON {
                                        nullable_suffix = true;
                                    } else {
                                        suffix_first.insert(head);
                                    }
                                }
                            }
                            if !nullable_suffix {
                                break;
                            }
                        }
                        for symbol in suffix_first {
                            if sets[&target].insert(symbol) {
                                updated = true;
                            }
                        }
                        if nullable_suffix && left != target {
                            if !complete[&left] {
                                provisional = true;
                            } else {
                                let inherited: Vec<SymbolId> = sets[&left]
                                    .iter()
                                    .copied()
                                    .filter(|s| !sets[&target].contains(s))
                                    .collect();
                                if !inherited.is_empty() {
                                    updated = true;
                                    sets[&target].extend(inherited);
                                }
                            }
                        }
                    }
                }
                if !provisional {
                    updated = true;
                    complete.insert(target, true);
                }
            }
        }

        Self {
            sets,
            complete,
            need_complete,
        }
    }

    pub fn get(&self, nt: SymbolId) -> &Set<SymbolId> {
        &self.sets[&nt]
    }

    pub fn is_complete(&self, nt: SymbolId) -> bool {
        self.complete[&nt]
    }

    /// Nonterminals that required completion but never converged.
    pub fn diverged(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.need_complete
            .iter()
            .filter(|(nt, needed)| **needed && !self.complete[*nt])
            .map(|(&nt, _)| nt)
    }

    pub fn display<'a>(
        &'a self,
        grammar: &'a Grammar,
        symbols: &'a SymbolTable,
    ) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            writeln!(f, "follow:")?;
            for nt in grammar.nonterminals() {
                write!(f, "  {} ->", symbols.name(nt))?;
                for &symbol in self.get(nt) {
                    write!(f, " {}", symbols.name(symbol))?;
                }
                let bad = self.need_complete[&nt] && !self.complete[&nt];
                writeln!(f, " : {}", if bad { "bad" } else { "ok" })?;
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

    fn analyze(source: &str) -> (Grammar, FirstSets, FollowSets, SymbolTable) {
        let mut symbols = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let tree = syntax::parse(source.as_bytes(), &mut symbols, &mut diags).unwrap();
        let grammar = lower::lower(&tree, &mut symbols, &mut diags).unwrap();
        let first = FirstSets::new(&grammar);
        let follow = FollowSets::new(&grammar, &first);
        (grammar, first, follow, symbols)
    }

    fn follow_of(follow: &FollowSets, symbols: &SymbolTable, nt: &str) -> Vec<String> {
        let id = symbols.get(nt).unwrap();
        let mut names: Vec<String> = follow
            .get(id)
            .iter()
            .map(|&s| symbols.name(s).to_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn start_symbol_is_followed_by_eoi() {
        let (_, _, follow, symbols) = analyze("S = 'a' ;");
        assert_eq!(follow_of(&follow, &symbols, "^"), ["$"]);
        assert_eq!(follow_of(&follow, &symbols, "S"), ["$"]);
    }

    #[test]
    fn follower_terminals_propagate() {
        let (_, _, follow, symbols) = analyze("S = A 'b' ; A = 'a' ;");
        assert_eq!(follow_of(&follow, &symbols, "A"), ["'b'"]);
    }

    #[test]
    fn nullable_suffix_inherits_follow() {
        let (_, _, follow, symbols) = analyze("S = A B 'c' ; A = 'a' ; B = 'b' | ;");
        // B may vanish, so A sees both FIRST(B) and the following 'c'
        assert_eq!(follow_of(&follow, &symbols, "A"), ["'b'", "'c'"]);
        assert_eq!(follow_of(&follow, &symbols, "B"), ["'c'"]);
    }

    #[test]
    fn end_of_rule_inherits_head_follow() {
        let (_, _, follow, symbols) = analyze("S = 'x' A ; A = 'a' ;");
        assert_eq!(follow_of(&follow, &symbols, "A"), ["$"]);
    }

    #[test]
    fn converges_on_ordinary_grammars() {
        let (_, _, follow, _) = analyze("S = 'a' ? 'b' | ( 'c' | 'd' ) * ;");
        assert_eq!(follow.diverged().count(), 0);
    }
}
