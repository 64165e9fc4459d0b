//! Lowering of the concrete syntax tree into plain BNF productions.
//!
//! Runs two passes over the statement list: symbol classification (rule
//! heads become nonterminals, `%` lists become terminals), then a
//! worklist walk over the rule bodies that desugars grouping, the postfix
//! operators and regex literals into generated helper nonterminals. The
//! walk is an explicit stack of continuation records, not recursion.

use crate::diagnostics::Diagnostics;
use crate::grammar::Grammar;
use crate::regex;
use crate::symbols::{SymbolId, SymbolTable};
use crate::syntax::cst::{MetaSym, NodeId, NodeKind, SyntaxTree};
use crate::syntax::lexer::TokenKind;
use crate::types::Set;
use crate::util::byte_symbol_name;
use crate::Error;
use std::collections::BTreeSet;

/// Effect of a postfix operator chain on one body element.
///
/// `counts` is the set of admissible copy counts; `{1}` with no flags is
/// the plain element. The set is ordered so the emitted helper chain is
/// stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Multiplicity {
    pub(crate) nullable: bool,
    pub(crate) infinitable: bool,
    pub(crate) counts: BTreeSet<u32>,
}

impl Multiplicity {
    pub(crate) fn new() -> Self {
        Self {
            nullable: false,
            infinitable: false,
            counts: BTreeSet::from([1]),
        }
    }

    pub(crate) fn question(&mut self) {
        self.nullable = true;
    }

    pub(crate) fn star(&mut self) {
        self.nullable = true;
        self.infinitable = true;
    }

    pub(crate) fn plus(&mut self) {
        self.infinitable = true;
    }

    /// `{min,max}`: every current count multiplied by every admissible
    /// repetition. `{min,max}` with `min > max` empties the set.
    pub(crate) fn repeat(&mut self, min: u32, max: u32) {
        let mut next = BTreeSet::new();
        for times in min..=max {
            for &count in &self.counts {
                next.insert(count.saturating_mul(times));
            }
        }
        self.counts = next;
    }

    /// Fold a zero count into nullability. `None` means the element
    /// contributes nothing to the production at all.
    pub(crate) fn finish(mut self) -> Option<Self> {
        if self.counts.remove(&0) {
            self.nullable = true;
        }
        if self.counts.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    fn is_plain(&self) -> bool {
        self.counts.len() == 1 && self.counts.contains(&1)
    }
}

/// Accumulates productions and the symbol classification while lowering.
///
/// Shared between the CST walk and the regex expander so both emit
/// through the same helper-generation logic.
#[derive(Debug, Default)]
pub(crate) struct RuleBuilder {
    pub(crate) pending: Vec<(SymbolId, Vec<SymbolId>)>,
    pub(crate) terminals: Set<SymbolId>,
    pub(crate) nonterminals: Set<SymbolId>,
}

impl RuleBuilder {
    /// Open a new (initially empty) production for `head` and return its
    /// index. ε-rules stay empty.
    pub(crate) fn begin_rule(&mut self, head: SymbolId) -> usize {
        self.pending.push((head, Vec::new()));
        self.pending.len() - 1
    }

    pub(crate) fn push_symbol(&mut self, rule: usize, symbol: SymbolId) {
        self.pending[rule].1.push(symbol);
    }

    pub(crate) fn gensym_nonterminal(
        &mut self,
        symbols: &mut SymbolTable,
        base: SymbolId,
    ) -> SymbolId {
        let id = symbols.gensym(base);
        self.nonterminals.insert(id);
        id
    }

    /// Intern the canonical byte-terminal name and classify it.
    pub(crate) fn byte_terminal(&mut self, symbols: &mut SymbolTable, byte: u8) -> SymbolId {
        let id = symbols.intern(byte_symbol_name(byte));
        self.terminals.insert(id);
        id
    }

    /// Emit one body element under its postfix multiplicity.
    ///
    /// Nullable elements are wrapped in `H → target [H] | ε`; bare `+`
    /// elements in `target H` with `H → target H | ε`; a non-trivial count
    /// set becomes a chain of helpers, each admitting the next count in
    /// ascending order.
    pub(crate) fn emit_element(
        &mut self,
        symbols: &mut SymbolTable,
        rule: usize,
        base: SymbolId,
        target: SymbolId,
        mult: Multiplicity,
    ) {
        let original = target;
        let chained = !mult.is_plain();
        let target = if chained {
            self.gensym_nonterminal(symbols, base)
        } else {
            target
        };

        if mult.nullable {
            let helper = self.gensym_nonterminal(symbols, base);
            self.push_symbol(rule, helper);
            let mut body = vec![target];
            if mult.infinitable {
                body.push(helper);
            }
            self.pending.push((helper, body));
            self.pending.push((helper, Vec::new()));
        } else if mult.infinitable {
            let helper = self.gensym_nonterminal(symbols, base);
            self.push_symbol(rule, target);
            self.push_symbol(rule, helper);
            self.pending.push((helper, vec![target, helper]));
            self.pending.push((helper, Vec::new()));
        }

        if chained {
            let mut head = target;
            if !mult.nullable && !mult.infinitable {
                self.push_symbol(rule, head);
            }
            let mut count = 0;
            for &admitted in &mult.counts {
                let mut body = Vec::with_capacity((admitted - count) as usize + 1);
                while count < admitted {
                    body.push(original);
                    count += 1;
                }
                let next = self.gensym_nonterminal(symbols, base);
                body.push(next);
                self.pending.push((head, body));
                self.pending.push((next, Vec::new()));
                head = next;
            }
        } else if !mult.nullable && !mult.infinitable {
            self.push_symbol(rule, target);
        }
    }
}

/// One suspended position in a body list: enough to resume emitting
/// productions for `head` after a nested group was scheduled.
#[derive(Debug)]
struct Continuation {
    /// Head of the user rule this work came from; generated names embed it.
    base: SymbolId,
    head: SymbolId,
    /// Index of the open production, if one is in progress.
    rule: Option<usize>,
    /// The head had a leading comma: wrap the whole body in a whitespace-
    /// prefixed group before descending.
    wrap: bool,
    body_internal: NodeId,
    rest: NodeId,
}

pub fn lower(
    tree: &SyntaxTree,
    symbols: &mut SymbolTable,
    diags: &mut Diagnostics,
) -> Result<Grammar, Error> {
    let span = tracing::trace_span!("lower");
    let _entered = span.enter();

    let mut builder = RuleBuilder::default();
    let mut unknown: Set<SymbolId> = Set::default();

    // split statements into rule definitions and terminal declarations
    let input = tree.child(NodeId::ROOT, 0);
    let mut syntax = tree.child(input, 0);
    let mut rule_defs = Vec::new();
    let mut term_defs = Vec::new();
    while !tree.is_empty_node(syntax) {
        let def = tree.child(syntax, 0);
        syntax = tree.child(syntax, 1);
        match tree[tree.child(def, 0)].token().map(|t| t.kind) {
            Some(TokenKind::Id) => rule_defs.push(def),
            _ => term_defs.push(def),
        }
    }

    // pass A: classification
    for &def in &rule_defs {
        let head = tree[tree.child(def, 0)]
            .token()
            .and_then(|t| t.payload)
            .expect("rule head is an identifier");
        builder.nonterminals.insert(head);
    }
    let mut conflicted = false;
    for &def in &term_defs {
        let mut id_list = tree.child(def, 1);
        while !tree.is_empty_node(id_list) {
            let id = tree[tree.child(id_list, 0)]
                .token()
                .and_then(|t| t.payload)
                .expect("terminal declaration lists identifiers");
            id_list = tree.child(id_list, 1);
            if builder.nonterminals.contains(&id) {
                diags.error(format!(
                    "symbol '{}' is already defined as a nonterminal",
                    symbols.name(id)
                ));
                conflicted = true;
            } else if !builder.terminals.insert(id) {
                diags.warning(format!(
                    "symbol '{}' is already declared as a terminal",
                    symbols.name(id)
                ));
            }
        }
    }
    if conflicted {
        return Err(Error::SymbolConflict);
    }

    // built-in helpers
    let start = symbols.intern("^");
    if builder.nonterminals.insert(start) {
        let body = rule_defs
            .first()
            .and_then(|&def| tree[tree.child(def, 0)].token())
            .and_then(|t| t.payload);
        builder.pending.push((start, body.into_iter().collect()));
    }
    let ws = symbols.intern(":ws:");
    if builder.nonterminals.insert(ws) {
        for byte in [b' ', 0x09, 0x0A, 0x0D] {
            let terminal = builder.byte_terminal(symbols, byte);
            builder.pending.push((ws, vec![terminal]));
        }
    }
    let ws_star = symbols.intern(":ws*:");
    if builder.nonterminals.insert(ws_star) {
        builder.pending.push((ws_star, vec![ws, ws_star]));
        builder.pending.push((ws_star, Vec::new()));
    }
    let at_marker = symbols.intern(":@:");
    if builder.nonterminals.insert(at_marker) {
        builder.pending.push((at_marker, Vec::new()));
    }

    // pass B: evaluate rule bodies, depth first
    let mut conts: Vec<Continuation> = Vec::new();
    for &def in rule_defs.iter().rev() {
        let head = tree[tree.child(def, 0)]
            .token()
            .and_then(|t| t.payload)
            .expect("rule head is an identifier");
        let body_list = tree.child(def, 3);
        conts.push(Continuation {
            base: head,
            head,
            rule: None,
            wrap: !tree.is_empty_node(tree.child(def, 1)),
            body_internal: tree.child(body_list, 0),
            rest: tree.child(body_list, 1),
        });
    }

    while let Some(mut cont) = conts.pop() {
        if cont.wrap {
            cont.wrap = false;
            let group = builder.gensym_nonterminal(symbols, cont.base);
            let rule = builder.begin_rule(cont.head);
            builder.push_symbol(rule, ws_star);
            builder.push_symbol(rule, group);
            cont.head = group;
            conts.push(cont);
            continue;
        }
        if cont.rule.is_none() {
            cont.rule = Some(builder.begin_rule(cont.head));
        }
        if tree.is_empty_node(cont.body_internal) {
            // the current alternative is finished; move to the next one
            cont.rule = None;
            if !tree.is_empty_node(cont.rest) {
                cont.body_internal = tree.child(cont.rest, 1);
                cont.rest = tree.child(cont.rest, 2);
                conts.push(cont);
            }
            continue;
        }

        let comma = tree.child(cont.body_internal, 0);
        let body = tree.child(cont.body_internal, 1);
        let rule = cont.rule.expect("open production");
        let base = cont.base;
        cont.body_internal = tree.child(cont.body_internal, 2);
        conts.push(cont);

        if !tree.is_empty_node(comma) {
            builder.push_symbol(rule, ws_star);
        }

        let first = tree.child(body, 0);
        let mut generated = false;
        let mut regexp = false;
        let mut body_opt = None;
        let target = match &tree[first].kind {
            NodeKind::Leaf(token) if token.kind == TokenKind::LParen => {
                let group = builder.gensym_nonterminal(symbols, base);
                let inner = tree.child(body, 1);
                conts.push(Continuation {
                    base,
                    head: group,
                    rule: None,
                    wrap: false,
                    body_internal: tree.child(inner, 0),
                    rest: tree.child(inner, 1),
                });
                generated = true;
                body_opt = Some(tree.child(body, 3));
                group
            }
            NodeKind::Leaf(token) if token.kind == TokenKind::At => at_marker,
            _ => {
                // id-or-regexp
                let leaf = tree[tree.child(first, 0)].token().expect("leaf token");
                let id = leaf.payload.expect("identifier payload");
                if leaf.kind == TokenKind::Regexp && builder.nonterminals.insert(id) {
                    regexp = true;
                }
                body_opt = Some(tree.child(body, 1));
                id
            }
        };

        let mult = multiplicity(tree, symbols, diags, body_opt)?;
        if let Some(mult) = mult.finish() {
            builder.emit_element(symbols, rule, base, target, mult);
        }

        if generated {
            continue;
        }
        if regexp {
            let body = symbols
                .regex_body(target)
                .expect("regex body is recorded")
                .to_owned();
            regex::expand(&mut builder, symbols, diags, target, base, &body)?;
            continue;
        }
        let name = symbols.name(target);
        if name.len() >= 3 && (name.starts_with('\'') || name.starts_with('0')) {
            builder.terminals.insert(target);
        } else if !builder.nonterminals.contains(&target) && !builder.terminals.contains(&target) {
            unknown.insert(target);
        }
    }

    if !unknown.is_empty() {
        let mut message = String::from("assumed to be terminal symbols:");
        for &id in &unknown {
            message.push(' ');
            message.push_str(symbols.name(id));
        }
        diags.warning(message);
        builder.terminals.extend(unknown);
    }

    tracing::debug!(
        rules = builder.pending.len(),
        terminals = builder.terminals.len(),
        nonterminals = builder.nonterminals.len(),
        "lowered"
    );

    Ok(Grammar::new(
        builder.pending,
        builder.terminals,
        builder.nonterminals,
        start,
    ))
}

/// Evaluate a `body_opt` chain of postfix operators.
fn multiplicity(
    tree: &SyntaxTree,
    symbols: &SymbolTable,
    diags: &mut Diagnostics,
    body_opt: Option<NodeId>,
) -> Result<Multiplicity, Error> {
    let mut mult = Multiplicity::new();
    let Some(mut cursor) = body_opt else {
        return Ok(mult);
    };
    while !tree.is_empty_node(cursor) {
        let item = tree.child(cursor, 0);
        cursor = tree.child(cursor, 1);
        let op = tree[tree.child(item, 0)].token().expect("operator token");
        match op.kind {
            TokenKind::Question => mult.question(),
            TokenKind::Plus => mult.plus(),
            TokenKind::Star => mult.star(),
            TokenKind::LCurl => {
                let range = tree.child(item, 1);
                let min = range_bound(tree, symbols, diags, tree.child(range, 0))?;
                let rest = tree.child(range, 1);
                let max = if tree.is_empty_node(rest) {
                    min
                } else {
                    range_bound(tree, symbols, diags, tree.child(rest, 1))?
                };
                mult.repeat(min, max);
            }
            _ => unreachable!("not a postfix operator"),
        }
    }
    Ok(mult)
}

fn range_bound(
    tree: &SyntaxTree,
    symbols: &SymbolTable,
    diags: &mut Diagnostics,
    leaf: NodeId,
) -> Result<u32, Error> {
    let id = tree[leaf]
        .token()
        .and_then(|t| t.payload)
        .expect("range bound is a number");
    let name = symbols.name(id);
    // the `:123:` spelling carries its colons
    match name.trim_matches(':').parse() {
        Ok(value) => Ok(value),
        Err(_) => {
            diags.error(format!("repetition bound '{}' is out of range", name));
            Err(Error::Syntax)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax;

    fn lower_source(source: &str) -> (Grammar, SymbolTable, Diagnostics) {
        let mut symbols = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let tree = syntax::parse(source.as_bytes(), &mut symbols, &mut diags).unwrap();
        let grammar = lower(&tree, &mut symbols, &mut diags)
            .unwrap_or_else(|err| panic!("{err}: {:?}", diags));
        (grammar, symbols, diags)
    }

    fn rule_strings(grammar: &Grammar, symbols: &SymbolTable) -> Vec<String> {
        grammar
            .rules()
            .map(|(_, rule)| rule.display(symbols).to_string())
            .collect()
    }

    #[test]
    fn builtins_and_start() {
        let (grammar, symbols, _) = lower_source("S = 'a' ;");
        let rules = rule_strings(&grammar, &symbols);
        assert_eq!(rules[0], "^ = S;");
        assert!(rules.contains(&":ws: = ' ';".to_owned()));
        assert!(rules.contains(&":ws*: = :ws: :ws*:;".to_owned()));
        assert!(rules.contains(&":@: =;".to_owned()));
        assert!(rules.contains(&"S = 'a';".to_owned()));
        let quoted_a = symbols.get("'a'").unwrap();
        assert!(grammar.is_terminal(quoted_a));
    }

    #[test]
    fn alternatives_become_separate_rules() {
        let (grammar, symbols, _) = lower_source("S = 'a' | 'b' | ;");
        let rules = rule_strings(&grammar, &symbols);
        assert!(rules.contains(&"S = 'a';".to_owned()));
        assert!(rules.contains(&"S = 'b';".to_owned()));
        assert!(rules.contains(&"S =;".to_owned()));
    }

    #[test]
    fn optional_element() {
        let (grammar, symbols, _) = lower_source("S = 'a' ? 'b' ;");
        let rules = rule_strings(&grammar, &symbols);
        // S → H 'b' with H → 'a' | ε
        assert!(rules.contains(&"S = S[1] 'b';".to_owned()));
        assert!(rules.contains(&"S[1] = 'a';".to_owned()));
        assert!(rules.contains(&"S[1] =;".to_owned()));
    }

    #[test]
    fn star_and_plus() {
        let (grammar, symbols, _) = lower_source("S = 'a' * ; T = 'b' + ;");
        let rules = rule_strings(&grammar, &symbols);
        assert!(rules.contains(&"S = S[1];".to_owned()));
        assert!(rules.contains(&"S[1] = 'a' S[1];".to_owned()));
        assert!(rules.contains(&"S[1] =;".to_owned()));
        assert!(rules.contains(&"T = 'b' T[2];".to_owned()));
        assert!(rules.contains(&"T[2] = 'b' T[2];".to_owned()));
        assert!(rules.contains(&"T[2] =;".to_owned()));
    }

    #[test]
    fn bounded_repetition_chain() {
        let (grammar, symbols, _) = lower_source("S = 'a' {2,3} ;");
        let rules = rule_strings(&grammar, &symbols);
        assert!(rules.contains(&"S = S[1];".to_owned()));
        assert!(rules.contains(&"S[1] = 'a' 'a' S[2];".to_owned()));
        assert!(rules.contains(&"S[2] =;".to_owned()));
        assert!(rules.contains(&"S[2] = 'a' S[3];".to_owned()));
        assert!(rules.contains(&"S[3] =;".to_owned()));
    }

    #[test]
    fn zero_repetition_drops_the_element() {
        let (grammar, symbols, _) = lower_source("S = 'a' {0} 'b' ;");
        let rules = rule_strings(&grammar, &symbols);
        assert!(rules.contains(&"S = 'b';".to_owned()));
    }

    #[test]
    fn group_schedules_inner_rules() {
        let (grammar, symbols, _) = lower_source("S = ( 'a' | 'b' ) 'c' ;");
        let rules = rule_strings(&grammar, &symbols);
        assert!(rules.contains(&"S = S[1] 'c';".to_owned()));
        assert!(rules.contains(&"S[1] = 'a';".to_owned()));
        assert!(rules.contains(&"S[1] = 'b';".to_owned()));
    }

    #[test]
    fn comma_prepends_whitespace() {
        let (grammar, symbols, _) = lower_source("S = 'a' , 'b' ;");
        let rules = rule_strings(&grammar, &symbols);
        assert!(rules.contains(&"S = 'a' :ws*: 'b';".to_owned()));
    }

    #[test]
    fn head_comma_wraps_the_body() {
        let (grammar, symbols, _) = lower_source("S , = 'a' 'b' ;");
        let rules = rule_strings(&grammar, &symbols);
        assert!(rules.contains(&"S = :ws*: S[1];".to_owned()));
        assert!(rules.contains(&"S[1] = 'a' 'b';".to_owned()));
    }

    #[test]
    fn at_marker() {
        let (grammar, symbols, _) = lower_source("S = 'a' @ 1 'b' ;");
        let rules = rule_strings(&grammar, &symbols);
        assert!(rules.contains(&"S = 'a' :@: 'b';".to_owned()));
    }

    #[test]
    fn unknown_symbols_become_terminals_with_warning() {
        let (grammar, symbols, diags) = lower_source("S = foo ;");
        let foo = symbols.get("foo").unwrap();
        assert!(grammar.is_terminal(foo));
        assert!(diags
            .iter()
            .any(|d| d.message.starts_with("assumed to be terminal symbols:")));
    }

    #[test]
    fn nonterminal_terminal_conflict() {
        let mut symbols = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let tree = syntax::parse(b"S = 'a' ; % S ;", &mut symbols, &mut diags).unwrap();
        let err = lower(&tree, &mut symbols, &mut diags).unwrap_err();
        assert!(matches!(err, Error::SymbolConflict));
        assert!(diags.has_errors());
    }

    #[test]
    fn terminal_redeclaration_warns() {
        let (_, _, diags) = lower_source("S = 'a' ; % a a ;");
        assert!(diags
            .iter()
            .any(|d| d.message.contains("already declared as a terminal")));
    }

    #[test]
    fn multiplicity_algebra() {
        let mut mult = Multiplicity::new();
        mult.repeat(2, 3);
        mult.repeat(2, 2);
        assert_eq!(mult.counts, BTreeSet::from([4, 6]));

        let mut zero = Multiplicity::new();
        zero.repeat(0, 1);
        let finished = zero.finish().unwrap();
        assert!(finished.nullable);
        assert_eq!(finished.counts, BTreeSet::from([1]));

        let mut none = Multiplicity::new();
        none.repeat(0, 0);
        assert!(none.finish().is_none());

        let mut inverted = Multiplicity::new();
        inverted.repeat(3, 2);
        assert!(inverted.finish().is_none());
    }
}
