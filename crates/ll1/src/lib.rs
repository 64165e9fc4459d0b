//! An LL(1) parser generator.
//!
//! The pipeline runs strictly forward: lex and parse the grammar source
//! into a concrete syntax tree, lower it to plain BNF productions,
//! compute FIRST and FOLLOW, and build the predictive parse table. Each
//! stage produces an immutable artifact consumed by the next; everything
//! lives in one [`Analysis`] whose lifetime is a single run.

pub mod codegen;
pub mod diagnostics;
pub mod engine;
pub mod first_sets;
pub mod follow_sets;
pub mod grammar;
pub mod lower;
pub mod parse_table;
pub mod symbols;
pub mod syntax;

mod regex;
mod types;
mod util;

use crate::diagnostics::Diagnostics;
use crate::first_sets::FirstSets;
use crate::follow_sets::FollowSets;
use crate::grammar::Grammar;
use crate::parse_table::ParseTable;
use crate::symbols::SymbolTable;

/// Failures that abort the pipeline.
///
/// Table conflicts are not an `Error`: the analysis still finishes so the
/// table and its conflict cells can be inspected; see
/// [`Analysis::is_ll1`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("lexical error in the grammar source")]
    Lexical,

    #[error("syntax error in the grammar source")]
    Syntax,

    #[error("a symbol is declared as both a terminal and a nonterminal")]
    SymbolConflict,

    #[error("building the FIRST sets did not converge")]
    FirstDivergence,

    #[error("building the FOLLOW sets did not converge")]
    FollowDivergence,
}

/// Analysis options.
#[derive(Debug, Default, Copy, Clone)]
pub struct Options {
    /// Resolve table clashes in favor of the non-nullable rule when
    /// exactly one contender is nullable, recording a soft warning
    /// instead of a conflict.
    pub nullable_tiebreak: bool,
}

/// Everything the pipeline produced, read-only once built.
#[derive(Debug)]
pub struct Analysis {
    pub symbols: SymbolTable,
    pub grammar: Grammar,
    pub first: FirstSets,
    pub follow: FollowSets,
    pub table: ParseTable,
}

impl Analysis {
    pub fn is_ll1(&self) -> bool {
        self.table.is_ll1()
    }
}

/// Run the full pipeline over a grammar source.
///
/// Diagnostics accumulate in `diags`; fatal stages return an [`Error`]
/// and leave whatever was reported so far in the sink.
pub fn analyze(source: &[u8], options: Options, diags: &mut Diagnostics) -> Result<Analysis, Error> {
    let span = tracing::trace_span!("analyze");
    let _entered = span.enter();

    let mut symbols = SymbolTable::new();

    let tree = syntax::parse(source, &mut symbols, diags)?;
    tracing::debug!(nodes = tree.len(), "parsed grammar source");

    let grammar = lower::lower(&tree, &mut symbols, diags)?;
    drop(tree);

    let first = FirstSets::new(&grammar);
    if first.incomplete().next().is_some() {
        diags.error("building the FIRST sets failed");
        for rule in first.incomplete() {
            diags.note(format!(
                "rule {} ({}) never stabilized",
                rule,
                grammar.rule(rule).display(&symbols)
            ));
        }
        return Err(Error::FirstDivergence);
    }

    let follow = FollowSets::new(&grammar, &first);
    if follow.diverged().next().is_some() {
        diags.error("building the FOLLOW sets failed");
        for nt in follow.diverged() {
            diags.note(format!("nonterminal {} never stabilized", symbols.name(nt)));
        }
        return Err(Error::FollowDivergence);
    }

    let table = ParseTable::build(&grammar, &first, &follow, options.nullable_tiebreak);
    for booking in table.bookings() {
        if booking.resolved {
            continue;
        }
        let mut message = format!(
            "conflict on {} with lookahead {} (rule {}",
            symbols.name(booking.nonterminal),
            symbols.name(booking.lookahead),
            booking.rule,
        );
        match booking.previous {
            Some(previous) => message.push_str(&format!(" and rule {})", previous)),
            None => message.push_str(" and earlier conflicts)"),
        }
        diags.warning(message);
    }
    if table.has_partial_bookings() {
        diags.warning("partial booking: some conflicts were resolved in favor of the non-nullable rule");
    }
    tracing::debug!(ll1 = table.is_ll1(), "table built");

    Ok(Analysis {
        symbols,
        grammar,
        first,
        follow,
        table,
    })
}
