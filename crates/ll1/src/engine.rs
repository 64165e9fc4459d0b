//! Table-driven predictive pushdown over a finished analysis.
//!
//! The generated C parser is the production consumer of the table; this
//! engine runs the same algorithm in-process so that grammars can be
//! exercised directly, which is mostly useful in tests.

use crate::grammar::Grammar;
use crate::parse_table::{Cell, ParseTable};
use crate::symbols::{SymbolId, SymbolTable};
use crate::util::byte_symbol_name;

/// A recognizer for the language of an analyzed grammar.
pub struct Engine<'a> {
    grammar: &'a Grammar,
    table: &'a ParseTable,
}

impl<'a> Engine<'a> {
    pub fn new(grammar: &'a Grammar, table: &'a ParseTable) -> Self {
        Self { grammar, table }
    }

    /// Drive the table over a terminal sequence; `true` iff the whole
    /// input derives from the start symbol.
    pub fn recognize<I>(&self, input: I) -> bool
    where
        I: IntoIterator<Item = SymbolId>,
    {
        let mut input = input.into_iter();
        let mut lookahead = input.next().unwrap_or(SymbolId::EOI);
        let mut stack = vec![SymbolId::EOI, self.grammar.start()];

        while let Some(top) = stack.pop() {
            if top == SymbolId::EOI {
                return lookahead == SymbolId::EOI;
            }
            if self.grammar.is_terminal(top) {
                if top != lookahead {
                    return false;
                }
                lookahead = input.next().unwrap_or(SymbolId::EOI);
                continue;
            }
            match self.table.get(top, lookahead) {
                Cell::Rule(rule) => {
                    for &symbol in self.grammar.rule(rule).right().iter().rev() {
                        stack.push(symbol);
                    }
                }
                Cell::Empty | Cell::Conflict => return false,
            }
        }

        // the stack bottoms out at the end-of-input sentinel above
        false
    }

    /// Recognize a raw byte string, mapping each byte to its quoted
    /// byte-terminal. Bytes the grammar never mentions reject immediately.
    pub fn recognize_bytes(&self, symbols: &SymbolTable, input: &[u8]) -> bool {
        let mut terminals = Vec::with_capacity(input.len());
        for &byte in input {
            match symbols.get(&byte_symbol_name(byte)) {
                Some(id) if self.grammar.is_terminal(id) => terminals.push(id),
                _ => return false,
            }
        }
        self.recognize(terminals)
    }
}
