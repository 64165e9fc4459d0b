//! Predictive parser for the grammar source language.
//!
//! The meta-grammar is itself LL(1) and is parsed with the stack method:
//! every transition is a pure function of the top-of-stack entry and the
//! current lookahead token. The fixed transition table below is the
//! FIRST/FOLLOW-derived expansion of the meta-grammar.

use super::cst::{MetaSym, NodeId, NodeKind, SyntaxTree};
use super::lexer::{Lexer, Token, TokenKind};
use crate::diagnostics::Diagnostics;
use crate::symbols::SymbolTable;
use crate::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum StackEntry {
    Begin,
    /// Pop back to the parent node when the current body is exhausted.
    EndOfBody,
    Meta(MetaSym),
    Term(TokenKind),
}

impl StackEntry {
    fn display_name(self) -> Option<&'static str> {
        match self {
            Self::Begin | Self::EndOfBody => None,
            Self::Meta(meta) => Some(meta.display_name()),
            Self::Term(kind) => Some(kind.fixed_name().unwrap_or(match kind {
                TokenKind::Id => "ID",
                TokenKind::Num => "NUM",
                TokenKind::Regexp => "REGEXP",
                _ => "<invalid>",
            })),
        }
    }
}

enum Expansion {
    /// Replace the nonterminal by a body; entries are listed in push order,
    /// so the last one ends up on top of the stack.
    Grow(&'static [StackEntry]),
    /// The nonterminal derives the empty string here.
    Epsilon,
    Reject,
}

fn expand(meta: MetaSym, lookahead: TokenKind) -> Expansion {
    use Expansion::{Epsilon, Grow, Reject};
    use MetaSym as M;
    use StackEntry::{Meta, Term};
    use TokenKind as T;

    match (meta, lookahead) {
        (M::Root, _) => Reject,

        (M::Input, T::Id | T::Percent | T::Eof) => Grow(&[Meta(M::Syntax)]),

        (M::Syntax, T::Id | T::Percent) => Grow(&[Meta(M::Syntax), Meta(M::Def)]),
        (M::Syntax, T::Eof) => Epsilon,

        (M::Def, T::Id) => Grow(&[
            Term(T::Semicolon),
            Meta(M::BodyList),
            Term(T::Eq),
            Meta(M::CommaOpt),
            Term(T::Id),
        ]),
        (M::Def, T::Percent) => Grow(&[
            Term(T::Semicolon),
            Meta(M::IdList),
            Term(T::Percent),
        ]),

        (
            M::BodyList,
            T::Id | T::Regexp | T::Semicolon | T::Bar | T::LParen | T::RParen | T::Comma | T::At,
        ) => Grow(&[Meta(M::BodyListRest), Meta(M::BodyInternal)]),

        (M::BodyListRest, T::Bar) => Grow(&[
            Meta(M::BodyListRest),
            Meta(M::BodyInternal),
            Term(T::Bar),
        ]),
        (M::BodyListRest, T::Semicolon | T::RParen) => Epsilon,

        (M::BodyInternal, T::Id | T::Regexp | T::LParen | T::Comma | T::At) => Grow(&[
            Meta(M::BodyInternal),
            Meta(M::Body),
            Meta(M::CommaOpt),
        ]),
        (M::BodyInternal, T::Bar | T::Semicolon | T::RParen) => Epsilon,

        (M::Body, T::Id | T::Regexp) => Grow(&[Meta(M::BodyOpt), Meta(M::IdOrRegexp)]),
        (M::Body, T::LParen) => Grow(&[
            Meta(M::BodyOpt),
            Term(T::RParen),
            Meta(M::BodyList),
            Term(T::LParen),
        ]),
        (M::Body, T::At) => Grow(&[Meta(M::NumberOpt), Term(T::At)]),

        (M::BodyOpt, T::Question | T::Plus | T::Star | T::LCurl) => {
            Grow(&[Meta(M::BodyOpt), Meta(M::BodyOptItem)])
        }
        (
            M::BodyOpt,
            T::Id | T::Regexp | T::Semicolon | T::LParen | T::RParen | T::Bar | T::Comma | T::At,
        ) => Epsilon,

        (M::BodyOptItem, T::Question) => Grow(&[Term(T::Question)]),
        (M::BodyOptItem, T::Plus) => Grow(&[Term(T::Plus)]),
        (M::BodyOptItem, T::Star) => Grow(&[Term(T::Star)]),
        (M::BodyOptItem, T::LCurl) => Grow(&[
            Term(T::RCurl),
            Meta(M::Range),
            Term(T::LCurl),
        ]),

        (M::Range, T::Num) => Grow(&[Meta(M::RangeRest), Term(T::Num)]),

        (M::RangeRest, T::RCurl) => Epsilon,
        (M::RangeRest, T::Comma) => Grow(&[Term(T::Num), Term(T::Comma)]),

        (M::IdList, T::Id) => Grow(&[Meta(M::IdList), Term(T::Id)]),
        (M::IdList, T::Semicolon) => Epsilon,

        (M::CommaOpt, T::Comma) => Grow(&[Term(T::Comma)]),
        (M::CommaOpt, T::Id | T::Regexp | T::LParen | T::Eq | T::At) => Epsilon,

        (M::IdOrRegexp, T::Id) => Grow(&[Term(T::Id)]),
        (M::IdOrRegexp, T::Regexp) => Grow(&[Term(T::Regexp)]),

        (
            M::NumberOpt,
            T::Id | T::Regexp | T::Semicolon | T::LParen | T::RParen | T::Bar | T::Comma | T::At,
        ) => Epsilon,
        (M::NumberOpt, T::Num) => Grow(&[Term(T::Num)]),

        _ => Reject,
    }
}

/// Parse a grammar source into its concrete syntax tree.
pub fn parse(
    source: &[u8],
    symbols: &mut SymbolTable,
    diags: &mut Diagnostics,
) -> Result<SyntaxTree, Error> {
    let mut lexer = Lexer::new(source);
    let mut tree = SyntaxTree::new();
    let mut node = NodeId::ROOT;
    let mut stack = vec![StackEntry::Begin];
    let mut token = lexer.next_token(symbols, diags);

    loop {
        if token.kind == TokenKind::Invalid {
            return Err(Error::Lexical);
        }
        let top = *stack.last().expect("parse stack underflow");
        tracing::trace!(?top, lookahead = ?token.kind, "step");
        match top {
            StackEntry::Begin => {
                stack.pop();
                stack.push(StackEntry::EndOfBody);
                stack.push(StackEntry::Term(TokenKind::Eof));
                stack.push(StackEntry::Meta(MetaSym::Input));
            }

            StackEntry::EndOfBody => {
                stack.pop();
                node = tree.parent(node).expect("unbalanced end-of-body");
            }

            StackEntry::Term(TokenKind::Eof) => {
                if token.kind == TokenKind::Eof {
                    return Ok(tree);
                }
                return Err(report_mismatch(&stack, token, &mut lexer, symbols, diags));
            }

            StackEntry::Term(expected) => {
                if token.kind == expected {
                    tree.push(node, NodeKind::Leaf(token));
                    stack.pop();
                    token = lexer.next_token(symbols, diags);
                } else {
                    return Err(report_mismatch(&stack, token, &mut lexer, symbols, diags));
                }
            }

            StackEntry::Meta(meta) => {
                let child = tree.push(node, NodeKind::Meta(meta));
                match expand(meta, token.kind) {
                    Expansion::Grow(entries) => {
                        stack.pop();
                        stack.push(StackEntry::EndOfBody);
                        stack.extend_from_slice(entries);
                        node = child;
                    }
                    Expansion::Epsilon => {
                        stack.pop();
                    }
                    Expansion::Reject => {
                        return Err(report_mismatch(&stack, token, &mut lexer, symbols, diags));
                    }
                }
            }
        }
    }
}

/// Report a stack/lookahead mismatch: the line number, up to ten remaining
/// stack symbols and up to ten upcoming tokens.
fn report_mismatch(
    stack: &[StackEntry],
    token: Token,
    lexer: &mut Lexer<'_>,
    symbols: &mut SymbolTable,
    diags: &mut Diagnostics,
) -> Error {
    diags.error(format!(
        "invalid token sequence in the grammar source (line {})",
        lexer.line()
    ));

    let mut shown = 0;
    let mut rest = false;
    let mut stack_dump = String::from("symbols on the stack:");
    for entry in stack.iter().rev() {
        let Some(name) = entry.display_name() else {
            continue;
        };
        if shown == 10 {
            rest = true;
            break;
        }
        stack_dump.push(' ');
        stack_dump.push_str(name);
        shown += 1;
    }
    if rest {
        stack_dump.push_str(" ...");
    }
    diags.note(stack_dump);

    let mut token_dump = String::from("next tokens:");
    let mut token = token;
    for i in 0..10 {
        if i > 0 {
            token = lexer.next_token(symbols, diags);
        }
        if matches!(token.kind, TokenKind::Invalid) {
            break;
        }
        token_dump.push_str(&format!(" {}", token.display(symbols)));
        if token.kind == TokenKind::Eof {
            break;
        }
    }
    if !matches!(token.kind, TokenKind::Eof | TokenKind::Invalid) {
        token_dump.push_str(" ...");
    }
    diags.note(token_dump);

    Error::Syntax
}
