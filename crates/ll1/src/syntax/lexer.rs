//! Lexer for the grammar source language.

use crate::diagnostics::Diagnostics;
use crate::symbols::{SymbolId, SymbolTable};
use crate::util::display_fn;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Invalid,
    Id,
    Num,
    Regexp,
    Eq,
    Bar,
    Semicolon,
    Percent,
    LParen,
    RParen,
    LCurl,
    RCurl,
    Question,
    Plus,
    Star,
    Comma,
    Period,
    At,
}

impl TokenKind {
    /// Fixed spelling of the kind, used in diagnostics. `None` for the
    /// payload-carrying kinds, whose spelling is the interned lexeme.
    pub fn fixed_name(self) -> Option<&'static str> {
        match self {
            Self::Eof => Some("$"),
            Self::Eq => Some("="),
            Self::Bar => Some("|"),
            Self::Semicolon => Some(";"),
            Self::Percent => Some("%"),
            Self::LParen => Some("("),
            Self::RParen => Some(")"),
            Self::LCurl => Some("{"),
            Self::RCurl => Some("}"),
            Self::Question => Some("?"),
            Self::Plus => Some("+"),
            Self::Star => Some("*"),
            Self::Comma => Some(","),
            Self::Period => Some("."),
            Self::At => Some("@"),
            Self::Id | Self::Num | Self::Regexp | Self::Invalid => None,
        }
    }
}

/// A lexical token: a kind plus, for `Id`/`Num`/`Regexp`, the interned lexeme.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub payload: Option<SymbolId>,
}

impl Token {
    fn plain(kind: TokenKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    fn with_payload(kind: TokenKind, payload: SymbolId) -> Self {
        Self {
            kind,
            payload: Some(payload),
        }
    }

    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        display_fn(move |f| match (self.kind.fixed_name(), self.payload) {
            (Some(name), _) => f.write_str(name),
            (None, Some(id)) => f.write_str(symbols.name(id)),
            (None, None) => f.write_str("<invalid>"),
        })
    }
}

/// Byte-level lexer with one byte of lookahead.
///
/// Quote runs are stateful: between an opening and a closing quote every
/// character is returned as its own `Id` token carrying the byte-terminal
/// name. An empty regex `//` lexes as whitespace.
pub struct Lexer<'src> {
    src: &'src [u8],
    pos: usize,
    cr_lines: u32,
    lf_lines: u32,
    quote: Option<u8>,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src [u8]) -> Self {
        Self {
            src,
            pos: 0,
            cr_lines: 0,
            lf_lines: 0,
            quote: None,
        }
    }

    /// Current 1-based line number. CR-only, LF-only and CRLF sources all
    /// count lines; the larger of the two counters wins.
    pub fn line(&self) -> u32 {
        self.cr_lines.max(self.lf_lines) + 1
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn is_word_byte(byte: u8) -> bool {
        byte == b'_' || byte.is_ascii_alphanumeric()
    }

    /// NUM iff all digits and not a zero-prefixed multi-digit number.
    fn classify_word(word: &[u8]) -> TokenKind {
        let numeric = !word.is_empty() && word.iter().all(u8::is_ascii_digit);
        if numeric && !(word.len() > 1 && word[0] == b'0') {
            TokenKind::Num
        } else {
            TokenKind::Id
        }
    }

    fn invalid(&mut self, diags: &mut Diagnostics) -> Token {
        diags.error(format!(
            "invalid character sequence (line {})",
            self.line()
        ));
        let mut dump = String::from("next characters are:");
        for &byte in self.src[self.pos..].iter().take(10) {
            let shown = if (0x20..=0x7E).contains(&byte) {
                byte as char
            } else {
                '.'
            };
            dump.push_str(&format!(" 0x{:02X}({})", byte, shown));
        }
        if self.pos >= self.src.len() {
            dump.push_str(" (EOF)");
        } else if self.src.len() - self.pos > 10 {
            dump.push_str(" ...");
        }
        diags.note(dump);
        Token::plain(TokenKind::Invalid)
    }

    pub fn next_token(&mut self, symbols: &mut SymbolTable, diags: &mut Diagnostics) -> Token {
        loop {
            if let Some(quote) = self.quote {
                let Some(byte) = self.bump() else {
                    return self.invalid(diags);
                };
                if byte == quote {
                    self.quote = None;
                    continue;
                }
                let name = if byte == b'\\' {
                    match self.bump() {
                        Some(b'n') => "0x0A".to_owned(),
                        Some(b'r') => "0x0D".to_owned(),
                        Some(b's') => "' '".to_owned(),
                        Some(b't') => "0x09".to_owned(),
                        _ => return self.invalid(diags),
                    }
                } else if (0x20..=0x7E).contains(&byte) {
                    format!("'{}'", byte as char)
                } else {
                    format!("0x{:02X}", byte)
                };
                return Token::with_payload(TokenKind::Id, symbols.intern(name));
            }

            let Some(byte) = self.bump() else {
                return Token::plain(TokenKind::Eof);
            };
            match byte {
                b' ' | b'\t' => continue,
                b'\r' => {
                    self.cr_lines += 1;
                    continue;
                }
                b'\n' => {
                    self.lf_lines += 1;
                    continue;
                }
                b'#' => {
                    while let Some(byte) = self.bump() {
                        match byte {
                            b'\r' => {
                                self.cr_lines += 1;
                                break;
                            }
                            b'\n' => {
                                self.lf_lines += 1;
                                break;
                            }
                            _ => {}
                        }
                    }
                    continue;
                }
                b'=' => return Token::plain(TokenKind::Eq),
                b'|' => return Token::plain(TokenKind::Bar),
                b';' => return Token::plain(TokenKind::Semicolon),
                b'%' => return Token::plain(TokenKind::Percent),
                b'(' => return Token::plain(TokenKind::LParen),
                b')' => return Token::plain(TokenKind::RParen),
                b'{' => return Token::plain(TokenKind::LCurl),
                b'}' => return Token::plain(TokenKind::RCurl),
                b'?' => return Token::plain(TokenKind::Question),
                b'+' => return Token::plain(TokenKind::Plus),
                b'*' => return Token::plain(TokenKind::Star),
                b',' => return Token::plain(TokenKind::Comma),
                b'.' => return Token::plain(TokenKind::Period),
                b'@' => return Token::plain(TokenKind::At),
                b'\'' | b'"' => {
                    self.quote = Some(byte);
                    continue;
                }
                b'/' => match self.lex_regex(diags) {
                    Ok(Some(body)) => {
                        return Token::with_payload(TokenKind::Regexp, symbols.intern_regex(&body));
                    }
                    Ok(None) => continue,
                    Err(token) => return token,
                },
                b':' => {
                    let start = self.pos;
                    while self.peek().is_some_and(Self::is_word_byte) {
                        self.pos += 1;
                    }
                    let word = &self.src[start..self.pos];
                    if self.peek() != Some(b':') {
                        return self.invalid(diags);
                    }
                    self.pos += 1;
                    let kind = if word.is_empty() {
                        TokenKind::Id
                    } else {
                        Self::classify_word(word)
                    };
                    // word bytes are ASCII, so the lossless conversion holds
                    let name = format!(":{}:", std::str::from_utf8(word).unwrap());
                    return Token::with_payload(kind, symbols.intern(name));
                }
                _ => {
                    self.pos -= 1;
                    let start = self.pos;
                    while self.peek().is_some_and(Self::is_word_byte) {
                        self.pos += 1;
                    }
                    let word = &self.src[start..self.pos];
                    if word.is_empty() {
                        return self.invalid(diags);
                    }
                    let kind = Self::classify_word(word);
                    let name = std::str::from_utf8(word).unwrap().to_owned();
                    return Token::with_payload(kind, symbols.intern(name));
                }
            }
        }
    }

    /// Lex the body of a `/…/` literal; the opening slash is consumed.
    ///
    /// `\x` always consumes one more byte. Inside `[…]` the closing bracket
    /// ends the class, except immediately after `[` or `[^` where it is
    /// content. `Ok(None)` is the empty regex, which reads as whitespace.
    fn lex_regex(&mut self, diags: &mut Diagnostics) -> Result<Option<Vec<u8>>, Token> {
        let mut body = Vec::new();
        loop {
            let Some(byte) = self.bump() else {
                return Err(self.invalid(diags));
            };
            if byte == b'/' {
                break;
            }
            body.push(byte);
            match byte {
                b'\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(self.invalid(diags));
                    };
                    body.push(escaped);
                }
                b'[' => {
                    let Some(first) = self.bump() else {
                        return Err(self.invalid(diags));
                    };
                    body.push(first);
                    if first == b'\\' || first == b'^' {
                        let Some(next) = self.bump() else {
                            return Err(self.invalid(diags));
                        };
                        body.push(next);
                    }
                    loop {
                        let Some(inner) = self.bump() else {
                            return Err(self.invalid(diags));
                        };
                        body.push(inner);
                        if inner == b']' {
                            break;
                        }
                        if inner == b'\\' {
                            let Some(escaped) = self.bump() else {
                                return Err(self.invalid(diags));
                            };
                            body.push(escaped);
                        }
                    }
                }
                _ => {}
            }
        }
        if body.is_empty() {
            Ok(None)
        } else {
            Ok(Some(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> (Vec<Token>, SymbolTable, Diagnostics) {
        let mut symbols = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let mut lexer = Lexer::new(src.as_bytes());
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token(&mut symbols, &mut diags);
            let kind = token.kind;
            tokens.push(token);
            if matches!(kind, TokenKind::Eof | TokenKind::Invalid) {
                break;
            }
        }
        (tokens, symbols, diags)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    fn names(tokens: &[Token], symbols: &SymbolTable) -> Vec<String> {
        tokens
            .iter()
            .filter_map(|t| t.payload.map(|id| symbols.name(id).to_owned()))
            .collect()
    }

    #[test]
    fn punctuation_and_words() {
        let (tokens, symbols, _) = lex_all("expr = term ; # trailing comment\n% a2 ;");
        use TokenKind::*;
        assert_eq!(
            kinds(&tokens),
            [Id, Eq, Id, Semicolon, Percent, Id, Semicolon, Eof]
        );
        assert_eq!(names(&tokens, &symbols), ["expr", "term", "a2"]);
    }

    #[test]
    fn number_classification() {
        let (tokens, symbols, _) = lex_all("12 0 007 1a _9");
        use TokenKind::*;
        assert_eq!(kinds(&tokens), [Num, Num, Id, Id, Id, Eof]);
        assert_eq!(names(&tokens, &symbols), ["12", "0", "007", "1a", "_9"]);
    }

    #[test]
    fn colon_words() {
        let (tokens, symbols, _) = lex_all(":ws: :123: :007:");
        use TokenKind::*;
        assert_eq!(kinds(&tokens), [Id, Num, Id, Eof]);
        assert_eq!(names(&tokens, &symbols), [":ws:", ":123:", ":007:"]);
    }

    #[test]
    fn unterminated_colon_word() {
        let (tokens, _, diags) = lex_all(":ws");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Invalid);
        assert!(diags.has_errors());
    }

    #[test]
    fn quote_runs() {
        let (tokens, symbols, _) = lex_all(r#"'ab' "x\n""#);
        use TokenKind::*;
        assert_eq!(kinds(&tokens), [Id, Id, Id, Id, Eof]);
        assert_eq!(names(&tokens, &symbols), ["'a'", "'b'", "'x'", "0x0A"]);
    }

    #[test]
    fn quote_escapes() {
        let (tokens, symbols, _) = lex_all(r"'\s\t\r'");
        assert_eq!(names(&tokens, &symbols), ["' '", "0x09", "0x0D"]);
    }

    #[test]
    fn bad_quote_escape() {
        let (tokens, _, _) = lex_all(r"'\q'");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Invalid);
    }

    #[test]
    fn unterminated_quote_run() {
        let (tokens, _, _) = lex_all("'a");
        assert_eq!(
            kinds(&tokens),
            [TokenKind::Id, TokenKind::Invalid]
        );
    }

    #[test]
    fn regex_literals() {
        let (tokens, symbols, _) = lex_all("/[a-c]x/ // /a\\/b/");
        use TokenKind::*;
        // the empty regex reads as whitespace
        assert_eq!(kinds(&tokens), [Regexp, Regexp, Eof]);
        assert_eq!(names(&tokens, &symbols), ["/[a-c]x/", "/a\\/b/"]);
        let id = tokens[0].payload.unwrap();
        assert_eq!(symbols.regex_body(id), Some(&b"[a-c]x"[..]));
    }

    #[test]
    fn regex_class_may_contain_slash_and_bracket() {
        let (tokens, symbols, _) = lex_all("/[]/]/");
        assert_eq!(tokens[0].kind, TokenKind::Regexp);
        assert_eq!(names(&tokens, &symbols), ["/[]/]/"]);
    }

    #[test]
    fn unterminated_regex() {
        let (tokens, _, diags) = lex_all("/ab");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Invalid);
        assert!(diags.has_errors());
    }

    #[test]
    fn line_numbers() {
        let mut symbols = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let mut lexer = Lexer::new(b"a\nb\r\nc\n");
        assert_eq!(lexer.line(), 1);
        lexer.next_token(&mut symbols, &mut diags);
        lexer.next_token(&mut symbols, &mut diags);
        assert_eq!(lexer.line(), 2);
        lexer.next_token(&mut symbols, &mut diags);
        assert_eq!(lexer.line(), 3);
    }
}
