//! Expansion of regex literals into byte-terminal productions.
//!
//! A regex body is split into atoms (`(`, `)`, `|`, `.`, `[…]`, a single
//! byte or a `\x` escape), each atom is lowered to productions over byte
//! terminals, and the postfix operators reuse the EBNF multiplicity
//! algorithm. Everything is evaluated on raw bytes.

use crate::diagnostics::Diagnostics;
use crate::lower::{Multiplicity, RuleBuilder};
use crate::symbols::{SymbolId, SymbolTable};
use crate::Error;
use bit_set::BitSet;

/// Expand the regex `body` into productions for `head`.
///
/// Generated helper names embed `base`, the head of the enclosing user
/// rule, to keep diagnostics readable.
pub(crate) fn expand(
    builder: &mut RuleBuilder,
    symbols: &mut SymbolTable,
    diags: &mut Diagnostics,
    head: SymbolId,
    base: SymbolId,
    body: &[u8],
) -> Result<(), Error> {
    let Some(atoms) = split(body) else {
        return Err(invalid(diags, body));
    };

    let mut queue: Vec<(SymbolId, Vec<Vec<u8>>)> = vec![(head, atoms)];
    while let Some((head, atoms)) = queue.pop() {
        let mut rule = builder.begin_rule(head);
        let mut i = 0;
        while i < atoms.len() {
            let atom = &atoms[i];
            let target = match atom[0] {
                b'(' => {
                    let mut nest = 1;
                    let mut inner = Vec::new();
                    i += 1;
                    while i < atoms.len() {
                        match atoms[i][0] {
                            b')' => {
                                nest -= 1;
                                if nest == 0 {
                                    break;
                                }
                            }
                            b'(' => nest += 1,
                            _ => {}
                        }
                        inner.push(atoms[i].clone());
                        i += 1;
                    }
                    if nest != 0 {
                        return Err(invalid(diags, body));
                    }
                    let group = builder.gensym_nonterminal(symbols, base);
                    queue.push((group, inner));
                    group
                }
                b'|' => {
                    rule = builder.begin_rule(head);
                    i += 1;
                    continue;
                }
                b'[' => {
                    let class = builder.gensym_nonterminal(symbols, base);
                    for byte in class_bytes(atom).iter() {
                        let terminal = builder.byte_terminal(symbols, byte as u8);
                        builder.pending.push((class, vec![terminal]));
                    }
                    class
                }
                b'.' => {
                    let any = builder.gensym_nonterminal(symbols, base);
                    for byte in 0..=255u8 {
                        let terminal = builder.byte_terminal(symbols, byte);
                        builder.pending.push((any, vec![terminal]));
                    }
                    any
                }
                _ => builder.byte_terminal(symbols, atom_byte(atom)),
            };
            i += 1;

            let mut mult = Multiplicity::new();
            while i < atoms.len() {
                match atoms[i][0] {
                    b'?' => mult.question(),
                    b'*' => mult.star(),
                    b'+' => mult.plus(),
                    b'{' => {
                        let (min, max) = parse_bounds(&atoms, &mut i).ok_or_else(|| {
                            invalid(diags, body)
                        })?;
                        mult.repeat(min, max);
                    }
                    _ => break,
                }
                i += 1;
            }
            if let Some(mult) = mult.finish() {
                builder.emit_element(symbols, rule, base, target, mult);
            }
        }
    }

    Ok(())
}

fn invalid(diags: &mut Diagnostics, body: &[u8]) -> Error {
    diags.error(format!(
        "invalid regexp /{}/",
        String::from_utf8_lossy(body)
    ));
    Error::Lexical
}

/// Split a regex body into atoms. `None` on a dangling escape or an
/// unterminated character class.
fn split(body: &[u8]) -> Option<Vec<Vec<u8>>> {
    let mut atoms = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let mut atom = Vec::new();
        match body[i] {
            b'[' => {
                atom.push(b'[');
                i += 1;
                if body.get(i) == Some(&b'^') {
                    atom.push(b'^');
                    i += 1;
                }
                // a `]` in the first content position is content
                if body.get(i) == Some(&b']') {
                    atom.push(b']');
                    i += 1;
                }
                let mut closed = false;
                while i < body.len() {
                    match body[i] {
                        b'\\' => {
                            atom.push(b'\\');
                            i += 1;
                            atom.push(*body.get(i)?);
                            i += 1;
                        }
                        b']' => {
                            atom.push(b']');
                            i += 1;
                            closed = true;
                            break;
                        }
                        byte => {
                            atom.push(byte);
                            i += 1;
                        }
                    }
                }
                if !closed {
                    return None;
                }
            }
            b'\\' => {
                atom.push(b'\\');
                i += 1;
                atom.push(*body.get(i)?);
                i += 1;
            }
            byte => {
                atom.push(byte);
                i += 1;
            }
        }
        atoms.push(atom);
    }
    Some(atoms)
}

/// Byte value of a literal or `\x` atom, with the class escape table.
fn atom_byte(atom: &[u8]) -> u8 {
    if atom[0] == b'\\' && atom.len() > 1 {
        match atom[1] {
            b'n' => 0x0A,
            b't' => 0x09,
            b'r' => 0x0D,
            other => other,
        }
    } else {
        atom[0]
    }
}

/// Evaluate a `[…]` atom into its byte set.
///
/// A leading `^` complements the set. A `-` between two bytes that are
/// not themselves part of an adjacent range denotes an inclusive range;
/// at either end of the class it is a literal.
fn class_bytes(atom: &[u8]) -> BitSet {
    let mut j = 1;
    let mut negated = false;
    if atom.get(j) == Some(&b'^') {
        negated = true;
        j += 1;
    }
    let content = &atom[j..atom.len() - 1];

    // resolve escapes into plain bytes first
    let mut bytes = Vec::with_capacity(content.len());
    let mut k = 0;
    while k < content.len() {
        if content[k] == b'\\' && k + 1 < content.len() {
            k += 1;
            bytes.push(match content[k] {
                b'n' => 0x0A,
                b't' => 0x09,
                b'r' => 0x0D,
                other => other,
            });
        } else {
            bytes.push(content[k]);
        }
        k += 1;
    }

    // mark range triples: 1 = endpoint, 2 = the dash itself
    let mut marks = vec![0u8; bytes.len()];
    for k in 1..bytes.len().saturating_sub(1) {
        if marks[k] == 0 && bytes[k] == b'-' {
            marks[k - 1] = 1;
            marks[k] = 2;
            marks[k + 1] = 1;
        }
    }

    let mut set = BitSet::with_capacity(256);
    for k in 0..bytes.len() {
        match marks[k] {
            0 => {
                set.insert(bytes[k] as usize);
            }
            2 => {
                for byte in bytes[k - 1]..=bytes[k + 1] {
                    set.insert(byte as usize);
                }
            }
            _ => {}
        }
    }

    if negated {
        let mut complement = BitSet::with_capacity(256);
        for byte in 0..256 {
            if !set.contains(byte) {
                complement.insert(byte);
            }
        }
        return complement;
    }
    set
}

/// Parse a `{m}` / `{m,n}` bound from the atom stream. On entry `i` is at
/// the `{` atom; on success it is left at the closing `}`.
fn parse_bounds(atoms: &[Vec<u8>], i: &mut usize) -> Option<(u32, u32)> {
    let mut min: Option<u32> = None;
    let mut max: Option<u32> = None;
    *i += 1;
    let mut closed = false;
    while *i < atoms.len() {
        let byte = atoms[*i][0];
        if byte == b'}' {
            closed = true;
            break;
        } else if byte.is_ascii_digit() {
            let digit = u32::from(byte - b'0');
            max = match max {
                None => Some(digit),
                // a zero-prefixed bound is malformed
                Some(0) => return None,
                Some(value) => Some(value.checked_mul(10)?.checked_add(digit)?),
            };
        } else if byte == b',' {
            if min.is_some() {
                return None;
            }
            min = max;
            max = None;
        }
        *i += 1;
    }
    if !closed {
        return None;
    }
    let max = max?;
    Some((min.unwrap_or(max), max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(body: &[u8]) -> Option<(RuleBuilder, SymbolTable)> {
        let mut builder = RuleBuilder::default();
        let mut symbols = SymbolTable::new();
        let mut diags = Diagnostics::new();
        let base = symbols.intern("R");
        let head = symbols.intern_regex(body);
        builder.nonterminals.insert(head);
        expand(&mut builder, &mut symbols, &mut diags, head, base, body).ok()?;
        Some((builder, symbols))
    }

    fn bodies_of(builder: &RuleBuilder, symbols: &SymbolTable, head: &str) -> Vec<Vec<String>> {
        let id = symbols.get(head).unwrap();
        builder
            .pending
            .iter()
            .filter(|(left, _)| *left == id)
            .map(|(_, right)| {
                right
                    .iter()
                    .map(|&s| symbols.name(s).to_owned())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn simple_class() {
        let (builder, symbols) = run(b"[a-c]").unwrap();
        let class = bodies_of(&builder, &symbols, "R[1]");
        assert_eq!(
            class,
            vec![vec!["'a'".to_owned()], vec!["'b'".to_owned()], vec!["'c'".to_owned()]]
        );
        // the regex head derives the class helper
        assert_eq!(
            bodies_of(&builder, &symbols, "/[a-c]/"),
            vec![vec!["R[1]".to_owned()]]
        );
        let a = symbols.get("'a'").unwrap();
        assert!(builder.terminals.contains(&a));
    }

    #[test]
    fn boundary_dash_is_literal() {
        let (builder, symbols) = run(b"[-a]").unwrap();
        let class = bodies_of(&builder, &symbols, "R[1]");
        assert_eq!(
            class,
            vec![vec!["'-'".to_owned()], vec!["'a'".to_owned()]]
        );
    }

    #[test]
    fn negated_class_covers_the_rest() {
        let (builder, symbols) = run(b"[^a]").unwrap();
        let class = bodies_of(&builder, &symbols, "R[1]");
        assert_eq!(class.len(), 255);
        assert!(!class.contains(&vec!["'a'".to_owned()]));
    }

    #[test]
    fn class_escapes() {
        let (builder, symbols) = run(b"[\\n\\t]").unwrap();
        let class = bodies_of(&builder, &symbols, "R[1]");
        assert_eq!(
            class,
            vec![vec!["0x09".to_owned()], vec!["0x0A".to_owned()]]
        );
    }

    #[test]
    fn alternation_and_groups() {
        let (builder, symbols) = run(b"a|(bc)").unwrap();
        let top = bodies_of(&builder, &symbols, "/a|(bc)/");
        assert_eq!(
            top,
            vec![vec!["'a'".to_owned()], vec!["R[1]".to_owned()]]
        );
        let group = bodies_of(&builder, &symbols, "R[1]");
        assert_eq!(group, vec![vec!["'b'".to_owned(), "'c'".to_owned()]]);
    }

    #[test]
    fn postfix_operators_apply() {
        let (builder, symbols) = run(b"a+").unwrap();
        let top = bodies_of(&builder, &symbols, "/a+/");
        assert_eq!(top, vec![vec!["'a'".to_owned(), "R[1]".to_owned()]]);
        let helper = bodies_of(&builder, &symbols, "R[1]");
        assert_eq!(
            helper,
            vec![vec!["'a'".to_owned(), "R[1]".to_owned()], vec![]]
        );
    }

    #[test]
    fn bounded_repetition() {
        let (builder, symbols) = run(b"a{2}").unwrap();
        let top = bodies_of(&builder, &symbols, "/a{2}/");
        assert_eq!(top, vec![vec!["R[1]".to_owned()]]);
        assert_eq!(
            bodies_of(&builder, &symbols, "R[1]"),
            vec![vec!["'a'".to_owned(), "'a'".to_owned(), "R[2]".to_owned()]]
        );
        assert_eq!(bodies_of(&builder, &symbols, "R[2]"), vec![Vec::<String>::new()]);
    }

    #[test]
    fn escape_maps_to_byte_terminal() {
        let (builder, symbols) = run(b"\\/\\n").unwrap();
        let top = bodies_of(&builder, &symbols, "/\\/\\n/");
        assert_eq!(top, vec![vec!["'/'".to_owned(), "0x0A".to_owned()]]);
    }

    #[test]
    fn malformed_bounds_are_rejected() {
        assert!(run(b"a{2,}").is_none());
        assert!(run(b"a{02}").is_none());
        assert!(run(b"a{2,3,4}").is_none());
        assert!(run(b"(ab").is_none());
    }

    #[test]
    fn any_byte_has_256_productions() {
        let (builder, symbols) = run(b".").unwrap();
        let class = bodies_of(&builder, &symbols, "R[1]");
        assert_eq!(class.len(), 256);
        assert_eq!(builder.terminals.len(), 256);
    }
}
