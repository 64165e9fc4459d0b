//! Human-readable rendering of the parse table.
//!
//! Columns are the nonterminals in insertion order; rows are the
//! terminals plus `$`, sorted by name. `-` marks an empty cell, `*` a
//! conflict. The width-limited mode re-flows the columns into groups
//! that fit within 100 display columns.

use ll1::parse_table::Cell;
use ll1::symbols::SymbolId;
use ll1::Analysis;
use std::fmt::Write as _;

const MAX_WIDTH: usize = 100;
const INDENT: &str = "  ";

pub fn render_table(analysis: &Analysis, width_limited: bool) -> String {
    let symbols = &analysis.symbols;
    let grammar = &analysis.grammar;
    let table = &analysis.table;

    // header row: one column per nonterminal
    let columns: Vec<SymbolId> = grammar.nonterminals().collect();
    let mut cells: Vec<Vec<String>> = Vec::new();
    let mut header = vec![String::new()];
    header.extend(columns.iter().map(|&nt| symbols.name(nt).to_owned()));
    cells.push(header);

    // one row per terminal, sorted by name, with `$` included
    let mut terminals: Vec<SymbolId> = grammar.terminals().chain([SymbolId::EOI]).collect();
    terminals.sort_by(|&a, &b| symbols.name(a).cmp(symbols.name(b)));
    for &terminal in &terminals {
        let mut row = vec![symbols.name(terminal).to_owned()];
        for &nt in &columns {
            row.push(match table.get(nt, terminal) {
                Cell::Empty => "-".to_owned(),
                Cell::Conflict => "*".to_owned(),
                Cell::Rule(rule) => rule.to_string(),
            });
        }
        cells.push(row);
    }

    let num_columns = cells[0].len();
    let mut widths = vec![0usize; num_columns];
    for row in &cells {
        for (column, text) in row.iter().enumerate() {
            widths[column] = widths[column].max(text.len());
        }
    }

    let mut out = String::new();
    if !width_limited {
        let _ = writeln!(out, "table:");
        for row in &cells {
            render_row(&mut out, row, &widths, 0, num_columns - 1);
        }
        return out;
    }

    // chunk the data columns into groups fitting the width budget
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut current = 1;
    while current < num_columns {
        let mut total = INDENT.len() + widths[0];
        let first = current;
        let mut last = current;
        for column in first..num_columns {
            let additional = 1 + widths[column];
            if total + additional < MAX_WIDTH {
                total += additional;
                last = column;
            } else {
                break;
            }
        }
        groups.push((first, last));
        current = last + 1;
    }

    if groups.len() <= 1 {
        let _ = writeln!(out, "table:");
        for row in &cells {
            render_row(&mut out, row, &widths, 0, num_columns - 1);
        }
        return out;
    }

    for (index, &(first, last)) in groups.iter().enumerate() {
        if index > 0 {
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "table ({}/{}):", index + 1, groups.len());
        for row in &cells {
            render_row(&mut out, row, &widths, first, last);
        }
    }
    out
}

fn render_row(out: &mut String, row: &[String], widths: &[usize], first: usize, last: usize) {
    out.push_str(INDENT);
    out.push_str(&pad(&row[0], widths[0]));
    for column in first.max(1)..=last {
        out.push(' ');
        out.push_str(&pad(&row[column], widths[column]));
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out.push('\n');
}

/// Center `text` in a cell of the given width.
fn pad(text: &str, width: usize) -> String {
    let margin = width - text.len();
    let mut right = margin / 2;
    let mut left = margin - right;
    if width % 2 == 1 && margin % 2 == 1 {
        right += 1;
        left -= 1;
    }
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}
