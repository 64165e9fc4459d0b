//! C code generation for the table-driven predictive parser.
//!
//! The generator consumes the finished analysis: the symbol tables, the
//! terminal/nonterminal inventories, the rule list and the parse table,
//! plus the distinguished symbols (`^`, `$`, `:@:` and the end-of-body
//! marker driving the runtime stack). It emits a header describing the
//! node-kind enumeration and the caller-supplied input interface, and a
//! source file holding the static tables and the pushdown loop.

use crate::symbols::SymbolId;
use crate::types::Map;
use crate::util::{byte_symbol_name, display_fn};
use crate::Analysis;
use crate::parse_table::Cell;
use std::fmt;

pub struct Codegen<'a> {
    analysis: &'a Analysis,
    /// `(symbol, enum name, grammar spelling)` in kind order: byte
    /// terminals by byte value, remaining terminals by name, then
    /// nonterminals by name.
    kinds: Vec<(SymbolId, String, String)>,
    kind_of: Map<SymbolId, usize>,
    terminal_count: usize,
}

impl<'a> Codegen<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        let symbols = &analysis.symbols;
        let grammar = &analysis.grammar;

        let mut kinds = Vec::new();
        let mut kind_of: Map<SymbolId, usize> = Map::default();
        let mut push = |kinds: &mut Vec<(SymbolId, String, String)>,
                        kind_of: &mut Map<SymbolId, usize>,
                        id: SymbolId,
                        name: String| {
            kind_of.insert(id, kinds.len());
            let spelling = symbols.name(id).to_owned();
            kinds.push((id, name, spelling));
        };

        for byte in 0..=255u8 {
            if let Some(id) = symbols.get(&byte_symbol_name(byte)) {
                if grammar.is_terminal(id) {
                    push(
                        &mut kinds,
                        &mut kind_of,
                        id,
                        format!("node_kind_char_0x{:02X}", byte),
                    );
                }
            }
        }
        let mut named: Vec<SymbolId> = grammar
            .terminals()
            .filter(|id| !kind_of.contains_key(id))
            .collect();
        named.sort_by(|&a, &b| symbols.name(a).cmp(symbols.name(b)));
        for (index, id) in named.into_iter().enumerate() {
            push(
                &mut kinds,
                &mut kind_of,
                id,
                format!("node_kind_term_{}", index),
            );
        }
        let terminal_count = kinds.len();

        let mut nonterminals: Vec<SymbolId> = grammar.nonterminals().collect();
        nonterminals.sort_by(|&a, &b| symbols.name(a).cmp(symbols.name(b)));
        for (index, id) in nonterminals.into_iter().enumerate() {
            push(
                &mut kinds,
                &mut kind_of,
                id,
                format!("node_kind_nonterm_{}", index),
            );
        }

        Self {
            analysis,
            kinds,
            kind_of,
            terminal_count,
        }
    }

    fn kind(&self, id: SymbolId) -> usize {
        self.kind_of[&id]
    }

    /// The generated header: node kinds, the tree type, the input
    /// interface the caller must provide, and the parse entry point.
    pub fn header(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            writeln!(f, "/* Generated by ll1. Do not edit. */")?;
            writeln!(f, "#ifndef LL1_PARSE_H_")?;
            writeln!(f, "#define LL1_PARSE_H_")?;
            writeln!(f)?;
            writeln!(f, "#include <stddef.h>")?;
            writeln!(f)?;
            writeln!(f, "typedef void *user_data_t;")?;
            writeln!(f)?;
            writeln!(f, "enum node_kind {{")?;
            for (index, (_, name, spelling)) in self.kinds.iter().enumerate() {
                writeln!(f, "  {} = {}, /* {} */", name, index, sanitize(spelling))?;
            }
            writeln!(f, "}};")?;
            writeln!(f)?;
            writeln!(f, "/* distinguished symbols */")?;
            writeln!(f, "#define LL1_KIND_EOI (-1)")?;
            writeln!(f, "#define LL1_KIND_INVALID (-2)")?;
            writeln!(f, "#define LL1_KIND_END_OF_BODY (-3)")?;
            let start = self.analysis.grammar.start();
            writeln!(
                f,
                "#define LL1_KIND_START {}",
                self.kinds[self.kind(start)].1
            )?;
            if let Some(marker) = self.analysis.symbols.get(":@:") {
                if let Some(&kind) = self.kind_of.get(&marker) {
                    writeln!(f, "#define LL1_KIND_MARKER {}", self.kinds[kind].1)?;
                }
            }
            writeln!(f)?;
            writeln!(f, "struct ll1_tree {{")?;
            writeln!(f, "  int kind;")?;
            writeln!(f, "  size_t child_count;")?;
            writeln!(f, "  struct ll1_tree **children;")?;
            writeln!(f, "}};")?;
            writeln!(f)?;
            writeln!(f, "#ifdef __cplusplus")?;
            writeln!(f, "extern \"C\" {{")?;
            writeln!(f, "#endif")?;
            writeln!(f)?;
            writeln!(f, "/* provided by the caller */")?;
            writeln!(f, "user_data_t input_initialize(void);")?;
            writeln!(f, "int input_getchar(user_data_t data);")?;
            writeln!(f)?;
            writeln!(f, "/* parser interface */")?;
            writeln!(f, "struct ll1_tree *ll1_parse(void);")?;
            writeln!(f, "void ll1_tree_free(struct ll1_tree *tree);")?;
            writeln!(f)?;
            writeln!(f, "#ifdef __cplusplus")?;
            writeln!(f, "}} /* extern \"C\" */")?;
            writeln!(f, "#endif")?;
            writeln!(f)?;
            writeln!(f, "#endif /* LL1_PARSE_H_ */")?;
            Ok(())
        })
    }

    /// The generated implementation: static tables plus the pushdown loop.
    pub fn source(&self, header_name: &str) -> impl fmt::Display + '_ {
        let header_name = header_name.to_owned();
        display_fn(move |f| {
            let grammar = &self.analysis.grammar;
            let table = &self.analysis.table;

            writeln!(f, "/* Generated by ll1. Do not edit. */")?;
            writeln!(f, "#include \"{}\"", header_name)?;
            writeln!(f)?;
            writeln!(f, "#include <stdlib.h>")?;
            writeln!(f)?;

            // byte → terminal kind
            writeln!(f, "static const int ll1_byte_kind[256] = {{")?;
            for row in 0..32 {
                write!(f, " ")?;
                for column in 0..8 {
                    let byte = (row * 8 + column) as u8;
                    let kind = self
                        .analysis
                        .symbols
                        .get(&byte_symbol_name(byte))
                        .filter(|id| grammar.is_terminal(*id))
                        .map(|id| self.kind(id) as i64)
                        .unwrap_or(-2);
                    write!(f, " {},", kind)?;
                }
                writeln!(f)?;
            }
            writeln!(f, "}};")?;
            writeln!(f)?;

            // rule table: left-hand kinds and concatenated bodies
            let num_rules = grammar.num_rules();
            writeln!(f, "#define LL1_NUM_RULES {}", num_rules)?;
            writeln!(f, "#define LL1_NUM_TERMS {}", self.terminal_count)?;
            writeln!(f)?;
            writeln!(f, "static const int ll1_rule_lhs[LL1_NUM_RULES] = {{")?;
            for (_, rule) in grammar.rules() {
                writeln!(f, "  {},", self.kind(rule.left()))?;
            }
            writeln!(f, "}};")?;
            writeln!(f)?;
            let mut offsets = Vec::with_capacity(num_rules + 1);
            let mut syms = Vec::new();
            for (_, rule) in grammar.rules() {
                offsets.push(syms.len());
                syms.extend(rule.right().iter().map(|&symbol| self.kind(symbol)));
            }
            offsets.push(syms.len());
            writeln!(f, "static const unsigned ll1_rule_off[LL1_NUM_RULES + 1] = {{")?;
            for chunk in offsets.chunks(16) {
                write!(f, " ")?;
                for offset in chunk {
                    write!(f, " {},", offset)?;
                }
                writeln!(f)?;
            }
            writeln!(f, "}};")?;
            writeln!(f)?;
            writeln!(f, "static const int ll1_rule_sym[{}] = {{", syms.len().max(1))?;
            if syms.is_empty() {
                writeln!(f, "  0,")?;
            } else {
                for chunk in syms.chunks(16) {
                    write!(f, " ")?;
                    for sym in chunk {
                        write!(f, " {},", sym)?;
                    }
                    writeln!(f)?;
                }
            }
            writeln!(f, "}};")?;
            writeln!(f)?;

            // parse table: rows in nonterminal kind order, the extra
            // column is the end-of-input lookahead
            let nonterminal_rows: Vec<SymbolId> = self.kinds[self.terminal_count..]
                .iter()
                .map(|(id, _, _)| *id)
                .collect();
            writeln!(
                f,
                "static const int ll1_table[{}][LL1_NUM_TERMS + 1] = {{",
                nonterminal_rows.len()
            )?;
            for &nt in &nonterminal_rows {
                write!(f, "  {{")?;
                for (terminal, _, _) in &self.kinds[..self.terminal_count] {
                    write!(f, " {},", cell_value(table.get(nt, *terminal)))?;
                }
                write!(f, " {},", cell_value(table.get(nt, SymbolId::EOI)))?;
                writeln!(f, " }},")?;
            }
            writeln!(f, "}};")?;
            writeln!(f)?;

            // the pushdown driver
            writeln!(f, "{}", DRIVER)?;
            Ok(())
        })
    }
}

fn cell_value(cell: Cell) -> i64 {
    match cell {
        Cell::Rule(rule) => rule.index() as i64,
        Cell::Empty | Cell::Conflict => -1,
    }
}

/// Keep generated comments from closing themselves.
fn sanitize(spelling: &str) -> String {
    spelling.replace("*/", "*\\/")
}

const DRIVER: &str = r#"static int ll1_next_kind(user_data_t data) {
  int ch = input_getchar(data);
  if (ch < 0) {
    return LL1_KIND_EOI;
  }
  return ll1_byte_kind[ch & 0xFF];
}

static struct ll1_tree *ll1_node_new(int kind) {
  struct ll1_tree *node = (struct ll1_tree *)malloc(sizeof(struct ll1_tree));
  if (node == NULL) {
    return NULL;
  }
  node->kind = kind;
  node->child_count = 0;
  node->children = NULL;
  return node;
}

static int ll1_node_append(struct ll1_tree *parent, struct ll1_tree *child) {
  struct ll1_tree **grown = (struct ll1_tree **)realloc(
      parent->children, (parent->child_count + 1) * sizeof(struct ll1_tree *));
  if (grown == NULL) {
    return -1;
  }
  grown[parent->child_count] = child;
  parent->children = grown;
  parent->child_count += 1;
  return 0;
}

void ll1_tree_free(struct ll1_tree *tree) {
  size_t i;
  if (tree == NULL) {
    return;
  }
  for (i = 0; i < tree->child_count; ++i) {
    ll1_tree_free(tree->children[i]);
  }
  free(tree->children);
  free(tree);
}

struct ll1_tree *ll1_parse(void) {
  user_data_t data = input_initialize();
  struct ll1_tree *holder = ll1_node_new(LL1_KIND_INVALID);
  struct ll1_tree **parents = NULL;
  int *stack = NULL;
  size_t parents_len = 0, parents_cap = 0;
  size_t stack_len = 0, stack_cap = 0;
  int lookahead;

#define LL1_PUSH(vec, len, cap, value, type)                                  \
  do {                                                                        \
    if ((len) == (cap)) {                                                     \
      size_t next_cap = (cap) == 0 ? 16 : (cap)*2;                            \
      void *grown = realloc((vec), next_cap * sizeof(type));                  \
      if (grown == NULL) {                                                    \
        goto fail;                                                            \
      }                                                                       \
      (vec) = (type *)grown;                                                  \
      (cap) = next_cap;                                                       \
    }                                                                         \
    (vec)[(len)++] = (value);                                                 \
  } while (0)

  if (holder == NULL) {
    return NULL;
  }
  LL1_PUSH(parents, parents_len, parents_cap, holder, struct ll1_tree *);
  LL1_PUSH(stack, stack_len, stack_cap, LL1_KIND_START, int);
  lookahead = ll1_next_kind(data);

  while (stack_len > 0) {
    int top = stack[--stack_len];
    if (top == LL1_KIND_END_OF_BODY) {
      parents_len -= 1;
      continue;
    }
    if (top < LL1_NUM_TERMS) {
      struct ll1_tree *leaf;
      if (top != lookahead) {
        goto fail;
      }
      leaf = ll1_node_new(top);
      if (leaf == NULL ||
          ll1_node_append(parents[parents_len - 1], leaf) != 0) {
        ll1_tree_free(leaf);
        goto fail;
      }
      lookahead = ll1_next_kind(data);
    } else {
      struct ll1_tree *node;
      int column = lookahead == LL1_KIND_EOI ? LL1_NUM_TERMS : lookahead;
      int rule;
      unsigned i, begin, end;
      if (column < 0) {
        goto fail;
      }
      rule = ll1_table[top - LL1_NUM_TERMS][column];
      if (rule < 0) {
        goto fail;
      }
      node = ll1_node_new(top);
      if (node == NULL ||
          ll1_node_append(parents[parents_len - 1], node) != 0) {
        ll1_tree_free(node);
        goto fail;
      }
      LL1_PUSH(stack, stack_len, stack_cap, LL1_KIND_END_OF_BODY, int);
      begin = ll1_rule_off[rule];
      end = ll1_rule_off[rule + 1];
      for (i = end; i > begin; --i) {
        LL1_PUSH(stack, stack_len, stack_cap, ll1_rule_sym[i - 1], int);
      }
      LL1_PUSH(parents, parents_len, parents_cap, node, struct ll1_tree *);
    }
  }

  if (lookahead == LL1_KIND_EOI && holder->child_count == 1) {
    struct ll1_tree *root = holder->children[0];
    free(holder->children);
    free(holder);
    free(parents);
    free(stack);
    return root;
  }

fail:
  ll1_tree_free(holder);
  free(parents);
  free(stack);
  return NULL;

#undef LL1_PUSH
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::{analyze, Options};

    fn generate(source: &str) -> (String, String) {
        let mut diags = Diagnostics::new();
        let analysis = analyze(source.as_bytes(), Options::default(), &mut diags).unwrap();
        assert!(analysis.is_ll1());
        let codegen = Codegen::new(&analysis);
        let header = codegen.header().to_string();
        let source = codegen.source("ll1_parse.h").to_string();
        (header, source)
    }

    #[test]
    fn header_lists_kinds_in_order() {
        let (header, _) = generate("S = 'a' 'b' ;");
        let a = header.find("node_kind_char_0x61").unwrap();
        let b = header.find("node_kind_char_0x62").unwrap();
        assert!(a < b);
        assert!(header.contains("#define LL1_KIND_START"));
        assert!(header.contains("#define LL1_KIND_MARKER"));
        assert!(header.contains("struct ll1_tree *ll1_parse(void);"));
    }

    #[test]
    fn named_terminals_are_sorted() {
        let (header, _) = generate("S = 'x' ; % beta alpha ;");
        assert!(header
            .lines()
            .any(|line| line.contains("node_kind_term_0") && line.ends_with("/* alpha */")));
        assert!(header
            .lines()
            .any(|line| line.contains("node_kind_term_1") && line.ends_with("/* beta */")));
    }

    #[test]
    fn source_holds_the_tables_and_driver() {
        let (_, source) = generate("S = 'a' ? 'b' ;");
        assert!(source.contains("static const int ll1_byte_kind[256]"));
        assert!(source.contains("static const int ll1_rule_lhs"));
        assert!(source.contains("static const int ll1_table"));
        assert!(source.contains("struct ll1_tree *ll1_parse(void)"));
        assert!(source.contains("LL1_KIND_END_OF_BODY"));
    }
}
