//! Symbol interning.

use crate::types::Map;
use indexmap::IndexSet;
use std::fmt;

/// Identifier of an interned lexeme string.
///
/// Every terminal literal, nonterminal name, regex literal and generated
/// helper name is interned to a dense id. Ids are stable for the lifetime
/// of one analysis run.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolId {
    raw: u32,
}

impl SymbolId {
    /// Reserved marker meaning "derives the empty string" inside FIRST sets.
    pub const EPSILON: Self = Self::new(0);
    /// Reserved terminal symbol for the end of input.
    pub const EOI: Self = Self::new(1);

    #[inline]
    const fn new(raw: u32) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.raw
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EPSILON => write!(f, "<epsilon>"),
            &Self::EOI => write!(f, "$"),
            Self { raw } => write!(f, "SymbolId({})", raw),
        }
    }
}

/// Two-way map between lexeme strings and [`SymbolId`]s.
///
/// Interning is idempotent: the same string always maps to the same id and
/// distinct strings map to distinct ids. There is no deletion.
#[derive(Debug)]
pub struct SymbolTable {
    names: IndexSet<String, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>,
    regex_bodies: Map<SymbolId, Vec<u8>>,
    gensym_count: u32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let mut table = Self {
            names: IndexSet::default(),
            regex_bodies: Map::default(),
            gensym_count: 0,
        };
        // Seed the reserved ids so that EPSILON and EOI hold everywhere.
        let eps = table.intern("<epsilon>");
        debug_assert_eq!(eps, SymbolId::EPSILON);
        let eoi = table.intern("$");
        debug_assert_eq!(eoi, SymbolId::EOI);
        table
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, assigning the next free id on first sight.
    pub fn intern(&mut self, name: impl AsRef<str>) -> SymbolId {
        let (index, _) = self.names.insert_full(name.as_ref().to_owned());
        SymbolId::new(index as u32)
    }

    /// Intern a regex literal `/body/` and record its inner text.
    ///
    /// The body is kept as raw bytes; the grammar encoding is 8-bit and a
    /// class such as `[\x80-\xFF]` is evaluated on bytes, not characters.
    pub fn intern_regex(&mut self, body: &[u8]) -> SymbolId {
        let id = self.intern(format!("/{}/", String::from_utf8_lossy(body)));
        self.regex_bodies.insert(id, body.to_owned());
        id
    }

    /// Return a fresh id whose name embeds `base` and a per-run counter.
    ///
    /// The bracketed suffix cannot appear in any user-written lexeme, so
    /// generated names never collide with user names.
    pub fn gensym(&mut self, base: SymbolId) -> SymbolId {
        self.gensym_count += 1;
        let name = format!("{}[{}]", self.name(base), self.gensym_count);
        self.intern(name)
    }

    pub fn name(&self, id: SymbolId) -> &str {
        self.names
            .get_index(id.raw() as usize)
            .expect("unknown symbol id")
    }

    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.names.get_index_of(name).map(|i| SymbolId::new(i as u32))
    }

    pub fn regex_body(&self, id: SymbolId) -> Option<&[u8]> {
        self.regex_bodies.get(&id).map(|s| s.as_slice())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern("foo");
        let b = table.intern("bar");
        assert_ne!(a, b);
        assert_eq!(table.intern("foo"), a);
        assert_eq!(table.name(a), "foo");
        assert_eq!(table.get("bar"), Some(b));
        assert_eq!(table.get("baz"), None);
    }

    #[test]
    fn reserved_ids() {
        let mut table = SymbolTable::new();
        assert_eq!(table.intern("<epsilon>"), SymbolId::EPSILON);
        assert_eq!(table.intern("$"), SymbolId::EOI);
    }

    #[test]
    fn regex_bodies_are_recorded() {
        let mut table = SymbolTable::new();
        let id = table.intern_regex(b"[a-c]");
        assert_eq!(table.name(id), "/[a-c]/");
        assert_eq!(table.regex_body(id), Some(&b"[a-c]"[..]));
        assert_eq!(table.intern("/[a-c]/"), id);
    }

    #[test]
    fn gensym_is_fresh() {
        let mut table = SymbolTable::new();
        let base = table.intern("expr");
        let g1 = table.gensym(base);
        let g2 = table.gensym(base);
        assert_ne!(g1, g2);
        assert_eq!(table.name(g1), "expr[1]");
        assert_eq!(table.name(g2), "expr[2]");
    }
}
