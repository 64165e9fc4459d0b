//! Concrete syntax tree of a parsed grammar source.
//!
//! The tree is arena-allocated: nodes live in one `Vec` and refer to each
//! other by index, so parent links cost nothing to keep.

use super::lexer::Token;
use std::ops::Index;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct NodeId {
    raw: u32,
}

impl NodeId {
    pub const ROOT: Self = Self { raw: 0 };

    fn new(raw: usize) -> Self {
        Self { raw: raw as u32 }
    }

    fn index(self) -> usize {
        self.raw as usize
    }
}

/// Nonterminals of the meta-grammar, used as node tags.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MetaSym {
    Root,
    Input,
    Syntax,
    /// One `id = …;` or `% …;` statement.
    Def,
    BodyList,
    BodyListRest,
    BodyInternal,
    Body,
    BodyOpt,
    BodyOptItem,
    Range,
    RangeRest,
    IdList,
    CommaOpt,
    IdOrRegexp,
    NumberOpt,
}

impl MetaSym {
    /// Spelling used when dumping the parse stack in diagnostics.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Root => "^",
            Self::Input => "input",
            Self::Syntax => "syntax",
            Self::Def => "syntax~",
            Self::BodyList => "body-list",
            Self::BodyListRest => "body-list~",
            Self::BodyInternal => "body-internal",
            Self::Body => "body",
            Self::BodyOpt => "body-opt",
            Self::BodyOptItem => "body-opt~",
            Self::Range => "range",
            Self::RangeRest => "range~",
            Self::IdList => "id~",
            Self::CommaOpt => "comma~",
            Self::IdOrRegexp => "id-or-regexp",
            Self::NumberOpt => "number~",
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Meta(MetaSym),
    Leaf(Token),
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn token(&self) -> Option<Token> {
        match self.kind {
            NodeKind::Leaf(token) => Some(token),
            NodeKind::Meta(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Meta(MetaSym::Root),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    /// The `i`-th child. Panics if absent; callers index shapes the parser
    /// guarantees.
    pub fn child(&self, id: NodeId, i: usize) -> NodeId {
        self[id].children[i]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    pub fn is_empty_node(&self, id: NodeId) -> bool {
        self[id].children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for SyntaxTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<NodeId> for SyntaxTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}
