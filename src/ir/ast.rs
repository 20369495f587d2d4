//! Language-independent syntax tree.
//!
//! Every adapter emits this shape. Nodes own their children outright; there
//! are no parent pointers. Node ids are assigned in pre-order, so the ids of a
//! subtree form the contiguous range `id..=last_descendant`, which is what
//! [`Ast::get`] and [`Ast::ancestors`] descend on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Pre-order index of a node within its file's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Source span, 1-indexed lines and columns (columns count bytes), plus the
/// byte range it covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    /// Span covering an entire file.
    pub fn whole(source: &str) -> Self {
        let last_newline = source.rfind('\n');
        let rows = source.bytes().filter(|&b| b == b'\n').count();
        let tail = match last_newline {
            Some(pos) => source.len() - pos - 1,
            None => source.len(),
        };
        Self {
            start_line: 1,
            start_column: 1,
            end_line: rows + 1,
            end_column: tail + 1,
            start_byte: 0,
            end_byte: source.len(),
        }
    }

    pub fn contains(&self, other: &Span) -> bool {
        (self.start_line, self.start_column) <= (other.start_line, other.start_column)
            && (other.end_line, other.end_column) <= (self.end_line, self.end_column)
    }

    /// Whether this span ends before `other` starts.
    pub fn precedes(&self, other: &Span) -> bool {
        self.end_byte <= other.start_byte
    }
}

/// Closed set of node kinds, grouped by syntactic category, with an open
/// fallback for native kinds the model does not name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Program,

    // Declarations
    FunctionDecl,
    ClassDecl,
    VariableDecl,
    VariableDeclarator,
    Parameter,
    Import,

    // Statements
    Block,
    ExpressionStatement,
    Return,
    If,
    Loop,
    Try,

    // Expressions
    Call,
    New,
    Member,
    Subscript,
    Identifier,
    StringLiteral,
    TemplateString,
    RegexLiteral,
    NumberLiteral,
    BooleanLiteral,
    NullLiteral,
    ObjectLiteral,
    Property,
    ArrayLiteral,
    Arguments,
    Assignment,
    Binary,
    Unary,
    Conditional,
    FunctionExpr,

    /// Error-recovery marker: a region the grammar could not parse, or a
    /// token the parser had to assume.
    Error,

    /// Native kind with no unified counterpart.
    Unmodeled(String),
}

impl NodeKind {
    /// Kinds whose children are never lowered.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::Identifier
                | Self::StringLiteral
                | Self::RegexLiteral
                | Self::NumberLiteral
                | Self::BooleanLiteral
                | Self::NullLiteral
        )
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::FunctionDecl | Self::FunctionExpr)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::StringLiteral
                | Self::RegexLiteral
                | Self::NumberLiteral
                | Self::BooleanLiteral
                | Self::NullLiteral
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call | Self::New)
    }
}

/// Role a node plays inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Callee,
    Arguments,
    Object,
    Property,
    Key,
    Value,
    Left,
    Right,
    Name,
    Body,
    Params,
    Condition,
    Consequence,
    Alternative,
    Index,
    Source,
    Operand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub role: Option<Role>,
    pub span: Span,
    /// Language-specific attributes rules need: `name`, `value`, `callee`,
    /// `method`, `path`, `key`, `operator`, `source`.
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<AstNode>,
    /// Highest id inside this subtree.
    pub last_descendant: NodeId,
}

impl AstNode {
    pub fn new(id: NodeId, kind: NodeKind, span: Span) -> Self {
        Self {
            id,
            kind,
            role: None,
            span,
            attrs: BTreeMap::new(),
            children: Vec::new(),
            last_descendant: id,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.attr("name")
    }

    pub fn is(&self, kind: &NodeKind) -> bool {
        &self.kind == kind
    }

    /// First child playing `role`.
    pub fn child(&self, role: Role) -> Option<&AstNode> {
        self.children.iter().find(|c| c.role == Some(role))
    }

    /// Positional arguments of a call (empty for anything else).
    pub fn args(&self) -> Vec<&AstNode> {
        self.child(Role::Arguments)
            .map(|a| a.children.iter().collect())
            .unwrap_or_default()
    }

    pub fn owns(&self, id: NodeId) -> bool {
        self.id <= id && id <= self.last_descendant
    }

    /// Descendant (or self) with the given id.
    pub fn find(&self, id: NodeId) -> Option<&AstNode> {
        let mut current = self;
        if !current.owns(id) {
            return None;
        }
        loop {
            if current.id == id {
                return Some(current);
            }
            current = current.children.iter().find(|c| c.owns(id))?;
        }
    }

    /// Pre-order depth-first iterator over this subtree.
    pub fn walk(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Dotted access path (`window.open`, `req.query.name`) when the node is
    /// an identifier or a chain of static member accesses.
    pub fn dotted_path(&self) -> Option<String> {
        match self.kind {
            NodeKind::Identifier => self.name().map(str::to_string),
            NodeKind::Member => {
                if let Some(path) = self.attr("path") {
                    return Some(path.to_string());
                }
                let object = self.child(Role::Object)?.dotted_path()?;
                let property = self.child(Role::Property)?.name()?;
                Some(format!("{object}.{property}"))
            }
            _ => None,
        }
    }
}

/// Iterative pre-order traversal; safe on arbitrarily deep trees.
pub struct PreOrder<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A file's tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ast {
    pub language: super::Language,
    pub root: AstNode,
}

impl Ast {
    pub fn new(language: super::Language, root: AstNode) -> Self {
        Self { language, root }
    }

    pub fn len(&self) -> usize {
        self.root.last_descendant.0 + 1
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&AstNode> {
        self.root.find(id)
    }

    /// Ancestors of `id`, root first, excluding the node itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<&AstNode> {
        let mut chain = Vec::new();
        let mut current = &self.root;
        if !current.owns(id) {
            return chain;
        }
        while current.id != id {
            chain.push(current);
            match current.children.iter().find(|c| c.owns(id)) {
                Some(next) => current = next,
                None => break,
            }
        }
        chain
    }

    pub fn parent(&self, id: NodeId) -> Option<&AstNode> {
        self.ancestors(id).pop()
    }

    pub fn walk(&self) -> PreOrder<'_> {
        self.root.walk()
    }

    pub fn nodes_of_kind(&self, kind: &NodeKind) -> Vec<&AstNode> {
        self.walk().filter(|n| n.is(kind)).collect()
    }

    /// Innermost function enclosing `id`, if any.
    pub fn enclosing_function(&self, id: NodeId) -> Option<&AstNode> {
        self.ancestors(id)
            .into_iter()
            .rev()
            .find(|n| n.kind.is_function())
    }

    /// Innermost function body enclosing `id`, falling back to the program.
    pub fn enclosing_body(&self, id: NodeId) -> &AstNode {
        self.enclosing_function(id).unwrap_or(&self.root)
    }

    pub fn error_nodes(&self) -> Vec<&AstNode> {
        self.nodes_of_kind(&NodeKind::Error)
    }
}
