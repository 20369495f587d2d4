//! Lowering from tree-sitter trees into the unified AST.
//!
//! The walk is shared by every adapter; a [`Grammar`] only says how its native
//! node kinds map onto [`NodeKind`] and how its literals are spelled.

use tree_sitter::{Node, Tree};

use crate::error::ParseError;
use crate::ir::{AstNode, Language, NodeId, NodeKind, Role, Span};

/// What to do with one native node.
pub(crate) enum Lowering {
    /// Drop the node and its subtree (comments).
    Skip,
    /// Replace the node by its first named child (parentheses, type casts).
    Transparent,
    Node(NodeKind),
}

pub(crate) trait Grammar: Send + Sync {
    fn language(&self) -> Language;

    /// Map a native node onto a unified kind. `parent` is the native kind of
    /// the enclosing node.
    fn classify(&self, node: Node<'_>, parent: &str) -> Lowering;

    /// Decoded value of a string literal, or `None` when it is not constant.
    fn string_value(&self, raw: &str) -> Option<String>;

    fn role(&self, parent: &NodeKind, field: &str) -> Option<Role> {
        generic_role(parent, field)
    }

    /// Grammar-specific attributes, applied after the generic ones.
    fn decorate(&self, _node: &mut AstNode, _native: Node<'_>, _src: &str) {}
}

/// Roles implied by tree-sitter field names shared across grammars.
pub(crate) fn generic_role(parent: &NodeKind, field: &str) -> Option<Role> {
    let role = match field {
        "function" | "constructor" => Role::Callee,
        "type" if *parent == NodeKind::New => Role::Callee,
        "arguments" => Role::Arguments,
        "object" | "array" => Role::Object,
        "value" if *parent == NodeKind::Subscript => Role::Object,
        "value" => Role::Value,
        "property" | "attribute" | "field" => Role::Property,
        "key" => Role::Key,
        "name" if *parent == NodeKind::Property => Role::Key,
        "name" | "pattern" | "alias" => Role::Name,
        "left" => Role::Left,
        "right" => Role::Right,
        "body" => Role::Body,
        "parameters" | "parameter" => Role::Params,
        "condition" => Role::Condition,
        "consequence" => Role::Consequence,
        "alternative" => Role::Alternative,
        "index" | "subscript" => Role::Index,
        "source" | "module_name" => Role::Source,
        "argument" => Role::Operand,
        _ => return None,
    };
    Some(role)
}

pub(crate) fn span_of(node: Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start_line: start.row + 1,
        start_column: start.column + 1,
        end_line: end.row + 1,
        end_column: end.column + 1,
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    }
}

pub(crate) fn node_text<'a>(node: Node<'_>, src: &'a str) -> &'a str {
    src.get(node.byte_range()).unwrap_or("")
}

/// Lower a parsed tree. Returns the `Program` root and the spans of every
/// syntax error the parser recovered from.
pub(crate) fn lower<G: Grammar + ?Sized>(
    grammar: &G,
    tree: &Tree,
    src: &str,
    max_depth: usize,
) -> Result<(AstNode, Vec<Span>), ParseError> {
    let native = tree.root_node();
    let mut lowerer = Lowerer {
        grammar,
        src,
        max_depth,
        next_id: 1,
    };

    let mut root = AstNode::new(NodeId(0), NodeKind::Program, Span::whole(src));
    root.children = lowerer.children(native, &NodeKind::Program, 1)?;
    root.last_descendant = NodeId(lowerer.next_id - 1);

    Ok((root, syntax_errors(native)))
}

struct Lowerer<'a, G: ?Sized> {
    grammar: &'a G,
    src: &'a str,
    max_depth: usize,
    next_id: usize,
}

impl<G: Grammar + ?Sized> Lowerer<'_, G> {
    fn children(
        &mut self,
        native: Node<'_>,
        parent: &NodeKind,
        depth: usize,
    ) -> Result<Vec<AstNode>, ParseError> {
        let mut out = Vec::new();
        let mut cursor = native.walk();
        if !cursor.goto_first_child() {
            return Ok(out);
        }
        loop {
            let child = cursor.node();
            if child.is_named() || child.is_missing() {
                let field = cursor.field_name();
                if let Some(lowered) = self.node(child, native.kind(), parent, field, depth)? {
                    out.push(lowered);
                }
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        Ok(out)
    }

    fn node(
        &mut self,
        native: Node<'_>,
        parent_native: &str,
        parent: &NodeKind,
        field: Option<&str>,
        depth: usize,
    ) -> Result<Option<AstNode>, ParseError> {
        if depth > self.max_depth {
            return Err(ParseError::DepthExceeded {
                limit: self.max_depth,
                offset: native.start_byte(),
            });
        }

        let kind = if native.is_error() || native.is_missing() {
            NodeKind::Error
        } else {
            match self.grammar.classify(native, parent_native) {
                Lowering::Skip => return Ok(None),
                Lowering::Transparent => {
                    return match self.first_lowerable(native) {
                        Some(inner) => self.node(inner, parent_native, parent, field, depth + 1),
                        None => Ok(None),
                    };
                }
                Lowering::Node(kind) => kind,
            }
        };

        let id = NodeId(self.next_id);
        self.next_id += 1;
        let mut node = AstNode::new(id, kind, span_of(native));
        node.role = field.and_then(|f| self.grammar.role(parent, f));
        if node.kind == NodeKind::Identifier && node.role == Some(Role::Params) {
            node.kind = NodeKind::Parameter;
        }

        if !node.kind.is_leaf() {
            node.children = self.children(native, &node.kind, depth + 1)?;
        }
        node.last_descendant = NodeId(self.next_id - 1);

        self.attributes(&mut node, native);
        self.grammar.decorate(&mut node, native, self.src);
        Ok(Some(node))
    }

    fn first_lowerable<'t>(&self, native: Node<'t>) -> Option<Node<'t>> {
        let mut cursor = native.walk();
        let found = native
            .named_children(&mut cursor)
            .find(|c| !matches!(self.grammar.classify(*c, native.kind()), Lowering::Skip));
        found
    }

    fn attributes(&self, node: &mut AstNode, native: Node<'_>) {
        let text = node_text(native, self.src);
        match node.kind {
            NodeKind::Identifier => node.set_attr("name", text),
            NodeKind::Parameter => {
                if let Some(name) = parameter_name(native, self.src) {
                    node.set_attr("name", name);
                }
            }
            NodeKind::StringLiteral => {
                if let Some(value) = self.grammar.string_value(text) {
                    node.set_attr("value", value);
                }
            }
            NodeKind::NumberLiteral | NodeKind::BooleanLiteral | NodeKind::NullLiteral => {
                node.set_attr("value", text)
            }
            NodeKind::RegexLiteral => {
                if let Some(pattern) = native.child_by_field_name("pattern") {
                    node.set_attr("pattern", node_text(pattern, self.src));
                }
            }
            NodeKind::Member => {
                if let Some(property) = node.child(Role::Property).and_then(AstNode::name) {
                    let property = property.to_string();
                    node.set_attr("property", property);
                }
                if let Some(path) = node.dotted_path() {
                    node.set_attr("path", path);
                }
            }
            NodeKind::Call | NodeKind::New => self.call_attributes(node),
            NodeKind::Binary | NodeKind::Unary | NodeKind::Assignment => {
                if let Some(op) = native.child_by_field_name("operator") {
                    node.set_attr("operator", node_text(op, self.src));
                } else if node.kind == NodeKind::Assignment {
                    node.set_attr("operator", "=");
                }
            }
            NodeKind::Property => {
                let key = node.child(Role::Key).and_then(|k| match k.kind {
                    NodeKind::Identifier => k.name(),
                    _ => k.attr("value"),
                });
                if let Some(key) = key {
                    let key = key.to_string();
                    node.set_attr("key", key);
                }
            }
            NodeKind::VariableDeclarator | NodeKind::FunctionDecl | NodeKind::ClassDecl => {
                if let Some(name) = node.child(Role::Name).and_then(AstNode::name) {
                    let name = name.to_string();
                    node.set_attr("name", name);
                }
            }
            NodeKind::Import => {
                let source = match node.child(Role::Source) {
                    Some(s) => s
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| self.slice(&s.span).to_string()),
                    None => node
                        .children
                        .first()
                        .map(|c| self.slice(&c.span).to_string())
                        .unwrap_or_default(),
                };
                let source = source.split(" as ").next().unwrap_or("").trim().to_string();
                if !source.is_empty() {
                    node.set_attr("source", source);
                }
            }
            _ => {}
        }
    }

    /// `callee` is the dotted path of the called expression when it is
    /// static; `method` is its last segment.
    fn call_attributes(&self, node: &mut AstNode) {
        let (callee, method) = if let Some(target) = node.child(Role::Callee) {
            let callee = target.dotted_path().or_else(|| {
                (node.kind == NodeKind::New).then(|| self.slice(&target.span).trim().to_string())
            });
            let method = match target.kind {
                NodeKind::Member => target.attr("property").map(str::to_string),
                NodeKind::Identifier => target.name().map(str::to_string),
                _ => None,
            };
            (callee, method)
        } else if let Some(name) = node.child(Role::Name).and_then(AstNode::name) {
            // Receiver and method name as separate fields (Java).
            let callee = match node.child(Role::Object) {
                Some(object) => object.dotted_path().map(|p| format!("{p}.{name}")),
                None => Some(name.to_string()),
            };
            (callee, Some(name.to_string()))
        } else {
            (None, None)
        };

        if let Some(callee) = callee {
            node.set_attr("callee", callee);
        }
        if let Some(method) = method {
            node.set_attr("method", method);
        }
    }

    fn slice(&self, span: &Span) -> &str {
        self.src.get(span.start_byte..span.end_byte).unwrap_or("")
    }
}

/// Name bound by a parameter node, whatever shape the grammar gives it.
fn parameter_name(native: Node<'_>, src: &str) -> Option<String> {
    if native.named_child_count() == 0 {
        return Some(node_text(native, src).to_string());
    }
    for field in ["name", "pattern", "left"] {
        if let Some(target) = native.child_by_field_name(field) {
            if target.kind() == "identifier" {
                return Some(node_text(target, src).to_string());
            }
        }
    }
    let mut cursor = native.walk();
    let found = native
        .named_children(&mut cursor)
        .find(|c| c.kind() == "identifier")
        .map(|c| node_text(c, src).to_string());
    found
}

/// Spans of every `ERROR` and `MISSING` node, in source order.
pub(crate) fn syntax_errors(root: Node<'_>) -> Vec<Span> {
    let mut errors = Vec::new();
    if !root.has_error() {
        return errors;
    }
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            errors.push(span_of(node));
            continue;
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    errors.sort();
    errors
}

/// Decode backslash escapes shared by the C-family string syntaxes.
pub(crate) fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\n') => {}
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code(&mut out, &hex, "\\x");
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|&c| c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                push_code(&mut out, &hex, "\\u");
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn push_code(out: &mut String, hex: &str, prefix: &str) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(ch) => out.push(ch),
        None => {
            out.push_str(prefix);
            out.push_str(hex);
        }
    }
}

/// Strip one pair of matching delimiters (`"`, `'`, `` ` ``, or a triple).
pub(crate) fn strip_quotes(raw: &str) -> Option<&str> {
    for delim in ["\"\"\"", "'''", "\"", "'", "`"] {
        if raw.len() >= 2 * delim.len() && raw.starts_with(delim) && raw.ends_with(delim) {
            return Some(&raw[delim.len()..raw.len() - delim.len()]);
        }
    }
    None
}
