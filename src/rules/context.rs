//! Read-only view of one parsed file handed to every rule, plus the value
//! resolution and taint helpers rules share.
//!
//! Every helper is conservative: when a value cannot be determined statically
//! (function parameters, unknown callers, dynamic templates) it answers
//! `None` / `false`, and rules do not flag.

use crate::ir::{
    Ast, AstNode, Binding, BindingKind, Language, NodeId, NodeKind, Role, SourceFile, SymbolTable,
};

/// Bound on how many bindings a single resolution may follow.
const MAX_RESOLVE_DEPTH: usize = 16;

/// Request objects whose fields carry user input.
const INPUT_ROOTS: &[&str] = &["req", "request"];

const INPUT_FIELDS: &[&str] = &[
    // express / node
    "query",
    "body",
    "params",
    "headers",
    "cookies",
    "url",
    "originalUrl",
    "path",
    // flask / django
    "args",
    "form",
    "values",
    "json",
    "data",
    "files",
    "GET",
    "POST",
    "COOKIES",
    "META",
    "query_params",
];

/// Methods on a request object that return user input.
const INPUT_ACCESSORS: &[&str] = &["get", "header", "param", "get_json", "getParameter", "getHeader"];

/// Calls that pass their argument's taint through.
const PROPAGATORS: &[&str] = &["String", "str", "format", "concat", "join", "util.format"];

/// Calls whose output is safe to embed in a log line or header.
const SANITIZERS: &[&str] = &[
    "encodeURIComponent",
    "encodeURI",
    "escape",
    "sanitize",
    "escapeHtml",
    "JSON.stringify",
    "json.dumps",
    "validator.escape",
    "querystring.escape",
    "html.escape",
    "quote",
    "quote_plus",
    "urllib.parse.quote",
    "DOMPurify.sanitize",
    "repr",
];

pub struct RuleContext<'a> {
    pub file: &'a SourceFile,
    pub ast: &'a Ast,
    pub symbols: &'a SymbolTable,
}

impl<'a> RuleContext<'a> {
    pub fn new(file: &'a SourceFile, ast: &'a Ast, symbols: &'a SymbolTable) -> Self {
        Self { file, ast, symbols }
    }

    pub fn language(&self) -> Language {
        self.ast.language
    }

    pub fn text(&self, node: &AstNode) -> &'a str {
        self.file.text(&node.span)
    }

    pub fn calls(&self) -> Vec<&'a AstNode> {
        self.ast.nodes_of_kind(&NodeKind::Call)
    }

    /// Calls and `new` expressions.
    pub fn invocations(&self) -> Vec<&'a AstNode> {
        self.ast.walk().filter(|n| n.kind.is_call()).collect()
    }

    pub fn call_args(&self, call: &'a AstNode) -> Vec<&'a AstNode> {
        call.args()
    }

    /// Positional arguments only; Python keyword arguments are skipped.
    pub fn positional(&self, call: &'a AstNode, index: usize) -> Option<&'a AstNode> {
        call.args()
            .into_iter()
            .filter(|a| !self.is_keyword_argument(a))
            .nth(index)
    }

    /// Value of a Python keyword argument.
    pub fn keyword(&self, call: &'a AstNode, name: &str) -> Option<&'a AstNode> {
        call.args()
            .into_iter()
            .filter(|a| self.is_keyword_argument(a))
            .find(|a| a.attr("key") == Some(name))
            .and_then(|a| a.child(Role::Value))
    }

    fn is_keyword_argument(&self, node: &AstNode) -> bool {
        self.language() == Language::Python && node.kind == NodeKind::Property
    }

    pub fn callee(&self, call: &'a AstNode) -> Option<&'a str> {
        call.attr("callee")
    }

    pub fn method(&self, call: &'a AstNode) -> Option<&'a str> {
        call.attr("method")
    }

    /// Receiver of a method call (`a.b` in `a.b.c()`).
    pub fn receiver(&self, call: &'a AstNode) -> Option<&'a AstNode> {
        call.child(Role::Callee)
            .filter(|c| c.kind == NodeKind::Member)
            .and_then(|c| c.child(Role::Object))
            .or_else(|| call.child(Role::Object))
    }

    /// Binding visible at an identifier or static member path.
    pub fn binding_of(&self, node: &AstNode) -> Option<&'a Binding> {
        let name = node.dotted_path()?;
        self.symbols.resolve(&name, node.id, node.span.start_byte)
    }

    /// Follow identifiers and member paths to the expression they were last
    /// assigned. Member paths without a binding resolve to themselves
    /// (`AES.MODE_ECB`); unbound identifiers and parameters do not resolve.
    pub fn resolve_value(&self, node: &'a AstNode) -> Option<&'a AstNode> {
        self.value_at(node, 0)
    }

    fn value_at(&self, node: &'a AstNode, depth: usize) -> Option<&'a AstNode> {
        if depth > MAX_RESOLVE_DEPTH {
            return None;
        }
        match node.kind {
            NodeKind::Identifier | NodeKind::Member => match self.binding_of(node) {
                Some(binding) => {
                    let value = self.bound_value(binding)?;
                    self.value_at(value, depth + 1)
                }
                None if node.kind == NodeKind::Member => Some(node),
                None => None,
            },
            _ => Some(node),
        }
    }

    fn bound_value(&self, binding: &Binding) -> Option<&'a AstNode> {
        match binding.kind {
            BindingKind::Declaration | BindingKind::Assignment => {
                self.ast.get(binding.value?)
            }
            _ => None,
        }
    }

    /// Constant string value of an expression: literals, constant templates,
    /// `+` concatenation, identifiers bound to constants, and encoding calls
    /// on constants (`"k".getBytes()`, `b.encode()`, `Buffer.from("k")`).
    pub fn resolve_string(&self, node: &'a AstNode) -> Option<String> {
        self.string_at(node, 0)
    }

    fn string_at(&self, node: &'a AstNode, depth: usize) -> Option<String> {
        if depth > MAX_RESOLVE_DEPTH {
            return None;
        }
        match node.kind {
            NodeKind::StringLiteral | NodeKind::TemplateString => {
                node.attr("value").map(str::to_string)
            }
            NodeKind::Binary if node.attr("operator") == Some("+") => {
                let mut out = String::new();
                for part in &node.children {
                    out.push_str(&self.string_at(part, depth + 1)?);
                }
                Some(out)
            }
            NodeKind::Identifier | NodeKind::Member => {
                let binding = self.binding_of(node)?;
                let value = self.bound_value(binding)?;
                self.string_at(value, depth + 1)
            }
            NodeKind::Call => self.string_through_call(node, depth),
            _ => None,
        }
    }

    fn string_through_call(&self, call: &'a AstNode, depth: usize) -> Option<String> {
        let method = call.attr("method")?;
        match method {
            "getBytes" | "encode" | "toString" | "trim" | "strip" | "toLowerCase" | "lower"
            | "toUpperCase" | "upper" => {
                let value = self.string_at(self.receiver(call)?, depth + 1)?;
                Some(match method {
                    "trim" | "strip" => value.trim().to_string(),
                    "toLowerCase" | "lower" => value.to_lowercase(),
                    "toUpperCase" | "upper" => value.to_uppercase(),
                    _ => value,
                })
            }
            "from" if call.attr("callee") == Some("Buffer.from") => {
                self.string_at(call.args().first()?, depth + 1)
            }
            "String" | "str" | "bytes" if call.attr("callee") == Some(method) => {
                self.string_at(call.args().first()?, depth + 1)
            }
            _ => None,
        }
    }

    /// Object (or Python dict) literal reached directly or through bindings.
    pub fn resolve_object(&self, node: &'a AstNode) -> Option<&'a AstNode> {
        self.resolve_value(node)
            .filter(|v| v.kind == NodeKind::ObjectLiteral)
    }

    /// Value of `key` on an object expression. A member assignment
    /// `obj.key = …` made after the object was bound takes precedence over
    /// the literal.
    pub fn object_property(&self, object: &'a AstNode, key: &str) -> Option<&'a AstNode> {
        if let Some(base) = object.dotted_path() {
            let path = format!("{base}.{key}");
            if let Some(member) = self.symbols.resolve(&path, object.id, object.span.start_byte) {
                let base_position = self.binding_of(object).map_or(0, |b| b.position);
                if member.position >= base_position {
                    return self.bound_value(member);
                }
            }
        }
        let literal = self.resolve_object(object)?;
        self.literal_property(literal, key)
    }

    /// Value of `key` inside an object literal, shorthand entries included.
    pub fn literal_property(&self, object: &'a AstNode, key: &str) -> Option<&'a AstNode> {
        object.children.iter().find_map(|entry| match entry.kind {
            NodeKind::Property if entry.attr("key") == Some(key) => entry.child(Role::Value),
            NodeKind::Identifier if entry.name() == Some(key) => Some(entry),
            _ => None,
        })
    }

    /// Whether `object` can be seen at all: a literal, or an identifier that
    /// has member assignments.
    pub fn is_known_object(&self, object: &'a AstNode) -> bool {
        self.resolve_object(object).is_some()
    }

    /// Module a call's receiver comes from: the import source or `require`
    /// argument bound to its root name, else the root name itself.
    pub fn module_of(&self, call: &'a AstNode) -> Option<String> {
        let root = root_identifier(call.child(Role::Callee).or_else(|| call.child(Role::Object))?)?;
        let name = root.name()?;
        let module = match self.binding_of(root) {
            Some(binding) => match binding.kind {
                BindingKind::Import => self
                    .ast
                    .get(binding.value?)
                    .and_then(|import| self.imported_module(import, binding.node)),
                BindingKind::Declaration | BindingKind::Destructure => {
                    self.ast.get(binding.value?).and_then(|v| self.required_module(v))
                }
                BindingKind::Function | BindingKind::Parameter => return None,
                BindingKind::Assignment => None,
            },
            None => None,
        };
        let module = module.unwrap_or_else(|| name.to_string());
        Some(module.strip_prefix("node:").unwrap_or(&module).to_string())
    }

    /// Module an import binds `name` from. Plain Python imports carry one
    /// module per clause (`import jwt, os as system`).
    fn imported_module(&self, import: &'a AstNode, name: NodeId) -> Option<String> {
        if import.child(Role::Source).is_some() {
            return import.attr("source").map(str::to_string);
        }
        let clause = import.children.iter().find(|c| c.owns(name))?;
        let module = self.text(clause).split(" as ").next()?.trim();
        (!module.is_empty()).then(|| module.to_string())
    }

    /// `require("x")`, possibly followed by a member access.
    fn required_module(&self, node: &'a AstNode) -> Option<String> {
        match node.kind {
            NodeKind::Call if node.attr("callee") == Some("require") => {
                self.resolve_string(node.args().first()?)
            }
            NodeKind::Member => self.required_module(node.child(Role::Object)?),
            _ => None,
        }
    }

    /// Expression carries data from an HTTP request.
    pub fn is_user_input(&self, node: &'a AstNode) -> bool {
        self.tainted(node, 0)
    }

    fn tainted(&self, node: &'a AstNode, depth: usize) -> bool {
        if depth > MAX_RESOLVE_DEPTH {
            return false;
        }
        match &node.kind {
            NodeKind::Member | NodeKind::Subscript => {
                if self.is_input_source(node) {
                    return true;
                }
                if let Some(binding) = self.binding_of(node) {
                    return self
                        .bound_value(binding)
                        .is_some_and(|v| self.tainted(v, depth + 1));
                }
                node.child(Role::Object)
                    .is_some_and(|o| self.tainted(o, depth + 1))
            }
            NodeKind::Identifier => self
                .binding_of(node)
                .and_then(|b| self.bound_value(b))
                .is_some_and(|v| self.tainted(v, depth + 1)),
            NodeKind::Call => {
                if self.is_sanitized(node) {
                    return false;
                }
                let receiver = self.receiver(node);
                let method = node.attr("method").unwrap_or("");
                if INPUT_ACCESSORS.contains(&method)
                    && receiver
                        .and_then(|r| r.name())
                        .is_some_and(|r| INPUT_ROOTS.contains(&r))
                {
                    return true;
                }
                if receiver.is_some_and(|r| self.tainted(r, depth + 1)) {
                    return true;
                }
                let callee = node.attr("callee").unwrap_or("");
                (PROPAGATORS.contains(&callee) || PROPAGATORS.contains(&method))
                    && node.args().iter().any(|a| self.tainted(a, depth + 1))
            }
            NodeKind::Binary
            | NodeKind::TemplateString
            | NodeKind::Conditional
            | NodeKind::ArrayLiteral
            | NodeKind::ObjectLiteral
            | NodeKind::Property
            | NodeKind::Unary
            | NodeKind::Unmodeled(_) => node
                .children
                .iter()
                .filter(|c| c.role != Some(Role::Condition) && c.role != Some(Role::Key))
                .any(|c| self.tainted(c, depth + 1)),
            _ => false,
        }
    }

    /// `req.query.x`, `request.args["x"]` and friends.
    fn is_input_source(&self, node: &AstNode) -> bool {
        let mut fields = Vec::new();
        let mut current = node;
        loop {
            match current.kind {
                NodeKind::Member => {
                    if let Some(property) = current.attr("property") {
                        fields.push(property);
                    }
                }
                NodeKind::Subscript => {}
                NodeKind::Identifier => break,
                _ => return false,
            }
            match current.child(Role::Object) {
                Some(object) => current = object,
                None => return false,
            }
        }
        let root = current.name().unwrap_or("");
        INPUT_ROOTS.contains(&root)
            && fields
                .last()
                .is_some_and(|first| INPUT_FIELDS.contains(first))
    }

    /// Call that neutralizes CR/LF: a sanitizer, or a `replace` / `re.sub`
    /// whose pattern covers a newline.
    pub fn is_sanitized(&self, node: &'a AstNode) -> bool {
        if node.kind != NodeKind::Call {
            return false;
        }
        let callee = node.attr("callee").unwrap_or("");
        let method = node.attr("method").unwrap_or("");
        if SANITIZERS.contains(&callee) || (callee.is_empty() && SANITIZERS.contains(&method)) {
            return true;
        }
        let pattern = match (callee, method) {
            ("re.sub", _) | (_, "replace") | (_, "replaceAll") => node.args().first().copied(),
            _ => None,
        };
        pattern.is_some_and(|p| self.covers_newline(p))
    }

    fn covers_newline(&self, pattern: &'a AstNode) -> bool {
        let text = match pattern.kind {
            NodeKind::RegexLiteral => pattern.attr("pattern").map(str::to_string),
            NodeKind::New if pattern.attr("callee") == Some("RegExp") => pattern
                .args()
                .first()
                .and_then(|a| self.resolve_string(a)),
            _ => self.resolve_string(pattern),
        };
        text.is_some_and(|t| {
            t.contains('\n')
                || t.contains('\r')
                || t.contains("\\n")
                || t.contains("\\r")
                || t.contains("\\s")
        })
    }

    pub fn in_safe_list(&self, value: &str, list: &[&str]) -> bool {
        list.iter().any(|s| s.eq_ignore_ascii_case(value))
    }

    /// Calls in the same function body as `node` that end before it starts.
    pub fn preceding_calls(&self, node: &'a AstNode) -> Vec<&'a AstNode> {
        let scope = self.ast.enclosing_function(node.id).map(|f| f.id);
        self.ast
            .enclosing_body(node.id)
            .walk()
            .filter(|n| n.kind == NodeKind::Call && n.span.precedes(&node.span))
            .filter(|n| self.ast.enclosing_function(n.id).map(|f| f.id) == scope)
            .collect()
    }
}

/// Leftmost identifier of a callee or receiver chain.
pub(crate) fn root_identifier(node: &AstNode) -> Option<&AstNode> {
    let mut current = node;
    loop {
        match current.kind {
            NodeKind::Identifier => return Some(current),
            NodeKind::Member | NodeKind::Subscript => current = current.child(Role::Object)?,
            NodeKind::Call => {
                current = current
                    .child(Role::Callee)
                    .or_else(|| current.child(Role::Object))?
            }
            _ => return None,
        }
    }
}
