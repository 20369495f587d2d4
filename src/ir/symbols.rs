//! Def-use table built beside the AST.
//!
//! Scopes are function-level (program plus one per function). Bindings point
//! at nodes by [`NodeId`]; the tree itself never holds back-references.

use std::collections::HashSet;

use serde::Serialize;

use super::ast::{Ast, AstNode, NodeId, NodeKind, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Declaration,
    Parameter,
    Assignment,
    Import,
    Function,
    /// Name pulled out of a destructuring pattern; `value` is the whole
    /// initializer, not the element.
    Destructure,
}

#[derive(Debug, Clone, Serialize)]
pub struct Binding {
    /// Bound name; member assignments bind their dotted path (`opts.algorithm`).
    pub name: String,
    pub scope: ScopeId,
    pub kind: BindingKind,
    /// Node that introduced the binding.
    pub node: NodeId,
    /// Node holding the bound value, when there is one.
    pub value: Option<NodeId>,
    /// Byte offset from which the binding is visible.
    pub position: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// Program or function node owning the scope.
    pub node: NodeId,
    last: NodeId,
}

impl Scope {
    fn owns(&self, id: NodeId) -> bool {
        self.node <= id && id <= self.last
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
}

impl SymbolTable {
    /// Build the table in one forward pre-order pass.
    pub fn build(ast: &Ast) -> Self {
        let mut table = SymbolTable {
            scopes: vec![Scope {
                parent: None,
                node: ast.root.id,
                last: ast.root.last_descendant,
            }],
            bindings: Vec::new(),
        };
        let mut open = vec![ScopeId(0)];
        let mut destructured: HashSet<NodeId> = HashSet::new();

        for node in ast.walk() {
            while open.len() > 1 {
                let top = open[open.len() - 1];
                if table.scopes[top.0].owns(node.id) {
                    break;
                }
                open.pop();
            }
            let current = open[open.len() - 1];

            match node.kind {
                NodeKind::FunctionDecl | NodeKind::FunctionExpr => {
                    if node.kind == NodeKind::FunctionDecl {
                        if let Some(name) = node.name() {
                            table.bind(
                                name,
                                current,
                                BindingKind::Function,
                                node,
                                Some(node.id),
                                node.span.start_byte,
                            );
                        }
                    }
                    let scope = ScopeId(table.scopes.len());
                    table.scopes.push(Scope {
                        parent: Some(current),
                        node: node.id,
                        last: node.last_descendant,
                    });
                    open.push(scope);
                }
                NodeKind::Parameter if !destructured.contains(&node.id) => {
                    if let Some(name) = node.name() {
                        table.bind(
                            name,
                            current,
                            BindingKind::Parameter,
                            node,
                            None,
                            node.span.start_byte,
                        );
                    }
                }
                NodeKind::VariableDeclarator => {
                    let value = node.child(Role::Value).map(|v| v.id);
                    if let Some(name) = node.name() {
                        table.bind(
                            name,
                            current,
                            BindingKind::Declaration,
                            node,
                            value,
                            node.span.end_byte,
                        );
                    } else if let Some(pattern) = node.child(Role::Name) {
                        for element in pattern.walk() {
                            let Some(name) = element.name() else { continue };
                            let bindable = element.kind == NodeKind::Parameter
                                || (element.kind == NodeKind::Identifier
                                    && element.role != Some(Role::Key));
                            if !bindable {
                                continue;
                            }
                            destructured.insert(element.id);
                            table.bind(
                                name,
                                current,
                                BindingKind::Destructure,
                                element,
                                value,
                                node.span.end_byte,
                            );
                        }
                    }
                }
                NodeKind::Assignment => {
                    let target = node.child(Role::Left).and_then(AstNode::dotted_path);
                    if let Some(name) = target {
                        // Compound assignments (`+=`) leave the value unknown.
                        let plain = node.attr("operator").map_or(true, |op| op == "=");
                        let value = node
                            .child(Role::Right)
                            .filter(|_| plain)
                            .map(|v| v.id);
                        table.bind(
                            &name,
                            current,
                            BindingKind::Assignment,
                            node,
                            value,
                            node.span.end_byte,
                        );
                    }
                }
                NodeKind::Import => {
                    for ident in imported_names(node) {
                        if let Some(name) = ident.name() {
                            table.bind(
                                name,
                                current,
                                BindingKind::Import,
                                ident,
                                Some(node.id),
                                node.span.end_byte,
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        table
    }

    fn bind(
        &mut self,
        name: &str,
        scope: ScopeId,
        kind: BindingKind,
        node: &AstNode,
        value: Option<NodeId>,
        position: usize,
    ) {
        self.bindings.push(Binding {
            name: name.to_string(),
            scope,
            kind,
            node: node.id,
            value,
            position,
        });
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Innermost scope containing a node.
    pub fn scope_of(&self, id: NodeId) -> ScopeId {
        // Scopes are pushed in pre-order, so the last owner is the innermost.
        self.scopes
            .iter()
            .rposition(|s| s.owns(id))
            .map(ScopeId)
            .unwrap_or(ScopeId(0))
    }

    /// Latest binding of `name` visible at a use site: searched in the use's
    /// scope first, then outwards. Only bindings taking effect before
    /// `position` count.
    pub fn resolve(&self, name: &str, at: NodeId, position: usize) -> Option<&Binding> {
        let mut scope = Some(self.scope_of(at));
        while let Some(current) = scope {
            let found = self
                .bindings
                .iter()
                .filter(|b| b.scope == current && b.name == name && b.position <= position)
                .max_by_key(|b| b.position);
            if found.is_some() {
                return found;
            }
            scope = self.scopes.get(current.0).and_then(|s| s.parent);
        }
        None
    }

    /// All bindings of `name` in one scope, in source order.
    pub fn bindings_in(&self, scope: ScopeId, name: &str) -> Vec<&Binding> {
        self.bindings
            .iter()
            .filter(|b| b.scope == scope && b.name == name)
            .collect()
    }
}

/// Local names an import introduces; the module path itself is skipped.
fn imported_names(import: &AstNode) -> Vec<&AstNode> {
    let mut names = Vec::new();
    let mut stack: Vec<&AstNode> = import.children.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.role == Some(Role::Source) {
            continue;
        }
        if node.kind == NodeKind::Identifier {
            names.push(node);
        }
        stack.extend(node.children.iter().rev());
    }
    names
}
