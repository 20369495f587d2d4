//! JavaScript adapter (JSX included). The node mapping here is shared with
//! the TypeScript and TSX adapters.

use tree_sitter::Node;

use super::lower::{self, Grammar, Lowering};
use super::{LanguageAdapter, ParseLimits, ParseOutcome};
use crate::error::ParseError;
use crate::ir::{AstNode, Language, NodeKind};

/// Native-kind mapping for the ECMAScript family of grammars.
pub(crate) struct EcmaGrammar {
    pub(crate) language: Language,
}

impl Grammar for EcmaGrammar {
    fn language(&self) -> Language {
        self.language
    }

    fn classify(&self, node: Node<'_>, parent: &str) -> Lowering {
        let kind = match node.kind() {
            "comment" | "hash_bang_line" => return Lowering::Skip,
            "parenthesized_expression"
            | "as_expression"
            | "satisfies_expression"
            | "non_null_expression" => return Lowering::Transparent,

            "program" => NodeKind::Program,
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                NodeKind::FunctionDecl
            }
            "function_expression" | "function" | "generator_function" | "arrow_function" => {
                NodeKind::FunctionExpr
            }
            "class_declaration" | "class" | "abstract_class_declaration" => NodeKind::ClassDecl,
            "lexical_declaration" | "variable_declaration" => NodeKind::VariableDecl,
            "variable_declarator" => NodeKind::VariableDeclarator,
            "required_parameter"
            | "optional_parameter"
            | "assignment_pattern"
            | "rest_pattern"
            | "shorthand_property_identifier_pattern" => NodeKind::Parameter,
            "identifier" if parent == "formal_parameters" => NodeKind::Parameter,
            "import_statement" => NodeKind::Import,

            "statement_block" => NodeKind::Block,
            "expression_statement" => NodeKind::ExpressionStatement,
            "return_statement" => NodeKind::Return,
            "if_statement" => NodeKind::If,
            "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
                NodeKind::Loop
            }
            "try_statement" => NodeKind::Try,

            "call_expression" => NodeKind::Call,
            "new_expression" => NodeKind::New,
            "member_expression" => NodeKind::Member,
            "subscript_expression" => NodeKind::Subscript,
            "identifier"
            | "property_identifier"
            | "shorthand_property_identifier"
            | "private_property_identifier"
            | "this"
            | "super" => NodeKind::Identifier,
            "string" => NodeKind::StringLiteral,
            "template_string" => NodeKind::TemplateString,
            "regex" => NodeKind::RegexLiteral,
            "number" => NodeKind::NumberLiteral,
            "true" | "false" => NodeKind::BooleanLiteral,
            "null" | "undefined" => NodeKind::NullLiteral,
            "object" => NodeKind::ObjectLiteral,
            "pair" => NodeKind::Property,
            "array" => NodeKind::ArrayLiteral,
            "arguments" => NodeKind::Arguments,
            "assignment_expression" | "augmented_assignment_expression" => NodeKind::Assignment,
            "binary_expression" => NodeKind::Binary,
            "unary_expression" | "update_expression" | "await_expression" => NodeKind::Unary,
            "ternary_expression" => NodeKind::Conditional,

            other => NodeKind::Unmodeled(other.to_string()),
        };
        Lowering::Node(kind)
    }

    fn string_value(&self, raw: &str) -> Option<String> {
        lower::strip_quotes(raw).map(lower::unescape)
    }

    fn decorate(&self, node: &mut AstNode, native: Node<'_>, src: &str) {
        match node.kind {
            // A template without substitutions is a plain constant.
            NodeKind::TemplateString => {
                let mut cursor = native.walk();
                let dynamic = native
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "template_substitution");
                if !dynamic {
                    let raw = lower::node_text(native, src);
                    if let Some(body) = lower::strip_quotes(raw) {
                        node.set_attr("value", lower::unescape(body));
                    }
                }
            }
            NodeKind::Unary if native.kind() == "await_expression" => {
                node.set_attr("operator", "await");
            }
            _ => {}
        }
    }
}

pub struct JavaScriptAdapter;

#[cfg(feature = "javascript")]
impl LanguageAdapter for JavaScriptAdapter {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn parse(&self, content: &[u8], limits: &ParseLimits) -> Result<ParseOutcome, ParseError> {
        let grammar = EcmaGrammar {
            language: Language::JavaScript,
        };
        super::parse_with(
            &grammar,
            tree_sitter_javascript::LANGUAGE.into(),
            content,
            limits,
        )
    }
}

#[cfg(all(test, feature = "javascript"))]
mod tests {
    use super::*;
    use crate::ir::{BindingKind, NodeKind, Role};
    use crate::parser::test_support::{assert_spans_nested, calls, parse};

    #[test]
    fn lowers_calls_with_dotted_callee() {
        let out = parse(&JavaScriptAdapter, "window.open(url, '_blank');\n");
        let calls = calls(&out);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].attr("callee"), Some("window.open"));
        assert_eq!(calls[0].attr("method"), Some("open"));
        let args = calls[0].args();
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].attr("value"), Some("_blank"));
        assert_eq!(calls[0].span.start_line, 1);
        assert_eq!(calls[0].span.start_column, 1);
    }

    #[test]
    fn string_escapes_and_templates() {
        let out = parse(&JavaScriptAdapter, "const a = 'x\\ny';\nconst b = `plain`;\nconst c = `${a}`;\n");
        let decls = out.ast.nodes_of_kind(&NodeKind::VariableDeclarator);
        assert_eq!(decls.len(), 3);
        let value = |i: usize| decls[i].child(Role::Value).and_then(|v| v.attr("value"));
        assert_eq!(value(0), Some("x\ny"));
        assert_eq!(value(1), Some("plain"));
        assert_eq!(value(2), None);
    }

    #[test]
    fn objects_and_shorthand_properties() {
        let out = parse(&JavaScriptAdapter, "const o = { algorithm: 'none', expiresIn };\n");
        let props = out.ast.nodes_of_kind(&NodeKind::Property);
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].attr("key"), Some("algorithm"));
        let object = &out.ast.nodes_of_kind(&NodeKind::ObjectLiteral)[0];
        assert!(object
            .children
            .iter()
            .any(|c| c.kind == NodeKind::Identifier && c.name() == Some("expiresIn")));
    }

    #[test]
    fn parameters_and_declarations_feed_symbols() {
        let src = "const jwt = require('jsonwebtoken');\nfunction handler(req, { token }) {\n  let x = 1;\n  x = 2;\n}\n";
        let out = parse(&JavaScriptAdapter, src);
        let kinds: Vec<(String, BindingKind)> = out
            .symbols
            .bindings()
            .iter()
            .map(|b| (b.name.clone(), b.kind))
            .collect();
        assert!(kinds.contains(&("jwt".into(), BindingKind::Declaration)));
        assert!(kinds.contains(&("handler".into(), BindingKind::Function)));
        assert!(kinds.contains(&("req".into(), BindingKind::Parameter)));
        assert!(kinds.contains(&("token".into(), BindingKind::Parameter)));
        assert!(kinds.contains(&("x".into(), BindingKind::Assignment)));
        assert_eq!(out.symbols.scopes().len(), 2);
    }

    #[test]
    fn imports_bind_local_names() {
        let out = parse(&JavaScriptAdapter, "import jwt from 'jsonwebtoken';\nimport { createHash } from 'node:crypto';\n");
        let imports = out.ast.nodes_of_kind(&NodeKind::Import);
        assert_eq!(imports[0].attr("source"), Some("jsonwebtoken"));
        assert_eq!(imports[1].attr("source"), Some("node:crypto"));
        let names: Vec<&str> = out.symbols.bindings().iter().map(|b| b.name.as_str()).collect();
        assert!(names.contains(&"jwt"));
        assert!(names.contains(&"createHash"));
    }

    #[test]
    fn recovers_from_broken_syntax() {
        let out = parse(&JavaScriptAdapter, "const s = \"unterminated;\nwindow.open(u, '_blank');\n");
        assert!(!out.syntax_errors.is_empty());
        assert_spans_nested(&out.ast.root);
    }

    #[test]
    fn spans_nest_for_jsx() {
        let out = parse(
            &JavaScriptAdapter,
            "export const A = () => <a href=\"x\" onClick={() => go(1)}>{(1 + 2)}</a>;\n",
        );
        assert!(out.syntax_errors.is_empty());
        assert_spans_nested(&out.ast.root);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let src = format!("x = {}1{};", "[".repeat(600), "]".repeat(600));
        let err = JavaScriptAdapter
            .parse(src.as_bytes(), &ParseLimits::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::DepthExceeded { limit: 512, .. }));
    }

    #[test]
    fn invalid_utf8_reports_offset() {
        let err = JavaScriptAdapter
            .parse(b"let a = 1;\xff", &ParseLimits::default())
            .unwrap_err();
        assert_eq!(err, ParseError::Encoding { offset: 10 });
    }
}
