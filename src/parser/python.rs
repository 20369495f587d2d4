use tree_sitter::Node;

use super::lower::{self, Grammar, Lowering};
use super::{LanguageAdapter, ParseLimits, ParseOutcome};
use crate::error::ParseError;
use crate::ir::{AstNode, Language, NodeKind};

pub struct PythonAdapter;

struct PythonGrammar;

const PARAMETER_LISTS: &[&str] = &["parameters", "lambda_parameters"];

impl Grammar for PythonGrammar {
    fn language(&self) -> Language {
        Language::Python
    }

    fn classify(&self, node: Node<'_>, parent: &str) -> Lowering {
        let kind = match node.kind() {
            "comment" => return Lowering::Skip,
            "parenthesized_expression" => return Lowering::Transparent,

            "module" => NodeKind::Program,
            "function_definition" => NodeKind::FunctionDecl,
            "lambda" => NodeKind::FunctionExpr,
            "class_definition" => NodeKind::ClassDecl,
            "identifier" if PARAMETER_LISTS.contains(&parent) => NodeKind::Parameter,
            "default_parameter"
            | "typed_parameter"
            | "typed_default_parameter"
            | "list_splat_pattern"
            | "dictionary_splat_pattern"
                if PARAMETER_LISTS.contains(&parent) =>
            {
                NodeKind::Parameter
            }
            "import_statement" | "import_from_statement" => NodeKind::Import,

            "block" => NodeKind::Block,
            "expression_statement" => NodeKind::ExpressionStatement,
            "return_statement" => NodeKind::Return,
            "if_statement" | "elif_clause" => NodeKind::If,
            "for_statement" | "while_statement" => NodeKind::Loop,
            "try_statement" => NodeKind::Try,

            "call" => NodeKind::Call,
            "attribute" => NodeKind::Member,
            "subscript" => NodeKind::Subscript,
            "identifier" => NodeKind::Identifier,
            "string" => {
                let mut cursor = node.walk();
                let interpolated = node
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "interpolation");
                if interpolated {
                    NodeKind::TemplateString
                } else {
                    NodeKind::StringLiteral
                }
            }
            "integer" | "float" => NodeKind::NumberLiteral,
            "true" | "false" => NodeKind::BooleanLiteral,
            "none" => NodeKind::NullLiteral,
            "dictionary" => NodeKind::ObjectLiteral,
            "pair" | "keyword_argument" => NodeKind::Property,
            "list" | "tuple" | "set" => NodeKind::ArrayLiteral,
            "argument_list" => NodeKind::Arguments,
            "assignment" | "augmented_assignment" => NodeKind::Assignment,
            "binary_operator" | "boolean_operator" | "comparison_operator" | "concatenated_string" => {
                NodeKind::Binary
            }
            "unary_operator" | "not_operator" | "await" => NodeKind::Unary,
            "conditional_expression" => NodeKind::Conditional,

            other => NodeKind::Unmodeled(other.to_string()),
        };
        Lowering::Node(kind)
    }

    fn string_value(&self, raw: &str) -> Option<String> {
        let prefix_len = raw
            .find(|c: char| c == '\'' || c == '"')
            .unwrap_or(raw.len());
        let (prefix, quoted) = raw.split_at(prefix_len);
        let body = lower::strip_quotes(quoted)?;
        if prefix.to_ascii_lowercase().contains('r') {
            Some(body.to_string())
        } else {
            Some(lower::unescape(body))
        }
    }

    fn decorate(&self, node: &mut AstNode, native: Node<'_>, _src: &str) {
        match native.kind() {
            "concatenated_string" => node.set_attr("operator", "+"),
            "not_operator" => node.set_attr("operator", "not"),
            "await" => node.set_attr("operator", "await"),
            _ => {}
        }
    }
}

#[cfg(feature = "python")]
impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse(&self, content: &[u8], limits: &ParseLimits) -> Result<ParseOutcome, ParseError> {
        super::parse_with(
            &PythonGrammar,
            tree_sitter_python::LANGUAGE.into(),
            content,
            limits,
        )
    }
}

#[cfg(all(test, feature = "python"))]
mod tests {
    use super::*;
    use crate::ir::{BindingKind, Role};
    use crate::parser::test_support::{assert_spans_nested, calls, parse};

    #[test]
    fn keyword_arguments_become_properties() {
        let out = parse(
            &PythonAdapter,
            "import jwt\ntoken = jwt.encode(payload, key, algorithm=\"none\")\n",
        );
        let call = &calls(&out)[0];
        assert_eq!(call.attr("callee"), Some("jwt.encode"));
        let args = call.args();
        assert_eq!(args.len(), 3);
        assert_eq!(args[2].kind, NodeKind::Property);
        assert_eq!(args[2].attr("key"), Some("algorithm"));
        assert_eq!(
            args[2].child(Role::Value).and_then(|v| v.attr("value")),
            Some("none")
        );
    }

    #[test]
    fn string_prefixes_and_fstrings() {
        let grammar = PythonGrammar;
        assert_eq!(grammar.string_value("b'salt'"), Some("salt".into()));
        assert_eq!(grammar.string_value("r'\\n'"), Some("\\n".into()));
        assert_eq!(grammar.string_value("'''a\\tb'''"), Some("a\tb".into()));

        let out = parse(&PythonAdapter, "name = f\"hi {user}\"\n");
        assert_eq!(out.ast.nodes_of_kind(&NodeKind::TemplateString).len(), 1);
    }

    #[test]
    fn assignments_imports_and_parameters() {
        let src = "from Crypto.Cipher import AES\n\ndef enc(key, mode=None, *args):\n    salt = 'abc'\n    return AES.new(key, AES.MODE_ECB)\n";
        let out = parse(&PythonAdapter, src);
        let bindings = out.symbols.bindings();
        let find = |name: &str| bindings.iter().find(|b| b.name == name).map(|b| b.kind);
        assert_eq!(find("AES"), Some(BindingKind::Import));
        assert_eq!(find("Crypto"), None);
        assert_eq!(find("key"), Some(BindingKind::Parameter));
        assert_eq!(find("mode"), Some(BindingKind::Parameter));
        assert_eq!(find("args"), Some(BindingKind::Parameter));
        assert_eq!(find("salt"), Some(BindingKind::Assignment));

        let import = &out.ast.nodes_of_kind(&NodeKind::Import)[0];
        assert_eq!(import.attr("source"), Some("Crypto.Cipher"));
        let call = &calls(&out)[0];
        assert_eq!(call.attr("callee"), Some("AES.new"));
        assert_eq!(call.args()[1].attr("path"), Some("AES.MODE_ECB"));
        assert_spans_nested(&out.ast.root);
    }

    #[test]
    fn broken_indentation_is_recovered() {
        let out = parse(&PythonAdapter, "def f(:\n    return 1\nprint('ok')\n");
        assert!(!out.syntax_errors.is_empty());
        assert_spans_nested(&out.ast.root);
    }
}
