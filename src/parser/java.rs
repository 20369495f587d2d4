use tree_sitter::Node;

use super::lower::{self, Grammar, Lowering};
use super::{LanguageAdapter, ParseLimits, ParseOutcome};
use crate::error::ParseError;
use crate::ir::{AstNode, Language, NodeKind, Role};

pub struct JavaAdapter;

struct JavaGrammar;

impl Grammar for JavaGrammar {
    fn language(&self) -> Language {
        Language::Java
    }

    fn classify(&self, node: Node<'_>, parent: &str) -> Lowering {
        let kind = match node.kind() {
            "line_comment" | "block_comment" => return Lowering::Skip,
            "parenthesized_expression" => return Lowering::Transparent,

            "program" => NodeKind::Program,
            "method_declaration" | "constructor_declaration" => NodeKind::FunctionDecl,
            "lambda_expression" => NodeKind::FunctionExpr,
            "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration" => NodeKind::ClassDecl,
            "local_variable_declaration" | "field_declaration" => NodeKind::VariableDecl,
            "variable_declarator" => NodeKind::VariableDeclarator,
            "formal_parameter" | "spread_parameter" => NodeKind::Parameter,
            "identifier" if parent == "inferred_parameters" => NodeKind::Parameter,
            "import_declaration" => NodeKind::Import,

            "block" | "constructor_body" => NodeKind::Block,
            "expression_statement" => NodeKind::ExpressionStatement,
            "return_statement" => NodeKind::Return,
            "if_statement" => NodeKind::If,
            "for_statement" | "enhanced_for_statement" | "while_statement" | "do_statement" => {
                NodeKind::Loop
            }
            "try_statement" | "try_with_resources_statement" => NodeKind::Try,

            "method_invocation" => NodeKind::Call,
            "object_creation_expression" => NodeKind::New,
            "field_access" => NodeKind::Member,
            "array_access" => NodeKind::Subscript,
            "identifier" | "type_identifier" | "this" | "super" => NodeKind::Identifier,
            "string_literal" | "character_literal" => NodeKind::StringLiteral,
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal"
            | "decimal_floating_point_literal"
            | "hex_floating_point_literal" => NodeKind::NumberLiteral,
            "true" | "false" => NodeKind::BooleanLiteral,
            "null_literal" => NodeKind::NullLiteral,
            "array_initializer" => NodeKind::ArrayLiteral,
            "argument_list" => NodeKind::Arguments,
            "assignment_expression" => NodeKind::Assignment,
            "binary_expression" => NodeKind::Binary,
            "unary_expression" | "update_expression" => NodeKind::Unary,
            "ternary_expression" => NodeKind::Conditional,

            other => NodeKind::Unmodeled(other.to_string()),
        };
        Lowering::Node(kind)
    }

    fn string_value(&self, raw: &str) -> Option<String> {
        lower::strip_quotes(raw).map(lower::unescape)
    }

    fn decorate(&self, node: &mut AstNode, native: Node<'_>, src: &str) {
        // Imports carry no string; the path is the declaration text.
        if node.kind == NodeKind::Import {
            let text = lower::node_text(native, src);
            let path = text
                .trim_start_matches("import")
                .trim()
                .trim_start_matches("static ")
                .trim_end_matches(';')
                .trim();
            node.set_attr("source", path);
            for child in &mut node.children {
                child.role = Some(Role::Source);
            }
        }
    }
}

#[cfg(feature = "java")]
impl LanguageAdapter for JavaAdapter {
    fn language(&self) -> Language {
        Language::Java
    }

    fn parse(&self, content: &[u8], limits: &ParseLimits) -> Result<ParseOutcome, ParseError> {
        super::parse_with(
            &JavaGrammar,
            tree_sitter_java::LANGUAGE.into(),
            content,
            limits,
        )
    }
}

#[cfg(all(test, feature = "java"))]
mod tests {
    use super::*;
    use crate::ir::BindingKind;
    use crate::parser::test_support::{assert_spans_nested, calls, parse};

    const SOURCE: &str = r#"import javax.crypto.Cipher;

public class Crypto {
    private static final String MODE = "AES/ECB/PKCS5Padding";

    public byte[] run(byte[] data, String name) throws Exception {
        String transformation = MODE;
        Cipher c = Cipher.getInstance(transformation);
        return c.doFinal(data);
    }
}
"#;

    #[test]
    fn method_invocations_carry_receiver_path() {
        let out = parse(&JavaAdapter, SOURCE);
        let callees: Vec<&str> = calls(&out)
            .iter()
            .filter_map(|c| c.attr("callee"))
            .collect();
        assert_eq!(callees, vec!["Cipher.getInstance", "c.doFinal"]);
        assert_eq!(calls(&out)[0].attr("method"), Some("getInstance"));
    }

    #[test]
    fn declarators_fields_and_parameters() {
        let out = parse(&JavaAdapter, SOURCE);
        let mode = out
            .symbols
            .bindings()
            .iter()
            .find(|b| b.name == "MODE")
            .unwrap();
        assert_eq!(mode.kind, BindingKind::Declaration);
        let value = out.ast.get(mode.value.unwrap()).unwrap();
        assert_eq!(value.attr("value"), Some("AES/ECB/PKCS5Padding"));

        let params: Vec<&str> = out
            .symbols
            .bindings()
            .iter()
            .filter(|b| b.kind == BindingKind::Parameter)
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(params, vec!["data", "name"]);

        let import = &out.ast.nodes_of_kind(&NodeKind::Import)[0];
        assert_eq!(import.attr("source"), Some("javax.crypto.Cipher"));
        let decl = &out.ast.nodes_of_kind(&NodeKind::VariableDeclarator)[0];
        assert_eq!(decl.child(Role::Value).map(|v| v.kind.clone()), Some(NodeKind::StringLiteral));
        assert_spans_nested(&out.ast.root);
    }

    #[test]
    fn object_creation_callee() {
        let out = parse(&JavaAdapter, "class A { Object o = new javax.crypto.spec.SecretKeySpec(k, \"DES\"); }\n");
        let news = out.ast.nodes_of_kind(&NodeKind::New);
        assert_eq!(news[0].attr("callee"), Some("javax.crypto.spec.SecretKeySpec"));
    }
}
