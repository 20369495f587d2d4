//! TypeScript and TSX adapters, built on the ECMAScript mapping.

use super::javascript::EcmaGrammar;
use super::{LanguageAdapter, ParseLimits, ParseOutcome};
use crate::error::ParseError;
use crate::ir::Language;

pub struct TypeScriptAdapter;

pub struct TsxAdapter;

#[cfg(feature = "typescript")]
impl LanguageAdapter for TypeScriptAdapter {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn parse(&self, content: &[u8], limits: &ParseLimits) -> Result<ParseOutcome, ParseError> {
        let grammar = EcmaGrammar {
            language: Language::TypeScript,
        };
        super::parse_with(
            &grammar,
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            content,
            limits,
        )
    }
}

#[cfg(feature = "typescript")]
impl LanguageAdapter for TsxAdapter {
    fn language(&self) -> Language {
        Language::Tsx
    }

    fn parse(&self, content: &[u8], limits: &ParseLimits) -> Result<ParseOutcome, ParseError> {
        let grammar = EcmaGrammar {
            language: Language::Tsx,
        };
        super::parse_with(
            &grammar,
            tree_sitter_typescript::LANGUAGE_TSX.into(),
            content,
            limits,
        )
    }
}
