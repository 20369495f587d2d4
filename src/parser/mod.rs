pub mod java;
pub mod javascript;
pub(crate) mod lower;
pub mod python;
pub mod typescript;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::ParseError;
use crate::ir::{Ast, Language, Span, SymbolTable};

/// Result of parsing one source file.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub ast: Ast,
    pub symbols: SymbolTable,
    /// Regions the parser recovered from. The tree holds `Error` markers there.
    pub syntax_errors: Vec<Span>,
}

/// Bounds applied to every parse.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    pub max_bytes: usize,
    pub max_depth: usize,
    pub timeout_ms_per_kib: u64,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            max_depth: 512,
            timeout_ms_per_kib: 50,
        }
    }
}

impl ParseLimits {
    const MIN_TIMEOUT_MS: u64 = 100;

    /// Parse budget for an input of `len` bytes.
    pub fn timeout_ms(&self, len: usize) -> u64 {
        let kib = (len as u64).div_ceil(1024);
        (kib * self.timeout_ms_per_kib).max(Self::MIN_TIMEOUT_MS)
    }
}

/// Language adapter. Each adapter turns raw bytes into the unified AST plus
/// its symbol table. Adapters are pure and shared across worker threads.
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> Language;
    fn parse(&self, content: &[u8], limits: &ParseLimits) -> Result<ParseOutcome, ParseError>;
}

/// Language tag to adapter mapping.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<Language, Arc<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    /// Registry holding every adapter compiled into this build.
    pub fn builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::default();
        #[cfg(feature = "javascript")]
        registry.register(Arc::new(javascript::JavaScriptAdapter));
        #[cfg(feature = "typescript")]
        {
            registry.register(Arc::new(typescript::TypeScriptAdapter));
            registry.register(Arc::new(typescript::TsxAdapter));
        }
        #[cfg(feature = "python")]
        registry.register(Arc::new(python::PythonAdapter));
        #[cfg(feature = "java")]
        registry.register(Arc::new(java::JavaAdapter));
        registry
    }

    /// Add or replace the adapter for its language.
    pub fn register(&mut self, adapter: Arc<dyn LanguageAdapter>) {
        self.adapters.insert(adapter.language(), adapter);
    }

    pub fn get(&self, language: Language) -> Option<&Arc<dyn LanguageAdapter>> {
        self.adapters.get(&language)
    }

    pub fn supports(&self, language: Language) -> bool {
        self.adapters.contains_key(&language)
    }

    pub fn languages(&self) -> Vec<Language> {
        self.adapters.keys().copied().collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

/// Shared tree-sitter driver: decode, parse under a timeout, lower, index.
#[cfg_attr(
    not(any(
        feature = "javascript",
        feature = "typescript",
        feature = "python",
        feature = "java"
    )),
    allow(dead_code)
)]
pub(crate) fn parse_with<G: lower::Grammar + ?Sized>(
    grammar: &G,
    language: tree_sitter::Language,
    content: &[u8],
    limits: &ParseLimits,
) -> Result<ParseOutcome, ParseError> {
    if content.len() > limits.max_bytes {
        return Err(ParseError::TooLarge {
            size: content.len(),
            limit: limits.max_bytes,
        });
    }
    let src = std::str::from_utf8(content).map_err(|e| ParseError::Encoding {
        offset: e.valid_up_to(),
    })?;

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| ParseError::Grammar {
            message: e.to_string(),
        })?;
    let timeout_ms = limits.timeout_ms(content.len());
    parser.set_timeout_micros(timeout_ms * 1000);

    let tree = parser
        .parse(src, None)
        .ok_or(ParseError::Timeout { timeout_ms })?;

    let (root, syntax_errors) = lower::lower(grammar, &tree, src, limits.max_depth)?;
    let ast = Ast::new(grammar.language(), root);
    let symbols = SymbolTable::build(&ast);
    debug!(
        language = %grammar.language(),
        nodes = ast.len(),
        syntax_errors = syntax_errors.len(),
        "lowered syntax tree"
    );

    Ok(ParseOutcome {
        ast,
        symbols,
        syntax_errors,
    })
}
