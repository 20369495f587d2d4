pub mod builtin;
pub mod context;
pub mod finding;
pub mod policy;

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::ir::Language;

pub use context::RuleContext;
pub use finding::{Finding, MatchSite, RuleMetadata, Severity};

/// A rule inspects one file's tree and reports match sites.
///
/// Rules are stateless; the same value is shared by every worker thread.
pub trait Rule: Send + Sync {
    /// Metadata about this rule (id, finding code, severity, CWE, languages).
    fn metadata(&self) -> RuleMetadata;

    /// Run the rule against a parsed file.
    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite>;
}

/// A registered rule with its metadata resolved once.
pub struct CatalogEntry {
    pub metadata: RuleMetadata,
    pub rule: Box<dyn Rule>,
}

/// Ordered registry of rules, keyed by id. Built once, then read-only.
#[derive(Default)]
pub struct RuleCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl RuleCatalog {
    /// Version of the built-in rule set; tracks the crate version.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every built-in rule registered.
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self::new();
        for rule in builtin::all_rules() {
            catalog.register(rule)?;
        }
        Ok(catalog)
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) -> Result<()> {
        let metadata = rule.metadata();
        if metadata.id.trim().is_empty() {
            return Err(EngineError::Catalog("rule with empty id".into()));
        }
        if metadata.languages.is_empty() {
            return Err(EngineError::Catalog(format!(
                "rule {} declares no languages",
                metadata.id
            )));
        }
        if self.index.contains_key(&metadata.id) {
            return Err(EngineError::DuplicateRule(metadata.id));
        }
        self.index.insert(metadata.id.clone(), self.entries.len());
        self.entries.push(CatalogEntry { metadata, rule });
        Ok(())
    }

    /// Rules applicable to a language, in registration order.
    pub fn rules_for(&self, language: Language) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.metadata.applies_to(language))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// Metadata for all registered rules.
    pub fn list(&self) -> Vec<&RuleMetadata> {
        self.entries.iter().map(|e| &e.metadata).collect()
    }

    /// Languages at least one rule applies to.
    pub fn languages(&self) -> Vec<Language> {
        let mut langs: Vec<Language> = self
            .entries
            .iter()
            .flat_map(|e| e.metadata.languages.iter().copied())
            .collect();
        langs.sort();
        langs.dedup();
        langs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCatalog")
            .field("rules", &self.index.len())
            .finish()
    }
}

/// Languages sharing ECMAScript rule semantics.
pub(crate) const ECMASCRIPT: &[Language] =
    &[Language::JavaScript, Language::TypeScript, Language::Tsx];


#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str, Vec<Language>);

    impl Rule for Dummy {
        fn metadata(&self) -> RuleMetadata {
            RuleMetadata {
                id: self.0.into(),
                finding: "F000".into(),
                name: "Dummy".into(),
                description: "test rule".into(),
                default_severity: Severity::Low,
                cwe_id: None,
                languages: self.1.clone(),
                remediation: None,
            }
        }

        fn check(&self, _ctx: &RuleContext<'_>) -> Vec<MatchSite> {
            Vec::new()
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut catalog = RuleCatalog::new();
        catalog
            .register(Box::new(Dummy("a", vec![Language::Python])))
            .unwrap();
        let err = catalog
            .register(Box::new(Dummy("a", vec![Language::Java])))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRule(id) if id == "a"));
    }

    #[test]
    fn rules_without_languages_are_rejected() {
        let mut catalog = RuleCatalog::new();
        let err = catalog.register(Box::new(Dummy("b", vec![]))).unwrap_err();
        assert!(matches!(err, EngineError::Catalog(_)));
    }

    #[test]
    fn lookup_by_language_keeps_order() {
        let mut catalog = RuleCatalog::new();
        catalog
            .register(Box::new(Dummy("x", vec![Language::Python, Language::Java])))
            .unwrap();
        catalog
            .register(Box::new(Dummy("y", vec![Language::Java])))
            .unwrap();
        let ids: Vec<&str> = catalog
            .rules_for(Language::Java)
            .iter()
            .map(|e| e.metadata.id.as_str())
            .collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(catalog.rules_for(Language::Python).len(), 1);
        assert!(catalog.get("y").is_some());
        assert_eq!(catalog.languages(), vec![Language::Python, Language::Java]);
    }

    #[test]
    fn builtin_catalog_is_consistent() {
        let catalog = RuleCatalog::builtin().unwrap();
        assert!(catalog.len() >= 9);
        for meta in catalog.list() {
            assert!(meta.id.starts_with(&meta.finding.to_lowercase()), "{}", meta.id);
            assert!(meta.cwe_id.is_some());
        }
    }
}
