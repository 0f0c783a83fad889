//! Static knowledge base: category -> keyword -> fact
//!
//! Lookups are substring matches of each category's keywords against the
//! lower-cased query. A category matches as a whole: callers receive the full
//! fact table of every matching category.

use concierge_common::{ConciergeError, KnowledgeBaseConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Facts of one category, keyed by lower-case keyword
pub type FactTable = BTreeMap<String, String>;

/// Result of a knowledge base query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeQueryResult {
    /// The query text as received
    pub query: String,
    /// Full fact table of every matching category
    pub results: BTreeMap<String, FactTable>,
}

/// Validated, immutable knowledge base
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeBase {
    categories: BTreeMap<String, FactTable>,
}

impl KnowledgeBase {
    /// Build a knowledge base, rejecting malformed entries
    ///
    /// Category names and keywords must be non-empty, every category must
    /// hold at least one fact, and keywords must already be lower-case since
    /// they are compared as-is against the lower-cased query.
    pub fn new(categories: BTreeMap<String, FactTable>) -> Result<Self> {
        for (category, facts) in &categories {
            if category.trim().is_empty() {
                return Err(ConciergeError::Configuration(
                    "knowledge base category names must not be empty".to_string(),
                ));
            }
            if facts.is_empty() {
                return Err(ConciergeError::Configuration(format!(
                    "knowledge base category '{}' has no facts",
                    category
                )));
            }
            for keyword in facts.keys() {
                if keyword.trim().is_empty() {
                    return Err(ConciergeError::Configuration(format!(
                        "knowledge base category '{}' has an empty keyword",
                        category
                    )));
                }
                if keyword.to_lowercase() != *keyword {
                    return Err(ConciergeError::Configuration(format!(
                        "knowledge base keyword '{}' in category '{}' must be lower-case",
                        keyword, category
                    )));
                }
            }
        }

        Ok(Self { categories })
    }

    /// An empty knowledge base; every query returns no results
    pub fn empty() -> Self {
        Self::default()
    }

    /// The reference data set used by the bundled server and CLI
    pub fn sample() -> Self {
        let categories = BTreeMap::from([
            (
                "faqs".to_string(),
                facts(&[
                    (
                        "return",
                        "Our return policy allows returns within 30 days of purchase.",
                    ),
                    (
                        "shipping",
                        "We ship worldwide with delivery times of 3-5 business days.",
                    ),
                ]),
            ),
            (
                "policies".to_string(),
                facts(&[
                    (
                        "privacy",
                        "We protect your data and never share it with third parties.",
                    ),
                    (
                        "terms",
                        "Our terms of service ensure fair usage of our platform.",
                    ),
                ]),
            ),
            (
                "products".to_string(),
                facts(&[
                    (
                        "electronics",
                        "We offer a wide range of electronic products.",
                    ),
                    ("clothing", "Our clothing line includes sizes XS to XXL."),
                ]),
            ),
        ]);

        Self { categories }
    }

    /// Parse a JSON or YAML document and validate it
    pub fn from_document(document: &str, format: DocumentFormat) -> Result<Self> {
        let categories: BTreeMap<String, FactTable> = match format {
            DocumentFormat::Json => serde_json::from_str(document)?,
            DocumentFormat::Yaml => serde_yaml::from_str(document).map_err(|e| {
                ConciergeError::Configuration(format!("invalid knowledge base YAML: {}", e))
            })?,
        };
        Self::new(categories)
    }

    /// Load the knowledge base file named by the configuration
    pub fn load(config: &KnowledgeBaseConfig) -> Result<Self> {
        let format = DocumentFormat::from_path(&config.path)?;
        let document = std::fs::read_to_string(&config.path)?;
        let kb = Self::from_document(&document, format)?;
        debug!(
            "Loaded knowledge base from {:?} with {} categories",
            config.path,
            kb.categories.len()
        );
        Ok(kb)
    }

    /// Find every category with a keyword contained in the query
    pub fn query(&self, text: &str) -> KnowledgeQueryResult {
        let lowered = text.to_lowercase();
        let results = self
            .categories
            .iter()
            .filter(|(_, facts)| facts.keys().any(|keyword| lowered.contains(keyword.as_str())))
            .map(|(category, facts)| (category.clone(), facts.clone()))
            .collect();

        KnowledgeQueryResult {
            query: text.to_string(),
            results,
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn category(&self, name: &str) -> Option<&FactTable> {
        self.categories.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Serialization format of a knowledge base document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Ok(DocumentFormat::Json),
            Some("yaml") | Some("yml") => Ok(DocumentFormat::Yaml),
            _ => Err(ConciergeError::Configuration(format!(
                "knowledge base file {:?} must end in .json, .yaml or .yml",
                path
            ))),
        }
    }
}

fn facts(pairs: &[(&str, &str)]) -> FactTable {
    pairs
        .iter()
        .map(|(keyword, fact)| (keyword.to_string(), fact.to_string()))
        .collect()
}
