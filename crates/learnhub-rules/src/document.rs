use indexmap::IndexMap;
use learnhub_core::{LearnHubError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// The JSON rules document driving query normalization and expansion.
///
/// Map fields preserve document order: alias precedence, expansion order,
/// and rider output all follow the order rules are written in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesDocument {
    #[serde(default)]
    pub entities: IndexMap<String, Entity>,
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default)]
    pub negatives: Vec<String>,
    #[serde(default)]
    pub query_expansion: QueryExpansion,
}

/// A domain entity with its preferred surface form and known synonyms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub canonical: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Normalization {
    /// Product alias -> canonical name; applied before licensing
    #[serde(default)]
    pub products: IndexMap<String, String>,
    #[serde(default)]
    pub licensing: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExpansion {
    #[serde(default)]
    pub expand_if_absent: Vec<ExpandRef>,
    #[serde(default = "default_max_added_terms")]
    pub max_added_terms: usize,
}

impl Default for QueryExpansion {
    fn default() -> Self {
        Self {
            expand_if_absent: Vec::new(),
            max_added_terms: default_max_added_terms(),
        }
    }
}

fn default_max_added_terms() -> usize {
    8
}

/// Reference to an `entities` key. Unresolvable references are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandRef {
    pub entity: String,
}

impl RulesDocument {
    /// Compile the negative guards into a single OR'd case-insensitive regex.
    ///
    /// Returns `None` when no guards are configured.
    pub fn negative_guard(&self) -> Result<Option<Regex>> {
        if self.negatives.is_empty() {
            return Ok(None);
        }
        let pattern = self.negatives.join("|");
        let guard = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|err| {
                LearnHubError::Configuration(format!("invalid negative guard pattern: {err}"))
            })?;
        Ok(Some(guard))
    }

    /// Reject documents whose guards would fail at query time.
    pub fn validate(&self) -> Result<()> {
        self.negative_guard().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_all_sections_absent() {
        let doc: RulesDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.entities.is_empty());
        assert!(doc.negatives.is_empty());
        assert_eq!(doc.query_expansion.max_added_terms, 8);
    }

    #[test]
    fn normalization_tables_keep_document_order() {
        let doc: RulesDocument = serde_json::from_str(
            r#"{"normalization":{"products":{"z-alias":"Z","a-alias":"A","m-alias":"M"}}}"#,
        )
        .unwrap();
        let keys: Vec<&str> = doc
            .normalization
            .products
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["z-alias", "a-alias", "m-alias"]);
    }

    #[test]
    fn invalid_negative_pattern_fails_validation() {
        let doc: RulesDocument = serde_json::from_str(r#"{"negatives":["[unclosed"]}"#).unwrap();
        assert!(doc.validate().is_err());
    }

    #[test]
    fn negative_guard_is_case_insensitive() {
        let doc: RulesDocument = serde_json::from_str(r#"{"negatives":["legacy"]}"#).unwrap();
        let guard = doc.negative_guard().unwrap().unwrap();
        assert!(guard.is_match("LEGACY firmware"));
    }
}
