use crate::document::RulesDocument;
use learnhub_core::NormalizationResult;
use regex::{NoExpand, Regex, RegexBuilder};

/// Build a whole-word, case-insensitive matcher for a literal term.
///
/// Word boundaries keep partial tokens intact: "VOSSx" never matches an
/// alias "VOSS".
fn word_regex(term: &str) -> Option<Regex> {
    if term.is_empty() {
        return None;
    }
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
        .case_insensitive(true)
        .build()
        .ok()
}

fn contains_word(haystack: &str, term: &str) -> bool {
    word_regex(term).is_some_and(|re| re.is_match(haystack))
}

/// Normalize a raw query against the rules and derive bounded search hints.
///
/// Aliases are rewritten to canonical forms (products before licensing, in
/// document order), absent entities are queued as expansion terms, negative
/// guards prune the combined list, and the result is truncated to
/// `1 + max_added_terms` entries. Slot 0 holds the normalized query itself;
/// the guard applies to the whole list, so the base entry is filterable too.
pub fn normalize_and_expand_query(query: &str, rules: &RulesDocument) -> NormalizationResult {
    let mut out = query.to_string();

    let alias_tables = rules
        .normalization
        .products
        .iter()
        .chain(rules.normalization.licensing.iter());
    for (alias, canonical) in alias_tables {
        if let Some(re) = word_regex(alias) {
            // NoExpand: canonical forms are literal text, not capture templates
            out = re.replace_all(&out, NoExpand(canonical)).into_owned();
        }
    }

    let mut additions: Vec<String> = Vec::new();
    for reference in &rules.query_expansion.expand_if_absent {
        let Some(entity) = rules.entities.get(&reference.entity) else {
            continue;
        };
        let mut terms = Vec::with_capacity(1 + entity.synonyms.len());
        terms.push(entity.canonical.clone());
        terms.extend(entity.synonyms.iter().cloned());

        let already_present = terms.iter().any(|term| contains_word(&out, term));
        if !already_present {
            additions.extend(terms);
        }
    }

    // Guard compilation is validated at document load; a failure here means
    // the document bypassed the store, so fall back to no filtering.
    let guard = rules.negative_guard().ok().flatten();
    let passes_guard = |term: &String| guard.as_ref().map_or(true, |re| !re.is_match(term));

    let mut expanded: Vec<String> = std::iter::once(out.clone())
        .chain(additions)
        .filter(passes_guard)
        .collect();
    expanded.truncate(1 + rules.query_expansion.max_added_terms);

    NormalizationResult {
        normalized: out,
        expanded,
    }
}
