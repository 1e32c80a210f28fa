use crate::document::RulesDocument;

/// Products the retrieval corpus covers best; listed in the rider so the
/// assistant prefers their documentation when sources conflict.
const PREFERRED_PRODUCTS: [&str; 4] = [
    "Fabric Connect",
    "ExtremeCloud IQ Site Engine",
    "Switch Engine (EXOS)",
    "Fabric Engine (VOSS)",
];

/// Cap on listed terms so the rider stays a bounded prompt prefix.
const MAX_LISTED_TERMS: usize = 40;

/// Render the grounding rider injected ahead of every assistant exchange.
///
/// Pure function of the rules document: canonical entity names, product
/// alias mappings, the preferred-product list, and the citation rule.
pub fn build_rules_rider(rules: &RulesDocument) -> String {
    let canonicals = rules
        .entities
        .values()
        .map(|entity| entity.canonical.as_str())
        .filter(|canonical| !canonical.is_empty())
        .take(MAX_LISTED_TERMS)
        .collect::<Vec<_>>()
        .join(", ");

    let aliases = rules
        .normalization
        .products
        .iter()
        .map(|(alias, canonical)| format!("{alias}→{canonical}"))
        .take(MAX_LISTED_TERMS)
        .collect::<Vec<_>>()
        .join("; ");

    let preferred = PREFERRED_PRODUCTS.join(", ");

    [
        "You are answering Extreme Networks questions grounded in attached File Search results."
            .to_string(),
        "Follow these rules:".to_string(),
        format!("- Use canonical names from this list: {canonicals}."),
        format!("- Treat these as aliases: {aliases}."),
        format!("- Prefer docs matching products or terms: {preferred}."),
        "- Cite title + page for any hard facts; if firmware differs, state version-specific results."
            .to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rider_lists_canonicals_and_aliases_in_document_order() {
        let rules: RulesDocument = serde_json::from_str(
            r#"{
                "entities": {
                    "fc": {"canonical": "Fabric Connect"},
                    "voss": {"canonical": "Fabric Engine (VOSS)"}
                },
                "normalization": {"products": {"FC": "Fabric Connect", "XIQ-SE": "ExtremeCloud IQ Site Engine"}}
            }"#,
        )
        .unwrap();

        let rider = build_rules_rider(&rules);
        assert!(rider.contains("canonical names from this list: Fabric Connect, Fabric Engine (VOSS)."));
        assert!(rider.contains("aliases: FC→Fabric Connect; XIQ-SE→ExtremeCloud IQ Site Engine."));
        assert!(rider.contains("Cite title + page"));
    }

    #[test]
    fn rider_is_deterministic_for_empty_rules() {
        let a = build_rules_rider(&RulesDocument::default());
        let b = build_rules_rider(&RulesDocument::default());
        assert_eq!(a, b);
        assert!(a.contains("Prefer docs matching products or terms: Fabric Connect,"));
    }

    #[test]
    fn listed_terms_are_capped() {
        let entities = (0..60)
            .map(|i| format!(r#""e{i}": {{"canonical": "Entity {i}"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        let rules: RulesDocument =
            serde_json::from_str(&format!(r#"{{"entities": {{{entities}}}}}"#)).unwrap();

        let rider = build_rules_rider(&rules);
        assert!(rider.contains("Entity 39"));
        assert!(!rider.contains("Entity 40"));
    }
}
