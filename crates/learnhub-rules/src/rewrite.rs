use crate::normalize::normalize_and_expand_query;
use crate::rider::build_rules_rider;
use crate::store::RulesStore;
use learnhub_core::{ChatMessage, Role};

/// A rewritten message sequence plus the normalization byproducts for
/// caller-side logging.
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub messages: Vec<ChatMessage>,
    pub normalized: Option<String>,
    pub expanded: Option<Vec<String>>,
}

/// Inject the rules rider and rewrite the most recent user turn.
///
/// The rider is prepended as a single system message. The last user turn is
/// replaced with a block carrying the original question, its normalized
/// form, and (when present) expansion hints; every other turn is untouched.
/// Without a user turn only the rider is injected.
pub fn rewrite_messages_with_rules(messages: &[ChatMessage], store: &RulesStore) -> RewriteOutcome {
    let rules = store.load();
    let rider = build_rules_rider(&rules);

    let mut out = messages.to_vec();
    let Some(last_user_idx) = out.iter().rposition(|m| m.role == Role::User) else {
        out.insert(0, ChatMessage::system(rider));
        return RewriteOutcome {
            messages: out,
            normalized: None,
            expanded: None,
        };
    };

    let original = out[last_user_idx].content.clone();
    let result = normalize_and_expand_query(&original, &rules);

    let mut augmented = format!(
        "User question: {original}\nNormalized: {}",
        result.normalized
    );
    if result.expanded.len() > 1 {
        augmented.push_str(&format!("\nExpanded hints: {}", result.expanded.join(" | ")));
    }
    augmented.push_str("\nIf helpful, use the expansions as search hints.");

    out[last_user_idx] = ChatMessage::user(augmented);
    out.insert(0, ChatMessage::system(rider));

    RewriteOutcome {
        messages: out,
        normalized: Some(result.normalized),
        expanded: Some(result.expanded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn store_with_rules(dir: &tempfile::TempDir, body: &str) -> RulesStore {
        let path: PathBuf = dir.path().join("rules.json");
        fs::write(&path, body).unwrap();
        RulesStore::new(path)
    }

    fn sample_store(dir: &tempfile::TempDir) -> RulesStore {
        store_with_rules(
            dir,
            r#"{
                "normalization": {"products": {"FC": "Fabric Connect"}},
                "entities": {
                    "voss": {"canonical": "Fabric Engine (VOSS)", "synonyms": ["VOSS"]}
                },
                "query_expansion": {
                    "expand_if_absent": [{"entity": "voss"}],
                    "max_added_terms": 4
                }
            }"#,
        )
    }

    #[test]
    fn prepends_exactly_one_system_message() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        let input = vec![
            ChatMessage::user("What is FC?"),
            ChatMessage::assistant("Fabric Connect is..."),
            ChatMessage::user("More detail please"),
        ];

        let outcome = rewrite_messages_with_rules(&input, &store);

        assert_eq!(outcome.messages.len(), input.len() + 1);
        assert_eq!(outcome.messages[0].role, Role::System);
        let system_count = outcome
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(system_count, 1);
    }

    #[test]
    fn non_system_message_count_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        let input = vec![
            ChatMessage::system("existing instructions"),
            ChatMessage::user("What is FC?"),
            ChatMessage::assistant("answer"),
        ];

        let outcome = rewrite_messages_with_rules(&input, &store);

        let count = |msgs: &[ChatMessage]| msgs.iter().filter(|m| m.role != Role::System).count();
        assert_eq!(count(&outcome.messages), count(&input));
    }

    #[test]
    fn only_the_last_user_turn_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        let input = vec![
            ChatMessage::user("first question about FC"),
            ChatMessage::assistant("an answer"),
            ChatMessage::user("what about FC licensing"),
        ];

        let outcome = rewrite_messages_with_rules(&input, &store);

        // offset by the prepended rider
        assert_eq!(outcome.messages[1].content, "first question about FC");
        assert_eq!(outcome.messages[2].content, "an answer");
        let rewritten = &outcome.messages[3].content;
        assert!(rewritten.starts_with("User question: what about FC licensing\n"));
        assert!(rewritten.contains("Normalized: what about Fabric Connect licensing"));
        assert!(rewritten.contains("Expanded hints: "));
        assert!(rewritten.ends_with("If helpful, use the expansions as search hints."));
        assert_eq!(outcome.normalized.as_deref(), Some("what about Fabric Connect licensing"));
    }

    #[test]
    fn hint_line_is_omitted_when_nothing_expands() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        let input = vec![ChatMessage::user("Tell me about VOSS")];

        let outcome = rewrite_messages_with_rules(&input, &store);

        let rewritten = &outcome.messages[1].content;
        assert!(!rewritten.contains("Expanded hints"));
        assert_eq!(outcome.expanded.as_deref(), Some(&["Tell me about VOSS".to_string()][..]));
    }

    #[test]
    fn without_user_turn_only_the_rider_is_injected() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        let input = vec![ChatMessage::assistant("welcome aboard")];

        let outcome = rewrite_messages_with_rules(&input, &store);

        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[0].role, Role::System);
        assert_eq!(outcome.messages[1].content, "welcome aboard");
        assert!(outcome.normalized.is_none());
        assert!(outcome.expanded.is_none());
    }
}
