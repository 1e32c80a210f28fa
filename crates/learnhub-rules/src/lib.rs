pub mod document;
pub mod normalize;
pub mod rewrite;
pub mod rider;
pub mod store;

pub use document::{Entity, ExpandRef, Normalization, QueryExpansion, RulesDocument};
pub use normalize::normalize_and_expand_query;
pub use rewrite::{rewrite_messages_with_rules, RewriteOutcome};
pub use rider::build_rules_rider;
pub use store::RulesStore;
