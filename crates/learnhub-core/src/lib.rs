pub mod config;
pub mod error;
pub mod types;

pub use config::Settings;
pub use error::{LearnHubError, Result};
pub use types::{
    AssistantAnnotation, AssistantResponsePayload, ChatCompletionResult, ChatCompletionUsage,
    ChatMessage, NormalizationResult, Role,
};
