use crate::chat::{ChatClient, ChatCompletionOptions};
use learnhub_core::{ChatCompletionResult, ChatMessage, Result};

/// Second-pass reviewer instruction. Biases the model toward network
/// infrastructure engineering review and fully elaborated configuration
/// steps.
const REVIEWER_SYSTEM_PROMPT: &str = "In the best of your ability as Network Infrastructure \
Engineer and Network Infrastructure Architecture, please review the user's request plus this \
already provided assistant response information and formulate your facts. If your facts include \
detailed configuration steps please make sure to provide those details along with an explanation \
of that configuration.";

/// Feed the assistant's output plus the original request back through chat
/// completions for a reviewed, elaborated answer.
///
/// Uses the client's default temperature controls; no value is forced here.
pub async fn refine_assistant_output(
    chat: &ChatClient,
    user_request: &str,
    assistant_output: &str,
) -> Result<ChatCompletionResult> {
    let review_prompt = format!(
        "User request:\n{user_request}\n\nAssistant response to review:\n{assistant_output}"
    );
    let messages = vec![
        ChatMessage::system(REVIEWER_SYSTEM_PROMPT),
        ChatMessage::user(review_prompt),
    ];
    chat.create(&messages, &ChatCompletionOptions::default()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn review_turn_carries_both_labeled_sections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system", "content": REVIEWER_SYSTEM_PROMPT},
                    {
                        "role": "user",
                        "content": "User request:\nwhat is SPB\n\nAssistant response to review:\nSPB is shortest path bridging."
                    }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4o-mini",
                "choices": [{"message": {"role": "assistant", "content": "reviewed answer"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chat = ChatClient::new(ChatConfig {
            api_key: "test-key".to_string(),
            base_url: server.uri(),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap();

        let result =
            refine_assistant_output(&chat, "what is SPB", "SPB is shortest path bridging.")
                .await
                .unwrap();
        assert_eq!(result.content, "reviewed answer");
        assert_eq!(result.usage.unwrap().total_tokens, Some(8));
    }
}
