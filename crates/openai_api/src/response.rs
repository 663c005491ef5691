use serde::{Deserialize, Serialize};

use crate::payload::Role;

/// Finish reason meaning the model stopped on the token limit.
pub const FINISH_REASON_LENGTH: &str = "length";

/// Uniform view over one-shot responses and streamed chunks.
pub trait CompletionChunk {
    /// Text carried by the first choice; empty when absent.
    fn text(&self) -> &str;

    /// Role of the first choice, for response shapes that carry one.
    fn role(&self) -> Option<Role>;

    /// True while no finish reason was reported, or the model hit its token limit.
    fn can_continue(&self) -> bool;

    /// Cumulative token usage, 0 when the server omitted it.
    fn total_tokens(&self) -> u64;

    /// Clear every field so the next chunk starts from nothing.
    fn reset(&mut self);
}

fn can_continue_after(finish_reason: Option<&str>) -> bool {
    match finish_reason {
        None | Some("") => true,
        Some(reason) => reason == FINISH_REASON_LENGTH,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Message body of a one-shot choice, or the delta of a streamed one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<MessageContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatChoice {
    fn body(&self) -> Option<&MessageContent> {
        self.delta.as_ref().or(self.message.as_ref())
    }
}

/// `/chat/completions` response, both whole and as a stream chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CompletionChunk for ChatCompletionResponse {
    fn text(&self) -> &str {
        self.choices
            .first()
            .and_then(ChatChoice::body)
            .and_then(|body| body.content.as_deref())
            .unwrap_or("")
    }

    fn role(&self) -> Option<Role> {
        self.choices
            .first()
            .and_then(ChatChoice::body)
            .and_then(|body| body.role)
    }

    fn can_continue(&self) -> bool {
        self.choices
            .first()
            .is_some_and(|choice| can_continue_after(choice.finish_reason.as_deref()))
    }

    fn total_tokens(&self) -> u64 {
        self.usage.as_ref().map_or(0, |usage| usage.total_tokens)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Legacy `/engines/{engine}/completions` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<TextChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CompletionChunk for TextCompletionResponse {
    fn text(&self) -> &str {
        self.choices
            .first()
            .map_or("", |choice| choice.text.as_str())
    }

    fn role(&self) -> Option<Role> {
        None
    }

    fn can_continue(&self) -> bool {
        self.choices
            .first()
            .is_some_and(|choice| can_continue_after(choice.finish_reason.as_deref()))
    }

    fn total_tokens(&self) -> u64 {
        self.usage.as_ref().map_or(0, |usage| usage.total_tokens)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatCompletionResponse, CompletionChunk, TextCompletionResponse};
    use crate::payload::Role;

    #[test]
    fn chat_delta_accessors() {
        let chunk: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.text(), "Hi");
        assert_eq!(chunk.role(), Some(Role::Assistant));
        assert!(chunk.can_continue());
        assert_eq!(chunk.total_tokens(), 0);
    }

    #[test]
    fn chat_message_accessors_with_usage() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"id":"c1","choices":[{"message":{"role":"assistant","content":"done"},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "done");
        assert!(!response.can_continue());
        assert_eq!(response.total_tokens(), 5);
    }

    #[test]
    fn text_completion_truncated_by_length_can_continue() {
        let mut response: TextCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"text":"abc","index":0,"finish_reason":"length"}]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "abc");
        assert!(response.can_continue());

        response.reset();
        assert_eq!(response, TextCompletionResponse::default());
        assert_eq!(response.text(), "");
    }
}
