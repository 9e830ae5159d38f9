//! OpenAI-compatible wire types shared by both providers.
//!
//! Hosted OpenAI and local servers (LM Studio et al.) accept the same
//! `/chat/completions` and `/embeddings` payloads, so the request/response
//! shapes live here once. Tool-call plumbing follows the OpenAI function
//! calling JSON: the assistant message may carry `tool_calls`, and the
//! caller answers each with a `role: "tool"` message keyed by call id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::llm_model_config::LlmModelConfig;

/// One chat message. Owned, so agent loops can accumulate a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// Tool output answering one call from the assistant.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A function tool offered to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    /// Always `"function"` on the current wire.
    pub r#type: &'static str,
    pub function: ToolFunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolFunctionSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            r#type: "function",
            function: ToolFunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(default = "tool_call_type")]
    pub r#type: String,
    pub function: ToolCallFunction,
}

fn tool_call_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON-encoded arguments object, verbatim from the model.
    pub arguments: String,
}

/// What a chat completion produced: final text, or tool calls to execute.
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    Content(String),
    ToolCalls(Vec<ToolCall>),
}

/// Request body for `/chat/completions` (non-streaming).
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [ToolSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    pub fn from_cfg(
        cfg: &'a LlmModelConfig,
        messages: &'a [ChatMessage],
        tools: Option<&'a [ToolSpec]>,
    ) -> Self {
        Self {
            model: &cfg.model,
            messages,
            tools,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
        }
    }
}

/// Minimal response for `/chat/completions`.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageOut {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatCompletionResponse {
    /// Collapse choices into a [`ChatOutcome`]: tool calls win over content.
    pub fn into_outcome(self) -> Option<ChatOutcome> {
        let message = self.choices.into_iter().next()?.message;
        if let Some(calls) = message.tool_calls.filter(|c| !c.is_empty()) {
            return Some(ChatOutcome::ToolCalls(calls));
        }
        message.content.map(ChatOutcome::Content)
    }
}

/// Request body for `/embeddings`; `input` is always an array.
#[derive(Debug, Serialize)]
pub struct EmbeddingsRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

/// Response body for `/embeddings`.
#[derive(Debug, Deserialize)]
pub struct EmbeddingsResponse {
    pub data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingItem {
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_calls_win_over_content() {
        let resp: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": "ignored",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "read_file", "arguments": "{\"path\":\"a.rs\"}" }
                    }]
                }
            }]
        }))
        .unwrap();
        match resp.into_outcome() {
            Some(ChatOutcome::ToolCalls(calls)) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].function.name, "read_file");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn plain_content_round_trips() {
        let resp: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": "{\"ok\":true}" } }]
        }))
        .unwrap();
        match resp.into_outcome() {
            Some(ChatOutcome::Content(text)) => assert_eq!(text, "{\"ok\":true}"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn tool_message_serializes_with_call_id() {
        let msg = ChatMessage::tool("call_9", "result text");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "call_9");
        assert!(v.get("tool_calls").is_none());
    }
}
