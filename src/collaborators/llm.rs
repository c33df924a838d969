//! OpenAI-compatible language-model client.
//!
//! Speaks the chat-completions protocol against a configurable base URL, so
//! any compatible gateway works. Both operations return parseable JSON or
//! an error - fenced output is unwrapped here, but nothing beyond that is
//! repaired.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{LanguageModel, LlmError, ModelInput};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiModel {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiModel {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn chat(&self, instructions: &str, input: &ModelInput) -> Result<String, LlmError> {
        let mut user_text = input.text.clone();
        if let Some(file_url) = &input.file_url {
            // Compatible gateways fetch the document referenced inline.
            user_text.push_str(&format!("\n\nPaper PDF: {file_url}"));
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instructions.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            temperature: 0.7,
        };

        let response: ChatResponse = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| LlmError::Transport {
                message: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| LlmError::Transport {
                message: e.to_string(),
            })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::MalformedResponse {
                message: "empty completion".to_string(),
            })
    }

    /// Unwrap a possibly code-fenced completion into a JSON value.
    fn parse_json_response(content: &str) -> Result<Value, LlmError> {
        let stripped = strip_fences(content);
        serde_json::from_str(stripped).map_err(|e| {
            let preview: String = stripped.chars().take(200).collect();
            LlmError::MalformedResponse {
                message: format!("{e}: {preview}"),
            }
        })
    }
}

/// Strip markdown code fences (```json ... ``` or bare ```) from a model
/// completion, returning the inner text.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn analyze(&self, instructions: &str, input: &ModelInput) -> Result<Value, LlmError> {
        let content = self.chat(instructions, input).await?;
        Self::parse_json_response(&content)
    }

    async fn write(&self, instructions: &str, input: &ModelInput) -> Result<Value, LlmError> {
        let content = self.chat(instructions, input).await?;
        Self::parse_json_response(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_json() {
        let value = OpenAiModel::parse_json_response(r#"{"summary": "s"}"#).unwrap();
        assert_eq!(value, json!({"summary": "s"}));
    }

    #[test]
    fn parses_fenced_json() {
        let value =
            OpenAiModel::parse_json_response("```json\n{\"summary\": \"s\"}\n```").unwrap();
        assert_eq!(value, json!({"summary": "s"}));

        let value = OpenAiModel::parse_json_response("```\n{\"k\": 1}\n```").unwrap();
        assert_eq!(value, json!({"k": 1}));
    }

    #[test]
    fn rejects_prose() {
        assert!(matches!(
            OpenAiModel::parse_json_response("I could not analyze this paper."),
            Err(LlmError::MalformedResponse { .. })
        ));
    }
}
