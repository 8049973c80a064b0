//! OpenAI chat completion backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerateOptions, Provider, ProviderConfig};
use crate::dialogue::Message;
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat completion request body (OpenAI wire format, shared with Azure)
#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) model: Option<&'a str>,
    pub(crate) messages: Vec<WireMessage<'a>>,
    pub(crate) max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) temperature: Option<f32>,
}

#[derive(Serialize)]
pub(crate) struct WireMessage<'a> {
    pub(crate) role: &'a str,
    pub(crate) content: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub(crate) choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub(crate) struct Choice {
    pub(crate) message: ChoiceMessage,
}

#[derive(Deserialize)]
pub(crate) struct ChoiceMessage {
    pub(crate) content: Option<String>,
}

/// Assemble wire messages: optional system prompt, prior context, then the prompt
pub(crate) fn build_messages<'a>(
    system_prompt: Option<&'a str>,
    context: &'a [Message],
    prompt: &'a str,
) -> Vec<WireMessage<'a>> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        messages.push(WireMessage {
            role: "system",
            content: system,
        });
    }
    for message in context {
        messages.push(WireMessage {
            role: message.role.as_str(),
            content: &message.content,
        });
    }
    messages.push(WireMessage {
        role: "user",
        content: prompt,
    });
    messages
}

/// Pull the first choice's text out of a chat completion response
pub(crate) fn extract_reply(response: ChatResponse, backend: &str) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| Error::Provider(format!("{backend} returned an empty response")))
}

/// Provider backed by the OpenAI chat completions API
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiProvider {
    pub const KIND: &'static str = "openai";

    /// Pure check of required settings presence
    #[must_use]
    pub fn validate_config(config: &ProviderConfig) -> bool {
        config.has_text_settings(&["api_key", "model"])
    }

    /// Build from configuration.
    ///
    /// Recognized settings: `api_key`, `model` (required), `temperature`,
    /// `base_url` (optional, for compatible self-hosted endpoints).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required settings are missing or empty.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if !Self::validate_config(config) {
            return Err(Error::Config(
                "openai provider requires `api_key` and `model` settings".to_string(),
            ));
        }

        #[allow(clippy::cast_possible_truncation)]
        let temperature = config.number_setting("temperature").map(|t| t as f32);
        let base_url = config
            .text_setting("base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: config.text_setting("api_key").unwrap_or_default().to_string(),
            model: config.text_setting("model").unwrap_or_default().to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &[Message],
        options: &GenerateOptions,
    ) -> Result<String> {
        tracing::debug!(
            model = %self.model,
            context_len = context.len(),
            "requesting openai completion"
        );

        let request = ChatRequest {
            model: Some(&self.model),
            messages: build_messages(options.system_prompt.as_deref(), context, prompt),
            max_tokens: options.max_tokens,
            temperature: options.temperature.or(self.temperature),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "openai request failed");
                if e.is_timeout() {
                    Error::Provider(format!("openai request timed out: {e}"))
                } else {
                    Error::Provider(format!("openai request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "openai API error");
            return Err(Error::Provider(format!("openai API error {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("malformed openai response: {e}")))?;

        extract_reply(parsed, "openai")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SettingValue;

    fn config() -> ProviderConfig {
        ProviderConfig::new("openai")
            .with_setting("api_key", SettingValue::Text("sk-test".to_string()))
            .with_setting("model", SettingValue::Text("gpt-4o-mini".to_string()))
    }

    #[test]
    fn test_validate_config_requires_key_and_model() {
        assert!(OpenAiProvider::validate_config(&config()));
        assert!(!OpenAiProvider::validate_config(&ProviderConfig::new(
            "openai"
        )));
    }

    #[test]
    fn test_from_config_reads_optional_settings() {
        let provider = OpenAiProvider::from_config(
            &config()
                .with_setting("temperature", SettingValue::Number(0.5))
                .with_setting(
                    "base_url",
                    SettingValue::Text("http://localhost:8080/v1/".to_string()),
                ),
        )
        .unwrap();

        assert_eq!(provider.temperature, Some(0.5));
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_build_messages_order() {
        use crate::dialogue::MessageRole;
        use chrono::Utc;

        let context = vec![
            Message {
                role: MessageRole::User,
                content: "hi".to_string(),
                timestamp: Utc::now(),
            },
            Message {
                role: MessageRole::Assistant,
                content: "hello".to_string(),
                timestamp: Utc::now(),
            },
        ];

        let messages = build_messages(Some("be brief"), &context, "what time is it?");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "what time is it?");
    }

    #[test]
    fn test_extract_reply_rejects_empty() {
        let response = ChatResponse { choices: vec![] };
        assert!(matches!(
            extract_reply(response, "openai"),
            Err(Error::Provider(_))
        ));

        let response = ChatResponse {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some("ok".to_string()),
                },
            }],
        };
        assert_eq!(extract_reply(response, "openai").unwrap(), "ok");
    }
}
