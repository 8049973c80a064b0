//! Azure OpenAI deployment backend

use async_trait::async_trait;

use super::openai::{ChatRequest, ChatResponse, build_messages, extract_reply};
use super::{GenerateOptions, Provider, ProviderConfig};
use crate::dialogue::Message;
use crate::{Error, Result};

const DEFAULT_API_VERSION: &str = "2023-05-15";

/// Provider backed by an Azure OpenAI deployment
pub struct AzureProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    deployment_name: String,
    api_version: String,
    temperature: Option<f32>,
}

impl AzureProvider {
    pub const KIND: &'static str = "azure";

    /// Pure check of required settings presence
    #[must_use]
    pub fn validate_config(config: &ProviderConfig) -> bool {
        config.has_text_settings(&["api_key", "endpoint", "deployment_name"])
    }

    /// Build from configuration.
    ///
    /// Recognized settings: `api_key`, `endpoint`, `deployment_name`
    /// (required), `temperature`, `api_version` (optional).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required settings are missing or empty.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if !Self::validate_config(config) {
            return Err(Error::Config(
                "azure provider requires `api_key`, `endpoint` and `deployment_name` settings"
                    .to_string(),
            ));
        }

        #[allow(clippy::cast_possible_truncation)]
        let temperature = config.number_setting("temperature").map(|t| t as f32);

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: config.text_setting("api_key").unwrap_or_default().to_string(),
            endpoint: config
                .text_setting("endpoint")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            deployment_name: config
                .text_setting("deployment_name")
                .unwrap_or_default()
                .to_string(),
            api_version: config
                .text_setting("api_version")
                .unwrap_or(DEFAULT_API_VERSION)
                .to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl Provider for AzureProvider {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn generate(
        &self,
        prompt: &str,
        context: &[Message],
        options: &GenerateOptions,
    ) -> Result<String> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment_name, self.api_version
        );

        tracing::debug!(
            deployment = %self.deployment_name,
            context_len = context.len(),
            "requesting azure completion"
        );

        // The deployment selects the model on Azure
        let request = ChatRequest {
            model: None,
            messages: build_messages(options.system_prompt.as_deref(), context, prompt),
            max_tokens: options.max_tokens,
            temperature: options.temperature.or(self.temperature),
        };

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "azure request failed");
                if e.is_timeout() {
                    Error::Provider(format!("azure request timed out: {e}"))
                } else {
                    Error::Provider(format!("azure request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "azure API error");
            return Err(Error::Provider(format!("azure API error {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("malformed azure response: {e}")))?;

        extract_reply(parsed, "azure")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SettingValue;

    fn config() -> ProviderConfig {
        ProviderConfig::new("azure")
            .with_setting("api_key", SettingValue::Text("key".to_string()))
            .with_setting(
                "endpoint",
                SettingValue::Text("https://example.openai.azure.com/".to_string()),
            )
            .with_setting(
                "deployment_name",
                SettingValue::Text("gpt-4o".to_string()),
            )
    }

    #[test]
    fn test_validate_config_requires_deployment_fields() {
        assert!(AzureProvider::validate_config(&config()));

        let missing_endpoint = ProviderConfig::new("azure")
            .with_setting("api_key", SettingValue::Text("key".to_string()))
            .with_setting(
                "deployment_name",
                SettingValue::Text("gpt-4o".to_string()),
            );
        assert!(!AzureProvider::validate_config(&missing_endpoint));
    }

    #[test]
    fn test_from_config_normalizes_endpoint() {
        let provider = AzureProvider::from_config(&config()).unwrap();
        assert_eq!(provider.endpoint, "https://example.openai.azure.com");
        assert_eq!(provider.api_version, DEFAULT_API_VERSION);
    }
}
