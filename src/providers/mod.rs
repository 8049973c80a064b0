//! Provider abstraction over language-model backends
//!
//! A [`Provider`] turns a prompt plus conversation context into a reply.
//! Instances are built from named configuration through a [`ProviderRegistry`]
//! that maps a kind string to a factory. Builtin kinds are registered by
//! default; hosts extend the registry with pre-built factories at startup
//! instead of resolving types by name at runtime.

pub mod azure;
pub mod openai;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dialogue::Message;
use crate::{Error, Result};

/// A single provider setting: free-form text or a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Text(String),
    Number(f64),
}

impl SettingValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

/// Configuration for one named provider, immutable after construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind, e.g. "openai" or "azure"
    #[serde(rename = "type")]
    pub kind: String,

    /// Kind-specific settings (API keys, models, endpoints)
    #[serde(default)]
    pub settings: BTreeMap<String, SettingValue>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            settings: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: SettingValue) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Text value of a setting, if present and textual
    #[must_use]
    pub fn text_setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(SettingValue::as_str)
    }

    /// Numeric value of a setting, if present and numeric
    #[must_use]
    pub fn number_setting(&self, key: &str) -> Option<f64> {
        self.settings.get(key).and_then(SettingValue::as_f64)
    }

    /// Whether every named setting is present with a non-empty text value
    #[must_use]
    pub fn has_text_settings(&self, keys: &[&str]) -> bool {
        keys.iter()
            .all(|k| self.text_setting(k).is_some_and(|v| !v.is_empty()))
    }

    fn require_text(&self, key: &str) -> Result<&str> {
        self.text_setting(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "provider `{}` missing required setting `{key}`",
                    self.kind
                ))
            })
    }
}

/// Options applied to a single generation call
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Max tokens in the reply
    pub max_tokens: u32,

    /// Sampling temperature override
    pub temperature: Option<f32>,

    /// Response timeout; expiry is a provider failure, not a retry
    pub timeout: Duration,

    /// System prompt prepended to the wire messages
    pub system_prompt: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: None,
            timeout: Duration::from_secs(30),
            system_prompt: None,
        }
    }
}

/// A pluggable component that turns a prompt plus context into a reply
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider kind identifier
    fn kind(&self) -> &'static str;

    /// Generate a reply for `prompt` given prior conversation `context`
    /// (chronological, not including the prompt itself).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] on transport failure, authentication
    /// failure, timeout, or a malformed upstream response.
    async fn generate(
        &self,
        prompt: &str,
        context: &[Message],
        options: &GenerateOptions,
    ) -> Result<String>;
}

/// Factory building a provider instance from validated configuration
pub type ProviderFactory = Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn Provider>> + Send + Sync>;

/// Registry of provider kinds
///
/// This is the system's only extension point for custom backends: hosts
/// register a factory for their kind before building providers.
#[derive(Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Empty registry with no kinds
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the builtin kinds (`openai`, `azure`)
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(openai::OpenAiProvider::KIND, Arc::new(build_openai));
        registry.register(azure::AzureProvider::KIND, Arc::new(build_azure));
        registry
    }

    /// Register a factory for a kind, replacing any existing one
    pub fn register(&mut self, kind: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(kind.into(), factory);
    }

    /// Whether a kind is registered
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build a provider instance from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown kind, failed validation, or
    /// a factory construction failure.
    pub fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
        let factory = self.factories.get(&config.kind).ok_or_else(|| {
            Error::Config(format!("unknown provider type: `{}`", config.kind))
        })?;
        factory(config)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

fn build_openai(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(openai::OpenAiProvider::from_config(config)?))
}

fn build_azure(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(azure::AzureProvider::from_config(config)?))
}
