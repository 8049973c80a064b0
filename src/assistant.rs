//! Assistant orchestrator
//!
//! Drives the listen → process → speak loop, routing recognized text through
//! the dialogue manager and the cached provider, and handing replies to the
//! synthesizer. One instance runs one strictly sequential turn at a time;
//! replies land in the session in the order their prompts were heard.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::cache::CachedProvider;
use crate::config::Config;
use crate::dialogue::{DialogueManager, MessageRole};
use crate::monitor::{PerformanceMonitor, PerformanceSnapshot};
use crate::providers::{GenerateOptions, Provider};
use crate::voice::{Recognizer, Synthesizer};
use crate::{Error, Result, network};

/// Name of the conversation history artifact written on shutdown
pub const HISTORY_FILE: &str = "conversation_history.json";

/// Name of the performance artifact written on shutdown
pub const PERFORMANCE_FILE: &str = "performance_report.json";

/// Orchestrator life cycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantState {
    Idle,
    Listening,
    Processing,
    Speaking,
    Error,
    Terminated,
}

/// Point-in-time status report
#[derive(Debug, Serialize)]
pub struct AssistantStatus {
    pub state: AssistantState,
    pub uptime_secs: u64,
    pub session_id: String,
    pub provider: &'static str,
    pub config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSnapshot>,
}

/// The assistant orchestrator
pub struct Assistant {
    config: Config,
    dialogue: DialogueManager,
    provider: CachedProvider,
    recognizer: Box<dyn Recognizer>,
    synthesizer: Box<dyn Synthesizer>,
    monitor: Option<PerformanceMonitor>,
    options: GenerateOptions,
    state: AssistantState,
    session_id: String,
    started: Instant,
    cleaned_up: bool,
}

impl Assistant {
    /// Build an assistant from injected collaborators.
    ///
    /// The provider is wrapped in a transparent response cache; a fresh
    /// session is created for the local user.
    #[must_use]
    pub fn new(
        config: Config,
        provider: Arc<dyn Provider>,
        recognizer: Box<dyn Recognizer>,
        synthesizer: Box<dyn Synthesizer>,
    ) -> Self {
        let dialogue = DialogueManager::new();
        let session_id = dialogue.create_session("local");

        let options = GenerateOptions {
            max_tokens: config.max_tokens,
            temperature: None,
            timeout: config.response_timeout(),
            system_prompt: Some(config.system_prompt.clone()),
        };

        let monitor = config.enable_monitoring.then(PerformanceMonitor::new);
        let provider = CachedProvider::new(provider, &config.cache);

        Self {
            config,
            dialogue,
            provider,
            recognizer,
            synthesizer,
            monitor,
            options,
            state: AssistantState::Idle,
            session_id,
            started: Instant::now(),
            cleaned_up: false,
        }
    }

    /// Current orchestrator state
    #[must_use]
    pub const fn state(&self) -> AssistantState {
        self.state
    }

    /// Id of the session this assistant appends to
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Session store, for host access to history
    #[must_use]
    pub const fn dialogue(&self) -> &DialogueManager {
        &self.dialogue
    }

    /// Status report for the host
    #[must_use]
    pub fn get_status(&self) -> AssistantStatus {
        AssistantStatus {
            state: self.state,
            uptime_secs: self.started.elapsed().as_secs(),
            session_id: self.session_id.clone(),
            provider: self.provider.kind(),
            config: self.config.clone(),
            performance: self.monitor.as_ref().map(PerformanceMonitor::snapshot),
        }
    }

    /// Run the conversation loop until an exit utterance or a fatal error.
    ///
    /// Recognition misses are retried locally; every other collaborator
    /// failure transitions to `Error` and is returned wrapped as
    /// [`Error::Assistant`]. The caller decides whether to run again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assistant`] wrapping the underlying failure.
    pub async fn run(&mut self) -> Result<()> {
        if self.state == AssistantState::Terminated {
            tracing::warn!("run called on a terminated assistant");
            return Ok(());
        }

        if self.config.auto_adjust_noise {
            if let Err(e) = self.recognizer.adjust_for_ambient_noise().await {
                return Err(self.fail(format!("ambient noise calibration failed: {e}")));
            }
        }

        let greeting = self.config.greeting.clone();
        self.say(&greeting).await?;

        while self.state != AssistantState::Terminated {
            self.state = AssistantState::Listening;

            let Some(text) = self.listen_turn().await? else {
                tracing::debug!("no usable input this turn");
                self.state = AssistantState::Idle;
                continue;
            };

            if self.is_exit_phrase(&text) {
                tracing::info!(%text, "exit phrase recognized");
                self.stop().await?;
                break;
            }

            if self.config.check_connectivity
                && !network::check_connection(
                    &self.config.connectivity_probe_url,
                    self.config.network_timeout(),
                )
                .await
            {
                tracing::warn!("network unavailable, retrying turn");
                let apology = self.config.network_apology.clone();
                self.say(&apology).await?;
                self.state = AssistantState::Idle;
                continue;
            }

            self.state = AssistantState::Processing;
            let reply = self.process_turn(&text).await?;

            self.state = AssistantState::Speaking;
            self.say(&reply).await?;

            self.state = AssistantState::Idle;
        }

        Ok(())
    }

    /// Stop the assistant: speak the farewell, release resources, terminate.
    ///
    /// Safe to call at any point and idempotent; the cleanup sequence
    /// (persist history, then the performance snapshot) runs exactly once.
    /// `Terminated` is absorbing even when cleanup fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assistant`] if shutdown cleanup fails.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state == AssistantState::Terminated {
            return Ok(());
        }

        let farewell = self.config.farewell.clone();
        if let Err(e) = self.synthesizer.speak(&farewell).await {
            tracing::warn!(error = %e, "farewell synthesis failed");
        }
        self.synthesizer.stop();

        let cleanup = self.cleanup();
        self.state = AssistantState::Terminated;
        tracing::info!("assistant terminated");

        cleanup.map_err(|e| Error::Assistant(format!("shutdown cleanup failed: {e}")))
    }

    /// Listen with the configured retry budget; `None` means the turn is
    /// given up and the loop returns to idle.
    async fn listen_turn(&mut self) -> Result<Option<String>> {
        for attempt in 0..self.config.max_retries {
            match self.recognizer.listen().await {
                Ok(Some(text)) => {
                    tracing::info!(%text, "recognized");
                    return Ok(Some(text));
                }
                Ok(None) => {
                    tracing::debug!(attempt, "recognition miss");
                    if attempt + 1 < self.config.max_retries {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
                Err(e) => return Err(self.fail(format!("recognition failed: {e}"))),
            }
        }
        Ok(None)
    }

    /// One processing phase: record the prompt, obtain a reply through the
    /// cache/provider, record it, trim the session.
    async fn process_turn(&mut self, text: &str) -> Result<String> {
        let context = match self
            .dialogue
            .get_history(&self.session_id, Some(self.config.max_history))
        {
            Ok(context) => context,
            Err(e) => return Err(self.fail(format!("history lookup failed: {e}"))),
        };

        if let Err(e) = self
            .dialogue
            .add_message(&self.session_id, MessageRole::User, text)
        {
            return Err(self.fail(format!("failed to record prompt: {e}")));
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.config.response_timeout(),
            self.provider.generate(text, &context, &self.options),
        )
        .await;

        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(self.fail(format!("provider failed: {e}"))),
            Err(_) => {
                return Err(self.fail(format!(
                    "provider timed out after {}s",
                    self.config.response_timeout_secs
                )));
            }
        };

        if let Some(monitor) = &mut self.monitor {
            monitor.record_turn(started.elapsed(), text.chars().count(), reply.chars().count());
        }

        if let Err(e) = self
            .dialogue
            .add_message(&self.session_id, MessageRole::Assistant, &reply)
        {
            return Err(self.fail(format!("failed to record reply: {e}")));
        }
        if let Err(e) = self.dialogue.truncate(&self.session_id, self.config.max_history) {
            return Err(self.fail(format!("failed to trim session: {e}")));
        }

        Ok(reply)
    }

    /// Speak through the synthesizer, wrapping failures
    async fn say(&mut self, text: &str) -> Result<()> {
        if let Err(e) = self.synthesizer.speak(text).await {
            return Err(self.fail(format!("synthesis failed: {e}")));
        }
        Ok(())
    }

    fn is_exit_phrase(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.config
            .exit_phrases
            .iter()
            .any(|phrase| lower.contains(&phrase.to_lowercase()))
    }

    fn fail(&mut self, message: String) -> Error {
        tracing::error!(%message, "unrecoverable failure");
        self.state = AssistantState::Error;
        Error::Assistant(message)
    }

    /// Release resources: persist the conversation history, then the
    /// performance snapshot when monitoring is enabled. Runs at most once.
    fn cleanup(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;

        std::fs::create_dir_all(&self.config.data_dir)?;

        let history = self.dialogue.get_history(&self.session_id, None)?;
        let path = self.config.data_dir.join(HISTORY_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(&history)?)?;
        tracing::info!(path = %path.display(), messages = history.len(), "history persisted");

        if let Some(monitor) = &self.monitor {
            let path = self.config.data_dir.join(PERFORMANCE_FILE);
            std::fs::write(&path, serde_json::to_vec_pretty(&monitor.snapshot())?)?;
            tracing::info!(path = %path.display(), "performance snapshot persisted");
        }

        Ok(())
    }
}
