//! End-to-end orchestrator tests with scripted collaborators.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use parley::assistant::{HISTORY_FILE, PERFORMANCE_FILE};
use parley::providers::GenerateOptions;
use parley::voice::{Recognizer, Synthesizer};
use parley::{
    Assistant, AssistantState, Config, Error, Message, MessageRole, Provider, Result,
};

/// Recognizer that replays a fixed script, then reports a closed stream.
struct ScriptedRecognizer {
    script: VecDeque<Option<String>>,
}

impl ScriptedRecognizer {
    fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            script: lines.into_iter().map(|l| l.map(Into::into)).collect(),
        }
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn listen(&mut self) -> Result<Option<String>> {
        self.script
            .pop_front()
            .ok_or_else(|| Error::Recognition("script exhausted".into()))
    }

    async fn adjust_for_ambient_noise(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Synthesizer that records everything it is asked to say.
struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingSynthesizer {
    fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                spoken: Arc::clone(&spoken),
            },
            spoken,
        )
    }
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn speak(&mut self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn save_to_file(&mut self, text: &str, path: &Path) -> Result<()> {
        std::fs::write(path, text)?;
        Ok(())
    }

    fn stop(&mut self) {}
}

/// Provider that answers every prompt with a fixed reply, counting calls.
struct StubProvider {
    reply: String,
    calls: AtomicUsize,
    fail: bool,
}

impl StubProvider {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: String::new(),
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn kind(&self) -> &'static str {
        "stub"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _context: &[Message],
        _options: &GenerateOptions,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Provider("stub failure".into()));
        }
        Ok(self.reply.clone())
    }
}

fn test_config(data_dir: &Path) -> Config {
    Config {
        check_connectivity: false,
        auto_adjust_noise: false,
        enable_monitoring: true,
        max_retries: 3,
        retry_delay_ms: 1,
        data_dir: data_dir.to_path_buf(),
        ..Config::default()
    }
}

#[tokio::test]
async fn exit_phrase_terminates_without_provider_call() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let greeting = config.greeting.clone();
    let farewell = config.farewell.clone();

    let provider = StubProvider::new("unused");
    let (synth, spoken) = RecordingSynthesizer::new();
    let recognizer = ScriptedRecognizer::new([Some("再见")]);

    let mut assistant = Assistant::new(config, provider.clone(), Box::new(recognizer), Box::new(synth));
    assistant.run().await.unwrap();

    assert_eq!(assistant.state(), AssistantState::Terminated);
    assert_eq!(provider.calls(), 0);
    assert_eq!(*spoken.lock().unwrap(), vec![greeting, farewell]);
}

#[tokio::test]
async fn one_turn_records_history_and_speaks_reply() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let provider = StubProvider::new("你好！有什么我可以帮你的吗？");
    let (synth, spoken) = RecordingSynthesizer::new();
    let recognizer = ScriptedRecognizer::new([Some("你好"), Some("再见")]);

    let mut assistant = Assistant::new(config, provider.clone(), Box::new(recognizer), Box::new(synth));
    assistant.run().await.unwrap();

    assert_eq!(provider.calls(), 1);

    let history = assistant
        .dialogue()
        .get_history(assistant.session_id(), None)
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[0].content, "你好");
    assert_eq!(history[1].role, MessageRole::Assistant);
    assert_eq!(history[1].content, "你好！有什么我可以帮你的吗？");

    let spoken = spoken.lock().unwrap();
    let reply_count = spoken
        .iter()
        .filter(|s| *s == "你好！有什么我可以帮你的吗？")
        .count();
    assert_eq!(reply_count, 1);
}

#[tokio::test]
async fn recognition_misses_exhaust_retry_budget_then_recover() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let provider = StubProvider::new("unused");
    let (synth, _spoken) = RecordingSynthesizer::new();
    // Three misses consume the retry budget for one turn; the next turn exits.
    let recognizer = ScriptedRecognizer::new([None::<&str>, None, None, Some("再见")]);

    let mut assistant = Assistant::new(config, provider.clone(), Box::new(recognizer), Box::new(synth));
    assistant.run().await.unwrap();

    assert_eq!(assistant.state(), AssistantState::Terminated);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn provider_failure_enters_error_state_then_stop_terminates() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let provider = StubProvider::failing();
    let (synth, _spoken) = RecordingSynthesizer::new();
    let recognizer = ScriptedRecognizer::new([Some("你好")]);

    let mut assistant = Assistant::new(config, provider, Box::new(recognizer), Box::new(synth));
    let err = assistant.run().await.unwrap_err();

    assert!(matches!(err, Error::Assistant(_)));
    assert_eq!(assistant.state(), AssistantState::Error);

    assistant.stop().await.unwrap();
    assert_eq!(assistant.state(), AssistantState::Terminated);

    // Idempotent: a second stop is a no-op.
    assistant.stop().await.unwrap();
    assert_eq!(assistant.state(), AssistantState::Terminated);
}

#[tokio::test]
async fn recognizer_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let provider = StubProvider::new("unused");
    let (synth, _spoken) = RecordingSynthesizer::new();
    // Empty script: first listen reports a closed stream.
    let recognizer = ScriptedRecognizer::new(Vec::<Option<String>>::new());

    let mut assistant = Assistant::new(config, provider, Box::new(recognizer), Box::new(synth));
    let err = assistant.run().await.unwrap_err();

    assert!(matches!(err, Error::Assistant(_)));
    assert_eq!(assistant.state(), AssistantState::Error);
}

#[tokio::test]
async fn shutdown_persists_history_and_performance_report() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let provider = StubProvider::new("收到");
    let (synth, _spoken) = RecordingSynthesizer::new();
    let recognizer = ScriptedRecognizer::new([Some("测试一下"), Some("再见")]);

    let mut assistant = Assistant::new(config, provider, Box::new(recognizer), Box::new(synth));
    assistant.run().await.unwrap();

    let history_raw = std::fs::read(dir.path().join(HISTORY_FILE)).unwrap();
    let history: Vec<Message> = serde_json::from_slice(&history_raw).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "测试一下");
    assert_eq!(history[1].content, "收到");

    let report_raw = std::fs::read(dir.path().join(PERFORMANCE_FILE)).unwrap();
    let report: serde_json::Value = serde_json::from_slice(&report_raw).unwrap();
    assert_eq!(report["turns"], 1);
}

#[tokio::test]
async fn status_reports_session_and_provider() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let provider = StubProvider::new("unused");
    let (synth, _spoken) = RecordingSynthesizer::new();
    let recognizer = ScriptedRecognizer::new(Vec::<Option<String>>::new());

    let assistant = Assistant::new(config, provider, Box::new(recognizer), Box::new(synth));
    let status = assistant.get_status();

    assert_eq!(status.state, AssistantState::Idle);
    assert_eq!(status.session_id, assistant.session_id());
    assert_eq!(status.provider, "stub");
    assert!(status.performance.is_some());
    assert!(status.session_id.starts_with("local_"));
}
