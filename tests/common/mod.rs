//! Shared test helpers and a scripted mock backend.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use parley::config::{ParleyConfig, SparkConfig};
use parley::error::ParleyError;
use parley::provider::{BackendKind, ChatBackend};
use parley::types::{ChatMessage, Fragment};

/// What the session did to a [`ScriptedBackend`].
#[derive(Debug, Default)]
pub struct BackendLog {
    pub sent: Vec<Vec<ChatMessage>>,
    pub receives: usize,
    pub closes: usize,
}

/// A backend that replays queued results: the first one answers `send`, the
/// rest answer `receive_next` in order.
pub struct ScriptedBackend {
    kind: BackendKind,
    model: String,
    steps: VecDeque<Result<Fragment, ParleyError>>,
    tokens_per_answer: u64,
    last_tokens: u64,
    log: Arc<Mutex<BackendLog>>,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind) -> (Self, Arc<Mutex<BackendLog>>) {
        let log = Arc::new(Mutex::new(BackendLog::default()));
        let backend = Self {
            kind,
            model: match kind {
                BackendKind::OpenAi => "gpt-4".to_string(),
                BackendKind::Spark => "general".to_string(),
            },
            steps: VecDeque::new(),
            tokens_per_answer: 0,
            last_tokens: 0,
            log: Arc::clone(&log),
        };
        (backend, log)
    }

    pub fn then(mut self, step: Result<Fragment, ParleyError>) -> Self {
        self.steps.push_back(step);
        self
    }

    /// Queue a streamed answer: an empty opening fragment, one delta per
    /// piece, and a final empty fragment.
    pub fn answer(mut self, pieces: &[&str]) -> Self {
        self.steps.push_back(Ok(Fragment::delta("")));
        for piece in pieces {
            self.steps.push_back(Ok(Fragment::delta(*piece)));
        }
        self.steps.push_back(Ok(Fragment::end()));
        self
    }

    pub fn with_tokens_per_answer(mut self, tokens: u64) -> Self {
        self.tokens_per_answer = tokens;
        self
    }

    fn next_step(&mut self) -> Result<Fragment, ParleyError> {
        let step = self
            .steps
            .pop_front()
            .unwrap_or_else(|| Err(ParleyError::InvalidState("script exhausted".into())));
        if matches!(&step, Ok(fragment) if fragment.is_final) {
            self.last_tokens = self.tokens_per_answer;
        }
        step
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn send(&mut self, history: &[ChatMessage]) -> Result<Fragment, ParleyError> {
        self.log.lock().unwrap().sent.push(history.to_vec());
        self.last_tokens = 0;
        self.next_step()
    }

    async fn receive_next(&mut self) -> Result<Fragment, ParleyError> {
        self.log.lock().unwrap().receives += 1;
        self.next_step()
    }

    fn close(&mut self) {
        self.log.lock().unwrap().closes += 1;
    }

    fn tokens_used(&self) -> u64 {
        self.last_tokens
    }
}

/// Config with credentials for both backends and the given context limit.
pub fn test_config(context_limit: usize) -> ParleyConfig {
    let mut config = ParleyConfig {
        prompt: "You are a test assistant.".into(),
        context_limit,
        ..Default::default()
    };
    config.openai.api_key = Some("sk-test".into());
    config.spark = SparkConfig {
        app_id: Some("app-test".into()),
        api_key: Some("key-test".into()),
        api_secret: Some("secret-test".into()),
        ..Default::default()
    };
    config
}
