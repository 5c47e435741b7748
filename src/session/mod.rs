//! Conversation state and the driver that streams answers into it.

pub mod conversation;
pub mod persist;
pub mod timeline;

pub use conversation::{Conversation, Turn};
pub use persist::SessionFile;
pub use timeline::{Slot, Timeline};

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ParleyConfig;
use crate::error::ParleyError;
use crate::provider::{create_backend, BackendKind, ChatBackend};
use crate::types::Fragment;

/// A conversation bound to the backend that answers it.
///
/// Answers are pulled one fragment at a time: [`ask`](Self::ask) sends the
/// question and returns the first fragment, then the caller keeps calling
/// [`poll`](Self::poll) until a fragment with `is_final` arrives. Any error
/// drops the partial answer and leaves the sealed turns untouched.
pub struct ChatSession {
    config: ParleyConfig,
    conversation: Conversation,
    backend: Box<dyn ChatBackend>,
    streaming: bool,
    reported_tokens: u64,
}

impl ChatSession {
    /// Build a session with a backend created from `config`.
    pub fn new(config: ParleyConfig, kind: BackendKind) -> Result<Self, ParleyError> {
        let backend = create_backend(kind, &config)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Build a session around an existing backend.
    pub fn with_backend(config: ParleyConfig, backend: Box<dyn ChatBackend>) -> Self {
        let conversation = Conversation::from_config(&config, backend.kind());
        Self {
            config,
            conversation,
            backend,
            streaming: false,
            reported_tokens: 0,
        }
    }

    /// Start a new turn and return the first fragment of its answer.
    pub async fn ask(&mut self, question: &str) -> Result<Fragment, ParleyError> {
        if question.trim().is_empty() {
            return Err(ParleyError::InvalidArgument("Question is empty".into()));
        }
        if self.streaming {
            debug!("Discarding unfinished answer for new question");
            self.backend.close();
            self.streaming = false;
        }

        self.conversation.add_question(question);
        let history = self.conversation.build_message_history();
        debug!(backend = %self.backend.kind(), messages = history.len(), "Asking");

        match self.backend.send(&history).await {
            Ok(fragment) => {
                self.accept(&fragment);
                Ok(fragment)
            }
            Err(error) => {
                self.fail(&error);
                Err(error)
            }
        }
    }

    /// Pull the next fragment of the answer in flight.
    pub async fn poll(&mut self) -> Result<Fragment, ParleyError> {
        if !self.streaming || self.conversation.pending().is_none() {
            return Err(ParleyError::InvalidState("No answer is streaming".into()));
        }
        match self.backend.receive_next().await {
            Ok(fragment) => {
                self.accept(&fragment);
                Ok(fragment)
            }
            Err(error) => {
                self.fail(&error);
                Err(error)
            }
        }
    }

    /// Stop streaming the current answer and discard it.
    pub fn abandon(&mut self) -> Option<Turn> {
        self.backend.close();
        self.streaming = false;
        self.conversation.abort_pending()
    }

    /// Switch to a freshly created backend of `kind`. On failure nothing
    /// changes.
    pub fn switch_backend(&mut self, kind: BackendKind) -> Result<(), ParleyError> {
        let backend = create_backend(kind, &self.config)?;
        self.replace_backend(backend);
        Ok(())
    }

    /// Swap in `backend` and reset the conversation.
    pub fn replace_backend(&mut self, backend: Box<dyn ChatBackend>) {
        self.backend.close();
        info!(from = %self.backend.kind(), to = %backend.kind(), "Switching backend");
        self.backend = backend;
        self.streaming = false;
        self.reported_tokens = 0;
        self.conversation.switch_backend(self.backend.kind());
    }

    /// Advisory token count: the local estimate for OpenAI, the billed total
    /// reported by Spark.
    pub fn tokens(&mut self) -> u64 {
        match self.backend.kind() {
            BackendKind::OpenAi => self.conversation.estimate_tokens(self.backend.model_id()) as u64,
            BackendKind::Spark => self.reported_tokens,
        }
    }

    /// Move the active context to history so the next question starts fresh.
    pub fn clear_context(&mut self) {
        self.conversation.clear_context();
    }

    /// Forget every turn and the token tally.
    pub fn clear_all(&mut self) {
        self.abandon();
        self.conversation.clear_all();
        self.reported_tokens = 0;
    }

    /// Save to the configured session path.
    pub fn save(&self) -> Result<PathBuf, ParleyError> {
        let path = self.config.session_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ParleyError> {
        let path = path.as_ref();
        let file = self.conversation.snapshot();
        file.save(path)?;
        info!(path = %path.display(), turns = file.qa_list.len(), "Session saved");
        Ok(())
    }

    /// Load from the configured session path.
    pub fn load(&mut self) -> Result<(), ParleyError> {
        let path = self.config.session_path();
        self.load_from(path)
    }

    /// Replace the conversation with a saved one, switching backend when the
    /// file was written by the other one.
    pub fn load_from(&mut self, path: impl AsRef<Path>) -> Result<(), ParleyError> {
        let path = path.as_ref();
        let file = SessionFile::load(path)?;

        let replacement = match file.bot_type.filter(|kind| *kind != self.backend.kind()) {
            Some(kind) => Some(create_backend(kind, &self.config)?),
            None => None,
        };
        self.backend.close();
        if let Some(backend) = replacement {
            self.backend = backend;
        }
        self.streaming = false;
        self.reported_tokens = 0;

        let turns = file.qa_list.len();
        self.conversation.restore(file);
        info!(path = %path.display(), turns, backend = %self.backend.kind(), "Session loaded");
        Ok(())
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn backend(&self) -> &dyn ChatBackend {
        self.backend.as_ref()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn accept(&mut self, fragment: &Fragment) {
        self.conversation.append_answer(&fragment.text, fragment.is_final);
        if fragment.is_final {
            self.reported_tokens += self.backend.tokens_used();
            self.backend.close();
            self.streaming = false;
        } else {
            self.streaming = true;
        }
    }

    fn fail(&mut self, error: &ParleyError) {
        debug!(error = %error, category = ?error.category(), "Turn aborted");
        self.conversation.abort_pending();
        self.backend.close();
        self.streaming = false;
    }
}
