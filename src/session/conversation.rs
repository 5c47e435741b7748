//! Dialogue state: pending turn, bounded active context and evicted history.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ParleyConfig;
use crate::provider::BackendKind;
use crate::tokenizer;
use crate::types::ChatMessage;

use super::persist::SessionFile;
use super::timeline::Timeline;

/// One question/answer exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    question: String,
    #[serde(default)]
    answer: String,
}

impl Turn {
    /// A turn with no answer yet.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: String::new(),
        }
    }

    /// A completed turn.
    pub fn sealed(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }
}

/// Multi-turn conversation state.
///
/// Turns move `pending -> active -> history` and never back. `active` holds at
/// most `context_limit` turns; sealing one more moves the oldest to `history`.
#[derive(Debug, Clone)]
pub struct Conversation {
    active: Vec<Turn>,
    history: Vec<Turn>,
    pending: Option<Turn>,
    cursor: usize,
    token_estimate: usize,
    context_limit: usize,
    prompt: String,
    backend: BackendKind,
}

impl Conversation {
    pub fn new(prompt: impl Into<String>, context_limit: usize, backend: BackendKind) -> Self {
        Self {
            active: Vec::new(),
            history: Vec::new(),
            pending: None,
            cursor: 0,
            token_estimate: 0,
            context_limit: context_limit.max(1),
            prompt: prompt.into(),
            backend,
        }
    }

    pub fn from_config(config: &ParleyConfig, backend: BackendKind) -> Self {
        Self::new(config.prompt.clone(), config.context_limit(), backend)
    }

    /// Start a turn for `text`. An existing pending turn is reused with its
    /// answer cleared.
    pub fn add_question(&mut self, text: impl Into<String>) {
        match &mut self.pending {
            Some(turn) => {
                turn.question = text.into();
                turn.answer.clear();
            }
            None => self.pending = Some(Turn::new(text)),
        }
        self.token_estimate = 0;
        self.reset_cursor();
    }

    /// Append `fragment` to the pending answer, sealing the turn when
    /// `is_final`. Ignored when nothing is pending.
    pub fn append_answer(&mut self, fragment: &str, is_final: bool) {
        let Some(turn) = self.pending.as_mut() else {
            return;
        };
        turn.answer.push_str(fragment);
        if !is_final {
            return;
        }

        if let Some(turn) = self.pending.take() {
            self.active.push(turn);
        }
        if self.active.len() > self.context_limit {
            let evicted = self.active.remove(0);
            self.history.push(evicted);
        }
        self.token_estimate = 0;
        self.cursor = self.timeline().clamp(self.cursor);
    }

    /// Drop the pending turn without sealing it.
    pub fn abort_pending(&mut self) -> Option<Turn> {
        let aborted = self.pending.take();
        if aborted.is_some() {
            self.token_estimate = 0;
            self.cursor = self.timeline().clamp(self.cursor);
        }
        aborted
    }

    /// Empty the pending answer, keeping its question.
    pub fn clear_current_answer(&mut self) {
        if let Some(turn) = self.pending.as_mut() {
            turn.answer.clear();
        }
    }

    /// Request messages: the prompt, each active turn as a user/assistant
    /// pair, then the pending question if any.
    pub fn build_message_history(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 * self.active.len() + 2);
        messages.push(ChatMessage::system(self.prompt.as_str()));
        for turn in &self.active {
            messages.push(ChatMessage::user(turn.question.as_str()));
            messages.push(ChatMessage::assistant(turn.answer.as_str()));
        }
        if let Some(turn) = &self.pending {
            messages.push(ChatMessage::user(turn.question.as_str()));
        }
        messages
    }

    /// Cached token estimate of [`build_message_history`](Self::build_message_history).
    pub fn estimate_tokens(&mut self, model: &str) -> usize {
        if self.token_estimate == 0 {
            self.token_estimate = tokenizer::estimate(&self.build_message_history(), model);
        }
        self.token_estimate
    }

    /// Target another backend. Always a full reset.
    pub fn switch_backend(&mut self, kind: BackendKind) {
        debug!(from = %self.backend, to = %kind, "Conversation reset for backend switch");
        self.backend = kind;
        self.clear_all();
    }

    /// Forget every turn.
    pub fn clear_all(&mut self) {
        self.active.clear();
        self.history.clear();
        self.pending = None;
        self.token_estimate = 0;
        self.cursor = 0;
    }

    /// Move every active turn to history.
    pub fn clear_context(&mut self) {
        self.history.append(&mut self.active);
        self.token_estimate = 0;
        self.reset_cursor();
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
        self.token_estimate = 0;
    }

    /// Turns across history, active context and the pending slot.
    pub fn len(&self) -> usize {
        self.timeline().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Turn under the cursor.
    pub fn current(&self) -> Option<&Turn> {
        let timeline = self.timeline();
        timeline.get(timeline.clamp(self.cursor))
    }

    /// Step back one turn, wrapping to the newest.
    pub fn previous(&mut self) -> Option<&Turn> {
        self.cursor = self.timeline().prev_index(self.cursor);
        self.current()
    }

    /// Step forward one turn, wrapping to the oldest.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&Turn> {
        self.cursor = self.timeline().next_index(self.cursor);
        self.current()
    }

    pub fn timeline(&self) -> Timeline<'_> {
        Timeline::new(&self.history, &self.active, self.pending.as_ref())
    }

    pub fn active(&self) -> &[Turn] {
        &self.active
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn pending(&self) -> Option<&Turn> {
        self.pending.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn context_limit(&self) -> usize {
        self.context_limit
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend
    }

    /// Sealed turns in order, with the prompt and backend, ready to persist.
    pub fn snapshot(&self) -> SessionFile {
        SessionFile {
            qa_list: self.history.iter().chain(&self.active).cloned().collect(),
            prompt: self.prompt.clone(),
            bot_type: Some(self.backend),
        }
    }

    /// Replace all state with a persisted session. The newest
    /// `context_limit` turns become the active context.
    pub fn restore(&mut self, file: SessionFile) {
        let SessionFile {
            mut qa_list,
            prompt,
            bot_type,
        } = file;

        let split = qa_list.len().saturating_sub(self.context_limit);
        self.active = qa_list.split_off(split);
        self.history = qa_list;
        self.pending = None;
        self.token_estimate = 0;
        if !prompt.is_empty() {
            self.prompt = prompt;
        }
        if let Some(kind) = bot_type {
            self.backend = kind;
        }
        self.reset_cursor();
    }

    fn reset_cursor(&mut self) {
        self.cursor = self.len().saturating_sub(1);
    }
}
