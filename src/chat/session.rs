//! Chat Session Transcript
//!
//! In-memory transcript of one chat widget. Messages are immutable once
//! appended; the transcript lives until `clear` or drop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::driver::{ChatBackend, ChatDriver, StreamObserver};
use super::event::Progress;
use super::{AbortSignal, ChatError};
use crate::backend::ChatAnswer;
use crate::dashboard::chart_from_rows;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Query details behind an assistant answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataContext {
    pub sql_query: Option<String>,
    pub rows: Option<Vec<Value>>,
}

/// A transcript entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_context: Option<DataContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<Value>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            data_context: None,
            chart_data: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Assistant message carrying the answer, its SQL and a chart.
    ///
    /// Falls back to a basic chart built from the result rows when the
    /// backend sent none.
    pub fn from_answer(answer: &ChatAnswer) -> Self {
        let rows = answer.rows();
        let sql_query = answer.sql().map(str::to_string);

        let chart_data = answer.chart().cloned().or_else(|| {
            let rows = rows.as_deref().filter(|r| !r.is_empty())?;
            let question = answer.question.as_deref().unwrap_or_default();
            Some(chart_from_rows(rows, question)).filter(|c| c.as_object().is_some_and(|m| !m.is_empty()))
        });

        let data_context = (sql_query.is_some() || rows.is_some())
            .then_some(DataContext { sql_query, rows });

        let content = if answer.answer_text().trim().is_empty() {
            "I couldn't find an answer to that question.".to_string()
        } else {
            answer.answer_text().to_string()
        };

        Self {
            data_context,
            chart_data,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Terminal error entry for a failed turn
    pub fn error(error: &ChatError) -> Self {
        Self::new(Role::Assistant, format!("Sorry, something went wrong: {}", error))
    }
}

/// Transcript plus the live progress of the current turn
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    progress: Vec<Progress>,
    max_messages: usize,
    turn_open: bool,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(200)
    }
}

impl ChatSession {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            progress: Vec::new(),
            max_messages: max_messages.max(2),
            turn_open: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Progress steps of the in-flight turn, in arrival order
    pub fn progress(&self) -> &[Progress] {
        &self.progress
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Whether a turn is waiting for its answer
    pub fn is_waiting(&self) -> bool {
        self.turn_open
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.progress.clear();
        self.turn_open = false;
    }

    /// Record a question and open a turn for its answer
    pub fn push_user(&mut self, question: &str) {
        self.push(ChatMessage::user(question.trim()));
        self.progress.clear();
        self.turn_open = true;
    }

    /// Close the open turn with an answer. Returns false if no turn was open,
    /// in which case nothing is appended.
    pub fn apply_answer(&mut self, answer: &ChatAnswer) -> bool {
        if !self.turn_open {
            tracing::warn!("Ignoring answer for a closed turn");
            return false;
        }
        self.turn_open = false;
        self.progress.clear();
        self.push(ChatMessage::from_answer(answer));
        true
    }

    /// Close the open turn with an error message
    pub fn apply_error(&mut self, error: &ChatError) -> bool {
        if !self.turn_open {
            return false;
        }
        self.turn_open = false;
        self.progress.clear();
        self.push(ChatMessage::error(error));
        true
    }

    /// Ask a question over the streaming endpoint.
    ///
    /// A question sent while the driver is busy is rejected and leaves the
    /// transcript untouched.
    pub async fn send<B: ChatBackend>(
        &mut self,
        driver: &ChatDriver<B>,
        question: &str,
        signal: AbortSignal,
    ) -> Result<(), ChatError> {
        self.send_with(driver, question, signal, |_| {}).await
    }

    /// Like [`send`](Self::send), also handing each progress step to
    /// `on_progress` as it arrives
    pub async fn send_with<B, F>(
        &mut self,
        driver: &ChatDriver<B>,
        question: &str,
        signal: AbortSignal,
        on_progress: F,
    ) -> Result<(), ChatError>
    where
        B: ChatBackend,
        F: FnMut(&Progress) + Send,
    {
        if question.trim().is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        let permit = driver.begin()?;

        self.push_user(question);
        let mut turn = TurnObserver {
            session: self,
            on_progress,
        };
        driver.run(permit, question, signal, &mut turn).await.map(|_| ())
    }

    fn record_progress(&mut self, progress: &Progress) {
        if self.turn_open {
            self.progress.push(progress.clone());
        }
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }
}

/// Feeds one streamed turn into its session
struct TurnObserver<'a, F> {
    session: &'a mut ChatSession,
    on_progress: F,
}

impl<F: FnMut(&Progress)> StreamObserver for TurnObserver<'_, F> {
    fn on_progress(&mut self, progress: &Progress) {
        self.session.record_progress(progress);
        (self.on_progress)(progress);
    }

    fn on_final(&mut self, answer: &ChatAnswer) {
        self.session.apply_answer(answer);
    }

    fn on_error(&mut self, error: &ChatError) {
        self.session.apply_error(error);
    }
}
