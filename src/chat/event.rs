//! Chat Stream Events
//!
//! Wire format of `POST /chat/stream` frames and their mapping to progress
//! updates and final answers.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::backend::ChatAnswer;

/// A decoded stream frame, as sent by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NodeUpdate,
    Final,
    #[serde(other)]
    Unknown,
}

/// A workflow stage finished
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub stage: String,
    pub label: String,
    pub at: DateTime<Utc>,
}

/// What a frame means to the chat driver
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Progress(Progress),
    Final(ChatAnswer),
}

/// Reasons a frame could not be used
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("node_update without a node name")]
    MissingNode,

    #[error("final event without a payload: {0}")]
    BadFinal(String),
}

impl StreamEvent {
    pub fn parse(payload: &str) -> Result<Self, FrameError> {
        serde_json::from_str(payload).map_err(|e| FrameError::Json(e.to_string()))
    }

    /// Event time, falling back to now when absent or unparseable.
    ///
    /// The backend sends naive ISO timestamps (no offset); those are read as
    /// UTC.
    pub fn time(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|ts| {
                DateTime::parse_from_rfc3339(ts)
                    .map(|t| t.with_timezone(&Utc))
                    .ok()
                    .or_else(|| {
                        chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
                            .ok()
                            .map(|n| n.and_utc())
                    })
            })
            .unwrap_or_else(Utc::now)
    }

    /// Interpret the frame. Unknown event types yield `Ok(None)`.
    pub fn into_chat_event(self) -> Result<Option<ChatEvent>, FrameError> {
        let at = self.time();
        match self.kind {
            EventKind::NodeUpdate => {
                let stage = self
                    .node
                    .or_else(|| {
                        self.data
                            .as_ref()
                            .and_then(|d| d.get("node"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .filter(|s| !s.is_empty())
                    .ok_or(FrameError::MissingNode)?;

                Ok(Some(ChatEvent::Progress(Progress {
                    label: stage_label(&stage),
                    stage,
                    at,
                })))
            }
            EventKind::Final => {
                let data = self
                    .data
                    .filter(Value::is_object)
                    .ok_or_else(|| FrameError::BadFinal("missing data object".to_string()))?;
                let answer: ChatAnswer = serde_json::from_value(data)
                    .map_err(|e| FrameError::BadFinal(e.to_string()))?;
                Ok(Some(ChatEvent::Final(answer)))
            }
            EventKind::Unknown => Ok(None),
        }
    }
}

/// Decode one frame payload into a chat event
pub fn parse_chat_event(payload: &str) -> Result<Option<ChatEvent>, FrameError> {
    StreamEvent::parse(payload)?.into_chat_event()
}

/// User-facing label for a workflow stage
pub fn stage_label(stage: &str) -> String {
    let label = match stage {
        "intent_classification" => "Understanding your question",
        "greeting" => "Preparing a response",
        "text_to_sql" => "Generating SQL query",
        "execute_sql_query" => "Running query",
        "summarizer" => "Summarizing results",
        "clarification_agent" => "Asking for clarification",
        "visualization" => "Building visualization",
        other => return format!("Processing: {}", other),
    };
    label.to_string()
}
