//! Streaming chat with the supplier-analytics agent
//!
//! - `sse`: frame decoding of the chunked response body
//! - `event`: stream event wire format and stage labels
//! - `driver`: one-stream-at-a-time driver with observer callbacks
//! - `session`: transcript kept by the chat widget
//! - `abort`: explicit cancellation

mod abort;
mod driver;
mod event;
mod session;
mod sse;

pub use abort::{abort_pair, AbortHandle, AbortSignal};
pub use driver::{ChatBackend, ChatDriver, StreamObserver, StreamPermit};
pub use event::{parse_chat_event, stage_label, ChatEvent, EventKind, FrameError, Progress, StreamEvent};
pub use session::{ChatMessage, ChatSession, DataContext, Role};
pub use sse::{Frame, FrameDecoder, DEFAULT_MAX_FRAME};

use crate::backend::BackendError;

/// Chat failures surfaced to the user
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("A message is already being processed")]
    Busy,

    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("Request cancelled")]
    Aborted,

    #[error("Stream ended before a final answer")]
    Incomplete,

    #[error("{0}")]
    Backend(#[from] BackendError),
}

impl ChatError {
    /// Whether the user asked for this failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Aborted)
    }
}
