//! Streaming Chat Driver
//!
//! Runs one question through `POST /chat/stream`: decodes frames, reports
//! progress in arrival order and stops at the first final answer.
//!
//! Guarantees per run:
//! - at most one `on_final`, and nothing is read after it
//! - every failure (transport, abort, early end) fires `on_error` exactly once
//! - nothing is reported after an abort
//! - malformed frames are logged and skipped

use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::abort::AbortSignal;
use super::event::{parse_chat_event, ChatEvent, Progress};
use super::sse::{Frame, FrameDecoder, DEFAULT_MAX_FRAME};
use super::ChatError;
use crate::backend::{BackendClient, BackendError, ByteStream, ChatAnswer};

/// Source of chat event streams
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submit a question and return the raw event-stream body
    async fn open_stream(&self, question: &str) -> Result<ByteStream, BackendError>;
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn open_stream(&self, question: &str) -> Result<ByteStream, BackendError> {
        self.chat_stream(question).await
    }
}

/// Receives stream callbacks
pub trait StreamObserver {
    fn on_progress(&mut self, progress: &Progress);
    fn on_final(&mut self, answer: &ChatAnswer);
    fn on_error(&mut self, error: &ChatError);
}

/// Proof that the driver's single stream slot is held.
///
/// Dropping the permit frees the slot.
#[derive(Debug)]
pub struct StreamPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for StreamPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Drives chat streams against a backend, one at a time
pub struct ChatDriver<B> {
    backend: Arc<B>,
    busy: Arc<AtomicBool>,
    max_frame: usize,
}

impl<B> Clone for ChatDriver<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            busy: Arc::clone(&self.busy),
            max_frame: self.max_frame,
        }
    }
}

impl<B: ChatBackend> ChatDriver<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            busy: Arc::new(AtomicBool::new(false)),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Cap on a single event frame; larger frames are skipped
    pub fn with_max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the stream slot. Fails with `Busy` while another stream runs.
    pub fn begin(&self) -> Result<StreamPermit, ChatError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ChatError::Busy)?;
        Ok(StreamPermit {
            busy: Arc::clone(&self.busy),
        })
    }

    /// Claim the slot and run a question to completion
    pub async fn ask<O: StreamObserver + Send>(
        &self,
        question: &str,
        signal: AbortSignal,
        observer: &mut O,
    ) -> Result<ChatAnswer, ChatError> {
        let permit = self.begin()?;
        self.run(permit, question, signal, observer).await
    }

    /// Run a question on an already claimed slot.
    ///
    /// The returned error has already been passed to `on_error`.
    pub async fn run<O: StreamObserver + Send>(
        &self,
        permit: StreamPermit,
        question: &str,
        mut signal: AbortSignal,
        observer: &mut O,
    ) -> Result<ChatAnswer, ChatError> {
        let result = self.stream(question, &mut signal, observer).await;
        drop(permit);

        if let Err(e) = &result {
            if e.is_cancelled() {
                tracing::info!("Chat stream cancelled");
            } else {
                tracing::error!(error = %e, "Chat stream failed");
            }
            observer.on_error(e);
        }
        result
    }

    async fn stream<O: StreamObserver + Send>(
        &self,
        question: &str,
        signal: &mut AbortSignal,
        observer: &mut O,
    ) -> Result<ChatAnswer, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let mut stream = tokio::select! {
            biased;
            _ = signal.aborted() => return Err(ChatError::Aborted),
            opened = self.backend.open_stream(question) => opened?,
        };

        let mut decoder = FrameDecoder::with_max_frame(self.max_frame);
        let mut progress_count = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = signal.aborted() => {
                    tracing::debug!(progress_count, "Chat stream aborted");
                    return Err(ChatError::Aborted);
                }
                next = stream.next() => next,
            };

            let ended = next.is_none();
            let frames = match next {
                Some(Ok(chunk)) => decoder.push(&chunk),
                Some(Err(e)) => return Err(ChatError::Backend(e)),
                None => decoder.finish().into_iter().collect(),
            };

            for frame in frames {
                if signal.is_aborted() {
                    return Err(ChatError::Aborted);
                }

                let payload = match frame {
                    Frame::Data(payload) => payload,
                    Frame::Invalid(reason) => {
                        tracing::warn!(reason = %reason, "Skipping undecodable stream frame");
                        continue;
                    }
                };

                match parse_chat_event(&payload) {
                    Ok(Some(ChatEvent::Progress(progress))) => {
                        progress_count += 1;
                        tracing::debug!(stage = %progress.stage, "Chat progress");
                        observer.on_progress(&progress);
                    }
                    Ok(Some(ChatEvent::Final(answer))) => {
                        tracing::info!(
                            progress_count,
                            has_sql = answer.sql().is_some(),
                            has_chart = answer.chart().is_some(),
                            "Chat stream completed"
                        );
                        observer.on_final(&answer);
                        return Ok(answer);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed stream frame");
                    }
                }
            }

            if ended {
                return Err(ChatError::Incomplete);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::abort::abort_pair;
    use futures_util::stream;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend replaying canned chunks, optionally stalling afterwards
    struct ScriptedBackend {
        chunks: Mutex<Option<Vec<Result<Vec<u8>, BackendError>>>>,
        stall: bool,
    }

    impl ScriptedBackend {
        fn new(chunks: Vec<&str>) -> Self {
            Self {
                chunks: Mutex::new(Some(
                    chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec())).collect(),
                )),
                stall: false,
            }
        }

        fn with_items(items: Vec<Result<Vec<u8>, BackendError>>) -> Self {
            Self {
                chunks: Mutex::new(Some(items)),
                stall: false,
            }
        }

        fn stalling(chunks: Vec<&str>) -> Self {
            Self {
                stall: true,
                ..Self::new(chunks)
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn open_stream(&self, _question: &str) -> Result<ByteStream, BackendError> {
            let items = self.chunks.lock().unwrap().take().unwrap_or_default();
            let head = stream::iter(items);
            if self.stall {
                Ok(Box::pin(head.chain(stream::pending())))
            } else {
                Ok(Box::pin(head))
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: Vec<String>,
        finals: Vec<String>,
        errors: Vec<ChatError>,
    }

    impl StreamObserver for Recorder {
        fn on_progress(&mut self, progress: &Progress) {
            self.progress.push(progress.stage.clone());
        }
        fn on_final(&mut self, answer: &ChatAnswer) {
            self.finals.push(answer.answer_text().to_string());
        }
        fn on_error(&mut self, error: &ChatError) {
            self.errors.push(error.clone());
        }
    }

    fn node(name: &str) -> String {
        format!("data: {{\"type\":\"node_update\",\"node\":\"{}\",\"data\":{{\"node\":\"{}\"}}}}\n\n", name, name)
    }

    fn final_frame(answer: &str) -> String {
        format!(
            "data: {{\"type\":\"final\",\"data\":{{\"final_answer\":\"{}\",\"sql_query\":\"SELECT 1\",\"visualization_data\":{{}}}}}}\n\n",
            answer
        )
    }

    #[tokio::test]
    async fn test_progress_then_final() {
        let body = format!("{}{}{}", node("intent_classification"), node("text_to_sql"), final_frame("42 trips"));
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(vec![&body])));
        let mut recorder = Recorder::default();

        let answer = driver
            .ask("How many trips?", AbortSignal::never(), &mut recorder)
            .await
            .unwrap();

        assert_eq!(answer.answer_text(), "42 trips");
        assert_eq!(recorder.progress, vec!["intent_classification", "text_to_sql"]);
        assert_eq!(recorder.finals, vec!["42 trips"]);
        assert!(recorder.errors.is_empty());
        assert!(!driver.is_busy());
    }

    #[tokio::test]
    async fn test_duplicate_final_delivered_once() {
        let body = format!("{}{}{}", final_frame("first"), final_frame("second"), node("greeting"));
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(vec![&body])));
        let mut recorder = Recorder::default();

        driver.ask("hi", AbortSignal::never(), &mut recorder).await.unwrap();

        assert_eq!(recorder.finals, vec!["first"]);
        assert!(recorder.progress.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_frame_skipped() {
        let first = node("intent_classification");
        let last = final_frame("done");
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(vec![
            &first,
            "data: {this is not json\n\n",
            "data: {\"type\":\"node_update\"}\n\n",
            &last,
        ])));
        let mut recorder = Recorder::default();

        let result = driver.ask("q", AbortSignal::never(), &mut recorder).await;

        assert!(result.is_ok());
        assert_eq!(recorder.progress, vec!["intent_classification"]);
        assert_eq!(recorder.finals, vec!["done"]);
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let body = format!("{}{}", node("summarizer"), final_frame("split"));
        let (a, b) = body.split_at(17);
        let (b, c) = b.split_at(40);
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(vec![a, b, c])));
        let mut recorder = Recorder::default();

        driver.ask("q", AbortSignal::never(), &mut recorder).await.unwrap();

        assert_eq!(recorder.progress, vec!["summarizer"]);
        assert_eq!(recorder.finals, vec!["split"]);
    }

    #[tokio::test]
    async fn test_oversized_frame_skipped() {
        let huge = format!("data: {{\"type\":\"node_update\",\"node\":\"{}\"}}\n\n", "z".repeat(4096));
        let last = final_frame("small");
        let chunks: Vec<&str> = huge
            .as_bytes()
            .chunks(512)
            .map(|c| std::str::from_utf8(c).unwrap())
            .chain(std::iter::once(last.as_str()))
            .collect();
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(chunks))).with_max_frame(1024);
        let mut recorder = Recorder::default();

        driver.ask("q", AbortSignal::never(), &mut recorder).await.unwrap();

        assert!(recorder.progress.is_empty());
        assert_eq!(recorder.finals, vec!["small"]);
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_without_final() {
        let first = node("intent_classification");
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(vec![&first])));
        let mut recorder = Recorder::default();

        let err = driver.ask("q", AbortSignal::never(), &mut recorder).await.unwrap_err();

        assert_eq!(err, ChatError::Incomplete);
        assert_eq!(recorder.errors, vec![ChatError::Incomplete]);
    }

    #[tokio::test]
    async fn test_transport_error_reported_once() {
        let first = node("intent_classification");
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::with_items(vec![
            Ok(first.into_bytes()),
            Err(BackendError::Network("connection reset".to_string())),
            Ok(final_frame("never").into_bytes()),
        ])));
        let mut recorder = Recorder::default();

        let err = driver.ask("q", AbortSignal::never(), &mut recorder).await.unwrap_err();

        assert!(matches!(err, ChatError::Backend(BackendError::Network(_))));
        assert_eq!(recorder.errors.len(), 1);
        assert!(recorder.finals.is_empty());
    }

    #[tokio::test]
    async fn test_abort_mid_stream() {
        let first = node("intent_classification");
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::stalling(vec![&first])));
        let (handle, signal) = abort_pair();
        let mut recorder = Recorder::default();

        let aborter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            handle.abort();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(2),
            driver.ask("q", signal, &mut recorder),
        )
        .await
        .expect("abort should end the stream")
        .unwrap_err();
        aborter.await.unwrap();

        assert_eq!(err, ChatError::Aborted);
        assert_eq!(recorder.errors, vec![ChatError::Aborted]);
        assert_eq!(recorder.progress, vec!["intent_classification"]);
        assert!(!driver.is_busy());
    }

    #[tokio::test]
    async fn test_abort_before_frames_are_dispatched() {
        let body = format!("{}{}", node("intent_classification"), final_frame("late"));
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(vec![&body])));
        let (handle, signal) = abort_pair();
        handle.abort();
        let mut recorder = Recorder::default();

        let err = driver.ask("q", signal, &mut recorder).await.unwrap_err();

        assert_eq!(err, ChatError::Aborted);
        assert!(recorder.progress.is_empty());
        assert!(recorder.finals.is_empty());
        assert_eq!(recorder.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_busy_rejected() {
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(vec![])));
        let permit = driver.begin().unwrap();
        let mut recorder = Recorder::default();

        let err = driver.ask("q", AbortSignal::never(), &mut recorder).await.unwrap_err();
        assert_eq!(err, ChatError::Busy);
        assert!(recorder.errors.is_empty());

        drop(permit);
        assert!(!driver.is_busy());
        assert!(driver.begin().is_ok());
    }

    #[tokio::test]
    async fn test_empty_question() {
        let driver = ChatDriver::new(Arc::new(ScriptedBackend::new(vec![])));
        let mut recorder = Recorder::default();

        let err = driver.ask("   ", AbortSignal::never(), &mut recorder).await.unwrap_err();
        assert_eq!(err, ChatError::EmptyQuestion);
        assert_eq!(recorder.errors, vec![ChatError::EmptyQuestion]);
    }
}
