//! Server-Sent Event Frame Decoder
//!
//! Splits a chunked response body into event frames. Frames end at a blank
//! line; chunks can cut anywhere, including inside a multi-byte character, so
//! bytes are buffered until a full frame is available.

/// Largest frame accepted by default
pub const DEFAULT_MAX_FRAME: usize = 8 * 1024 * 1024;

/// Longest delimiter minus one; a boundary can start this far before new bytes
const DELIM_OVERLAP: usize = 3;

/// Incremental SSE frame decoder
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for a boundary
    scanned: usize,
    max_frame: usize,
    /// Dropping the rest of an oversized frame
    discarding: bool,
}

/// Outcome of decoding one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Concatenated `data:` payload
    Data(String),
    /// Frame was not valid UTF-8 or exceeded the size cap
    Invalid(String),
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that rejects frames larger than `max_frame` bytes
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_frame: max_frame.max(1),
            discarding: false,
        }
    }

    /// Feed a chunk, returning every frame it completed.
    ///
    /// Frames with no `data:` lines (comments, keep-alives) are dropped. A
    /// frame that outgrows the size cap is reported once as `Invalid` and
    /// skipped up to its terminating blank line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            let from = self.scanned.saturating_sub(DELIM_OVERLAP);
            let Some((end, delim_len)) = find_boundary(&self.buf, from) else {
                self.scanned = self.buf.len();
                break;
            };

            let raw: Vec<u8> = self.buf.drain(..end + delim_len).take(end).collect();
            self.scanned = 0;

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if raw.len() > self.max_frame {
                frames.push(self.oversized());
                continue;
            }
            if let Some(frame) = decode_frame(&raw) {
                frames.push(frame);
            }
        }

        if self.buf.len() > self.max_frame {
            if !self.discarding {
                frames.push(self.oversized());
                self.discarding = true;
            }
            // Keep the tail so a boundary split across chunks is still found
            let keep = self.buf.len().saturating_sub(DELIM_OVERLAP);
            self.buf.drain(..keep);
            self.scanned = self.buf.len();
        }
        frames
    }

    /// Flush whatever is left once the body ends.
    ///
    /// Servers are expected to terminate the last frame, but a trailing frame
    /// without the blank line is still delivered.
    pub fn finish(&mut self) -> Option<Frame> {
        let raw = std::mem::take(&mut self.buf);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || raw.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        decode_frame(&raw)
    }

    /// Bytes held back waiting for a frame boundary
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn oversized(&self) -> Frame {
        tracing::warn!(max_frame = self.max_frame, "Dropping oversized stream frame");
        Frame::Invalid(format!("frame exceeds {} bytes", self.max_frame))
    }
}

/// Earliest frame boundary at or after `from`, as `(frame_len, delimiter_len)`
fn find_boundary(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let hay = buf.get(from..)?;
    let lf = find(hay, b"\n\n").map(|i| (from + i, 2));
    let crlf = find(hay, b"\r\n\r\n").map(|i| (from + i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode_frame(raw: &[u8]) -> Option<Frame> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => return Some(Frame::Invalid(e.to_string())),
    };

    let mut data: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // event:, id: and retry: carry nothing the chat stream uses
    }

    if data.is_empty() {
        None
    } else {
        Some(Frame::Data(data.join("\n")))
    }
}
