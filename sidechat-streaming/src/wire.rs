//! Wire decoding: raw bytes to provider-native JSON frames.
//!
//! The decoder is fed one network chunk at a time and is stateful across
//! calls: it holds back an incomplete trailing UTF-8 sequence and an
//! incomplete trailing line, so the emitted frames are identical no matter
//! how the stream was split into chunks.

use serde_json::Value;

/// How events are framed on the wire.
///
/// Chosen once per stream from the response `Content-Type`, not per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// `text/event-stream`: only `data:` lines carry payloads, `[DONE]`
    /// marks the end.
    #[default]
    Sse,
    /// `application/x-ndjson`: every non-empty line is one JSON document.
    Ndjson,
}

impl Framing {
    /// Select the framing from a response content type.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.contains("application/x-ndjson") => Self::Ndjson,
            _ => Self::Sse,
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFrame {
    /// A provider-native JSON event.
    Event(Value),
    /// The SSE `[DONE]` sentinel.
    DoneMarker,
}

/// Incremental byte-stream decoder.
#[derive(Debug, Default)]
pub struct WireDecoder {
    framing: Framing,
    pending_bytes: Vec<u8>,
    line_buffer: String,
}

impl WireDecoder {
    /// Create a decoder with the given framing.
    #[must_use]
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            pending_bytes: Vec::new(),
            line_buffer: String::new(),
        }
    }

    /// Create an SSE decoder.
    #[must_use]
    pub fn sse() -> Self {
        Self::new(Framing::Sse)
    }

    /// Create an NDJSON decoder.
    #[must_use]
    pub fn ndjson() -> Self {
        Self::new(Framing::Ndjson)
    }

    /// Feed one chunk and collect every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.decode_utf8(chunk);
        self.drain_lines()
    }

    /// Flush state at end of stream: an unterminated final line is decoded,
    /// an incomplete UTF-8 tail is decoded lossily.
    pub fn finish(&mut self) -> Vec<RawFrame> {
        if !self.pending_bytes.is_empty() {
            let tail = std::mem::take(&mut self.pending_bytes);
            self.line_buffer.push_str(&String::from_utf8_lossy(&tail));
        }

        let mut frames = self.drain_lines();
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            if let Some(frame) = self.decode_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Append chunk bytes to the line buffer, holding back an incomplete
    /// trailing multi-byte sequence. Invalid bytes become U+FFFD rather than
    /// killing the stream.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending_bytes.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    self.line_buffer.push_str(text);
                    self.pending_bytes.clear();
                    break;
                }
                Err(error) => {
                    let valid_up_to = error.valid_up_to();
                    // Safe split: everything before valid_up_to is valid.
                    let valid = std::str::from_utf8(&self.pending_bytes[..valid_up_to])
                        .unwrap_or_default();
                    self.line_buffer.push_str(valid);

                    match error.error_len() {
                        Some(invalid_len) => {
                            self.line_buffer.push('\u{FFFD}');
                            self.pending_bytes.drain(..valid_up_to + invalid_len);
                        }
                        None => {
                            // Incomplete sequence at the chunk boundary:
                            // keep the tail for the next feed.
                            self.pending_bytes.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.decode_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn decode_line(&self, line: &str) -> Option<RawFrame> {
        match self.framing {
            Framing::Sse => {
                // Comment, `event:` and other non-data lines carry nothing.
                let payload = line.strip_prefix("data:")?.trim();
                if payload.is_empty() {
                    return None;
                }
                if payload == "[DONE]" {
                    return Some(RawFrame::DoneMarker);
                }
                Self::parse_payload(payload)
            }
            Framing::Ndjson => {
                let payload = line.trim();
                if payload.is_empty() {
                    return None;
                }
                Self::parse_payload(payload)
            }
        }
    }

    fn parse_payload(payload: &str) -> Option<RawFrame> {
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => Some(RawFrame::Event(value)),
            Err(error) => {
                // Best-effort contract: one bad vendor frame must not kill
                // an otherwise good stream.
                tracing::warn!("dropping unparseable stream line: {error} - {payload}");
                None
            }
        }
    }
}
