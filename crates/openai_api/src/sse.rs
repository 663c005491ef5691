//! Incremental decoder for `text/event-stream` response bodies.
//!
//! [`EventStreamDecoder`] is push-based: arbitrary byte chunks go in, complete
//! [`RawEvent`]s come out. Lines split across chunk boundaries are carried over
//! until their terminator arrives, so the decoded sequence never depends on how
//! the transport happened to slice the body. [`EventStreamReader`] wraps the
//! decoder around an async byte stream and hands events out one at a time.

use std::collections::VecDeque;

use futures_util::{Stream, StreamExt};
use thiserror::Error;

use crate::error::ApiError;

/// Default upper bound for a single buffered line.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1 << 16;

/// `data` payload marking the end of a streamed response.
pub const DONE_SENTINEL: &[u8] = b"[DONE]";

/// Framing failure raised while decoding an event stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("event-stream line exceeds the {limit} byte buffer limit")]
    BufferOverflow { limit: usize },
}

/// One unparsed frame: every recognised field with its accumulated bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub id: Option<Vec<u8>>,
    pub event: Option<Vec<u8>>,
    pub data: Option<Vec<u8>>,
    pub retry: Option<Vec<u8>>,
}

impl RawEvent {
    /// True when no field carries any bytes.
    pub fn is_empty(&self) -> bool {
        [&self.id, &self.event, &self.data, &self.retry]
            .into_iter()
            .all(|field| field.as_ref().map_or(true, Vec::is_empty))
    }

    fn field_mut(&mut self, name: &[u8]) -> Option<&mut Option<Vec<u8>>> {
        match name {
            b"id" => Some(&mut self.id),
            b"event" => Some(&mut self.event),
            b"data" => Some(&mut self.data),
            b"retry" => Some(&mut self.retry),
            _ => None,
        }
    }

    fn append(&mut self, name: &[u8], value: &[u8]) {
        // Unknown field names are ignored.
        let Some(slot) = self.field_mut(name) else {
            return;
        };

        match slot {
            Some(existing) => {
                if !existing.is_empty() {
                    existing.push(b'\n');
                }
                existing.extend_from_slice(value);
            }
            None => *slot = Some(value.to_vec()),
        }
    }
}

/// Immutable view of a completed frame handed to the response projector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: Vec<u8>,
    /// Reconnection hint in milliseconds, when the server sent a numeric `retry:`.
    pub retry: Option<u64>,
}

impl DecodedFrame {
    /// Byte-for-byte comparison against [`DONE_SENTINEL`].
    pub fn is_done(&self) -> bool {
        self.data == DONE_SENTINEL
    }
}

impl From<RawEvent> for DecodedFrame {
    fn from(raw: RawEvent) -> Self {
        let text = |bytes: Vec<u8>| String::from_utf8_lossy(&bytes).into_owned();
        let retry = raw.retry.as_deref().and_then(|value| {
            std::str::from_utf8(value)
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok())
        });

        Self {
            id: raw.id.map(text),
            event: raw.event.map(text),
            data: raw.data.unwrap_or_default(),
            retry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// At least one line of the current frame has been seen.
    Field,
    /// Between frames; further blank lines are no-ops.
    BlankRun,
}

/// Line-oriented event-stream framing state machine.
#[derive(Debug)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` known to hold no line terminator.
    scanned: usize,
    pending: RawEvent,
    state: ScanState,
    max_buffer_size: usize,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_SIZE)
    }
}

impl EventStreamDecoder {
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            pending: RawEvent::default(),
            state: ScanState::BlankRun,
            max_buffer_size: max_buffer_size.max(1),
        }
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Feed arbitrary bytes and drain every frame completed by them.
    ///
    /// A line longer than the buffer limit aborts decoding; the decoder state
    /// is cleared because nothing after a framing violation can be trusted.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<RawEvent>, DecodeError> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        let mut consumed = 0;
        // Carried bytes were already searched on earlier calls.
        let mut search_from = self.scanned;
        while let Some(found) = buffer[search_from..].iter().position(|byte| *byte == b'\n') {
            let end = search_from + found;
            if end - consumed > self.max_buffer_size {
                return Err(self.overflow());
            }
            let raw_line = &buffer[consumed..end];
            let line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
            consumed = end + 1;
            search_from = consumed;
        }

        buffer.drain(..consumed);
        if buffer.len() > self.max_buffer_size {
            return Err(self.overflow());
        }
        self.scanned = buffer.len();
        self.buffer = buffer;

        Ok(events)
    }

    /// Whether any bytes or fields are waiting for a terminator.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.pending.is_empty()
    }

    /// Discard partial line and frame state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.pending = RawEvent::default();
        self.state = ScanState::BlankRun;
    }

    fn overflow(&mut self) -> DecodeError {
        self.reset();
        DecodeError::BufferOverflow {
            limit: self.max_buffer_size,
        }
    }

    fn process_line(&mut self, line: &[u8]) -> Option<RawEvent> {
        if line.is_empty() {
            let previous = std::mem::replace(&mut self.state, ScanState::BlankRun);
            let event = std::mem::take(&mut self.pending);
            if previous == ScanState::BlankRun || event.is_empty() {
                return None;
            }
            return Some(event);
        }

        if line.starts_with(b":") {
            return None;
        }

        let (name, value) = match line.iter().position(|byte| *byte == b':') {
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &[][..]),
        };
        self.pending.append(name, value);
        self.state = ScanState::Field;
        None
    }
}

/// Pull-style reader yielding one [`RawEvent`] per call.
pub struct EventStreamReader<S> {
    source: S,
    decoder: EventStreamDecoder,
    ready: VecDeque<RawEvent>,
    exhausted: bool,
}

impl<S, B, E> EventStreamReader<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<ApiError>,
{
    pub fn new(source: S, max_buffer_size: usize) -> Self {
        Self {
            source,
            decoder: EventStreamDecoder::new(max_buffer_size),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next complete frame, or `None` once the source is exhausted.
    ///
    /// An unterminated frame left over at end of input is dropped.
    pub async fn read_event(&mut self) -> Result<Option<RawEvent>, ApiError> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            if self.exhausted {
                return Ok(None);
            }

            match self.source.next().await {
                Some(chunk) => {
                    let chunk = chunk.map_err(Into::into)?;
                    self.ready.extend(self.decoder.feed(chunk.as_ref())?);
                }
                None => {
                    self.exhausted = true;
                    if self.decoder.has_pending() {
                        tracing::debug!("event stream ended inside an unterminated frame");
                        self.decoder.reset();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeError, DecodedFrame, EventStreamDecoder, RawEvent};

    fn data(value: &str) -> RawEvent {
        RawEvent {
            data: Some(value.as_bytes().to_vec()),
            ..RawEvent::default()
        }
    }

    #[test]
    fn decodes_frames_incrementally() {
        let mut decoder = EventStreamDecoder::default();
        assert!(decoder.feed(b"data: hel").unwrap().is_empty());
        assert!(decoder.feed(b"lo\n").unwrap().is_empty());
        assert_eq!(decoder.feed(b"\n").unwrap(), vec![data("hello")]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn carried_bytes_are_not_searched_again() {
        let mut decoder = EventStreamDecoder::new(4096);
        let line = format!("data: {}", "x".repeat(3000));
        for chunk in line.as_bytes().chunks(16) {
            assert!(decoder.feed(chunk).unwrap().is_empty());
            assert_eq!(decoder.scanned, decoder.buffer.len());
        }

        let events = decoder.feed(b"\n\ndata: next").unwrap();
        assert_eq!(events, vec![data(&"x".repeat(3000))]);
        assert_eq!(decoder.buffer, b"data: next");
        assert_eq!(decoder.scanned, decoder.buffer.len());
    }

    #[test]
    fn blank_runs_between_frames_are_discarded() {
        let mut decoder = EventStreamDecoder::default();
        let events = decoder.feed(b"\n\n\ndata: a\n\n\n\ndata: b\n\n").unwrap();
        assert_eq!(events, vec![data("a"), data("b")]);
    }

    #[test]
    fn retry_hint_is_parsed_when_numeric() {
        let mut decoder = EventStreamDecoder::default();
        let mut events = decoder.feed(b"retry: 1500\ndata: x\n\nretry: soon\ndata: y\n\n").unwrap();
        let second = DecodedFrame::from(events.pop().unwrap());
        let first = DecodedFrame::from(events.pop().unwrap());
        assert_eq!(first.retry, Some(1500));
        assert_eq!(second.retry, None);
    }

    #[test]
    fn overflow_clears_state() {
        let mut decoder = EventStreamDecoder::new(4);
        assert_eq!(
            decoder.feed(b"data: too long"),
            Err(DecodeError::BufferOverflow { limit: 4 })
        );
        assert!(!decoder.has_pending());
    }
}
