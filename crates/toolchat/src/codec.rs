//! Framing of [`Event`]s over a byte stream.
//!
//! Every event is written as `data: <json>\n\n`. Compact JSON never contains a raw newline, so
//! a blank line can only ever terminate a frame. Decoding keeps a partial-frame buffer across
//! reads and drops (and counts) frames whose payload is not a valid event.
use std::io;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::events::Event;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode event: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a single event as a complete frame
pub fn encode_frame(event: &Event) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(event)?;
    Ok(format!("data: {}\n\n", payload))
}

/// Returns the offset of the blank line ending the first frame and the terminator length
fn find_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' {
            if buf[i + 1] == b'\n' {
                return Some((i, 2));
            }
            if buf[i + 1] == b'\r' && buf.get(i + 2) == Some(&b'\n') {
                return Some((i, 3));
            }
        }
        i += 1;
    }
    None
}

/// Parse the body of one frame.
///
/// `Ok(None)` means the frame carried no data lines (a comment or keep-alive).
fn parse_frame(frame: &[u8]) -> Result<Option<Event>, String> {
    let text = std::str::from_utf8(frame).map_err(|e| format!("invalid utf-8: {}", e))?;

    let mut data: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            data.push(value);
        }
    }

    if data.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&data.join("\n"))
        .map(Some)
        .map_err(|e| e.to_string())
}

/// A [`tokio_util::codec`] implementation of the event framing
#[derive(Debug, Default)]
pub struct EventCodec {
    decode_errors: usize,
}

impl EventCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames dropped because they could not be decoded
    pub fn decode_errors(&self) -> usize {
        self.decode_errors
    }

    fn record_decode_error(&mut self, reason: &str) {
        self.decode_errors += 1;
        tracing::warn!(
            reason,
            decode_errors = self.decode_errors,
            "dropping undecodable frame"
        );
    }
}

impl Decoder for EventCodec {
    type Item = Event;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Event>, CodecError> {
        while let Some((end, terminator)) = find_terminator(src) {
            let frame = src.split_to(end + terminator);
            match parse_frame(&frame[..end]) {
                Ok(Some(event)) => return Ok(Some(event)),
                Ok(None) => continue,
                Err(reason) => self.record_decode_error(&reason),
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Event>, CodecError> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if src.iter().any(|b| !b.is_ascii_whitespace()) {
            // An unterminated frame at end of stream is incomplete by definition
            self.record_decode_error("stream ended inside a frame");
        }
        src.clear();
        Ok(None)
    }
}

impl Encoder<Event> for EventCodec {
    type Error = CodecError;

    fn encode(&mut self, event: Event, dst: &mut BytesMut) -> Result<(), CodecError> {
        let payload = serde_json::to_vec(&event)?;
        dst.reserve(payload.len() + 8);
        dst.put_slice(b"data: ");
        dst.put_slice(&payload);
        dst.put_slice(b"\n\n");
        Ok(())
    }
}

/// Push-style decoder for callers that receive raw chunks rather than an `AsyncRead`
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: BytesMut,
    codec: EventCodec,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        // decode never fails, bad frames are counted and skipped
        while let Ok(Some(event)) = self.codec.decode(&mut self.buffer) {
            events.push(event);
        }
        events
    }

    /// Flush at end of stream; returns any final event
    pub fn finish(&mut self) -> Option<Event> {
        self.codec.decode_eof(&mut self.buffer).ok().flatten()
    }

    pub fn decode_errors(&self) -> usize {
        self.codec.decode_errors()
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
