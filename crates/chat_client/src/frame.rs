//! Incremental decoder for the `data: <payload>\n\n` event-stream framing.
//!
//! Network reads do not line up with frames: a chunk may carry several
//! frames, a fragment of one, or split a UTF-8 code point. The decoder keeps
//! the undelimited tail in a byte buffer and only parses complete frames, so
//! the payload sequence depends on the bytes received and never on how they
//! were chunked.
//!
//! A token made only of newlines cannot survive this framing: `data: \n\n\n`
//! reads as an empty payload followed by a stray blank line, and both are
//! dropped. Servers that need to stream line breaks must escape them.

use bytes::{Buf, BytesMut};

pub const DATA_FIELD: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

const IGNORED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// Result of feeding one chunk to a [`FrameDecoder`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    /// Payloads of the frames completed by this chunk, in order.
    pub payloads: Vec<String>,
    /// Whether the end-of-stream sentinel has been seen.
    pub done: bool,
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Offset up to which the buffer is known to hold no delimiter.
    scanned: usize,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly received bytes and drain every frame they complete.
    ///
    /// Once the sentinel has been decoded all further input is ignored.
    pub fn decode(&mut self, chunk: &[u8]) -> DecodedChunk {
        let mut decoded = DecodedChunk::default();
        if self.done {
            decoded.done = true;
            return decoded;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some((frame_len, delimiter_len)) = find_frame_end(&self.buffer, self.scanned) {
            let frame = self.buffer.split_to(frame_len);
            self.buffer.advance(delimiter_len);
            self.scanned = 0;

            let Some(payload) = parse_frame(&frame) else {
                continue;
            };

            if payload == DONE_SENTINEL {
                self.done = true;
                self.buffer.clear();
                self.scanned = 0;
                break;
            }

            if !payload.is_empty() {
                decoded.payloads.push(payload);
            }
        }

        // A delimiter may still complete from the last two bytes.
        self.scanned = self.buffer.len().saturating_sub(2);
        decoded.done = self.done;
        decoded
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes of an incomplete frame still waiting for its delimiter.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Locate the first blank-line delimiter at or after `from`.
///
/// Returns the length of the frame body and of the delimiter that follows
/// it. Accepts `\n\n` and `\n\r\n` so CRLF streams decode the same way.
fn find_frame_end(buf: &[u8], mut from: usize) -> Option<(usize, usize)> {
    while let Some(offset) = buf[from..].iter().position(|b| *b == b'\n') {
        let newline = from + offset;
        let rest = &buf[newline + 1..];
        if rest.starts_with(b"\n") {
            return Some((newline, 2));
        }
        if rest.starts_with(b"\r\n") {
            return Some((newline, 3));
        }
        from = newline + 1;
    }
    None
}

/// Extract the data payload of one frame, or `None` for frames that carry
/// no data (keep-alive comments, bare `event:` lines).
fn parse_frame(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let mut data: Option<String> = None;

    for raw_line in text.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(value) = line.strip_prefix(DATA_FIELD) {
            let value = value.strip_prefix(' ').unwrap_or(value);
            push_line(&mut data, value);
        } else if line.starts_with(':') || IGNORED_FIELDS.iter().any(|f| line.starts_with(f)) {
            continue;
        } else if data.is_some() {
            // Some servers write tokens containing raw newlines without
            // re-prefixing the continuation.
            push_line(&mut data, line);
        }
    }

    data
}

fn push_line(data: &mut Option<String>, line: &str) {
    match data {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(line);
        }
        None => *data = Some(line.to_string()),
    }
}
