//! Null-delimited framing and text decoding.
//!
//! Clients terminate every message with a single `0x00` byte. A single
//! socket read may carry several messages (clients batch them), part of a
//! message, or both, so raw bytes are accumulated in a [`FrameBuffer`]
//! which hands back every complete frame it holds.
//!
//! Frames are decoded with [`decode_text`]: strict ASCII first, then
//! UTF-8, then whatever charset `chardetng` guesses.

use std::borrow::Cow;

use bytes::{Buf, Bytes, BytesMut};
use chardetng::EncodingDetector;

use crate::TransportError;

/// The byte that terminates every frame on the wire.
pub const DELIMITER: u8 = 0x00;

/// Largest unterminated frame we are willing to buffer (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Accumulates incoming bytes and splits them on [`DELIMITER`].
pub struct FrameBuffer {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameBuffer {
    /// Creates a buffer with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a buffer that rejects unterminated frames longer than
    /// `max_frame_size` bytes.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_frame_size,
        }
    }

    /// Appends `data` and returns every complete frame, in arrival order.
    ///
    /// Empty frames (two delimiters in a row, or a stray leading
    /// delimiter) are split artifacts and are dropped here so they never
    /// reach the dispatcher. Bytes after the last delimiter stay buffered
    /// for the next push.
    ///
    /// # Errors
    /// Returns [`TransportError::FrameTooLarge`] if the buffered remainder
    /// grows past the configured limit.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>, TransportError> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == DELIMITER) {
            let frame = self.buffer.split_to(pos).freeze();
            self.buffer.advance(1);
            if !frame.is_empty() {
                frames.push(frame);
            }
        }

        if self.buffer.len() > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                limit: self.max_frame_size,
            });
        }

        Ok(frames)
    }

    /// Number of buffered bytes that do not yet form a complete frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if no partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a raw frame into text.
///
/// Tries a strict 7-bit decode, then UTF-8, then a best-effort decode in
/// the charset `chardetng` detects. Returns `None` only if all three fail.
pub fn decode_text(raw: &[u8]) -> Option<String> {
    if raw.is_ascii() {
        // ASCII is a strict subset of UTF-8, so this cannot fail.
        return std::str::from_utf8(raw).ok().map(str::to_owned);
    }

    if let Ok(text) = std::str::from_utf8(raw) {
        return Some(text.to_owned());
    }

    let mut detector = EncodingDetector::new();
    detector.feed(raw, true);
    let encoding: &'static encoding_rs::Encoding = detector.guess(None, true);
    tracing::debug!(encoding = encoding.name(), "falling back to detected charset");

    encoding
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(Cow::into_owned)
}

/// Renders bytes as lowercase hex for the undecodable-frame log.
pub(crate) fn hex_dump(raw: &[u8]) -> String {
    raw.iter().map(|b| format!("{b:02x}")).collect()
}
