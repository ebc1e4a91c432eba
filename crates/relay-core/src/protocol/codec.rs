//! Line framing codec and JSON helpers for the relay wire protocol.
//!
//! Wire format:
//! ```text
//! [json object][terminator][json object][terminator]...
//! ```
//! The terminator is a single configurable byte (`\n` by default).  Compact
//! JSON never contains a raw newline, so the default terminator can never
//! appear inside a frame.
//!
//! [`FrameCodec`] plugs into `tokio_util::codec::{FramedRead, FramedWrite}`.
//! It only splits and joins frames; interpreting them is the job of
//! [`decode_envelope`] and of the relay itself.

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::envelope::{ClientId, Envelope};

/// Default frame terminator.
pub const DEFAULT_TERMINATOR: u8 = b'\n';

/// Default upper bound on a single frame, terminator excluded (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Errors raised while splitting the byte stream into frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// More than `limit` bytes arrived without a terminator.
    #[error("frame exceeds maximum length of {limit} bytes")]
    FrameTooLong { limit: usize },

    /// The underlying transport failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while interpreting frame contents.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, or a field has the wrong JSON type.
    #[error("malformed JSON frame: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

// ── Frame codec ───────────────────────────────────────────────────────────────

/// Splits a byte stream on a terminator byte.
///
/// Decoded frames have the terminator stripped.  A terminator immediately
/// following the previous one yields an empty frame; the connection driver
/// logs and skips those.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    terminator: u8,
    max_frame_size: usize,
    /// Bytes of the buffer already scanned without finding a terminator.
    next_index: usize,
}

impl FrameCodec {
    /// Creates a codec for the given terminator and frame size limit.
    pub fn new(terminator: u8, max_frame_size: usize) -> Self {
        Self {
            terminator,
            max_frame_size,
            next_index: 0,
        }
    }

    /// The byte that ends each frame.
    pub fn terminator(&self) -> u8 {
        self.terminator
    }

    /// The largest frame accepted, terminator excluded.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATOR, DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let found = src[self.next_index..]
            .iter()
            .position(|b| *b == self.terminator)
            .map(|offset| self.next_index + offset);

        match found {
            Some(pos) => {
                self.next_index = 0;
                if pos > self.max_frame_size {
                    return Err(CodecError::FrameTooLong {
                        limit: self.max_frame_size,
                    });
                }
                let mut frame = src.split_to(pos + 1);
                frame.truncate(pos);
                Ok(Some(frame))
            }
            None => {
                if src.len() > self.max_frame_size {
                    return Err(CodecError::FrameTooLong {
                        limit: self.max_frame_size,
                    });
                }
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    /// Unterminated bytes left at end of stream are discarded.
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                buf.clear();
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + 1);
        dst.put_slice(&item);
        dst.put_u8(self.terminator);
        Ok(())
    }
}

// ── JSON helpers ──────────────────────────────────────────────────────────────

/// Serializes an [`Envelope`] into a frame body (no terminator).
///
/// # Errors
///
/// Returns [`ProtocolError`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use relay_core::protocol::{encode_envelope, Envelope};
///
/// let bytes = encode_envelope(&Envelope::new("ping")).unwrap();
/// assert_eq!(&bytes[..], br#"{"type":"ping"}"#);
/// ```
pub fn encode_envelope(envelope: &Envelope) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(envelope)?))
}

/// Parses a frame body into an [`Envelope`].
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedJson`] if the frame is not a JSON
/// object or a known field has the wrong type.
pub fn decode_envelope(frame: &[u8]) -> Result<Envelope, ProtocolError> {
    Ok(serde_json::from_slice(frame)?)
}

/// Adds (or overwrites) an `origin` field on a raw JSON object frame.
///
/// Only the top-level object is touched; everything else is carried through
/// as parsed JSON values.  Keys come out in sorted order.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedJson`] if the frame is not a JSON
/// object.  Callers forward the original bytes in that case.
pub fn stamp_origin(frame: &[u8], origin: ClientId) -> Result<Bytes, ProtocolError> {
    let mut object: Map<String, Value> = serde_json::from_slice(frame)?;
    object.insert("origin".to_string(), Value::from(origin));
    Ok(Bytes::from(serde_json::to_vec(&object)?))
}
