//! Protocol module containing the JSON envelope and the line framing codec.

pub mod codec;
pub mod envelope;

pub use codec::{
    decode_envelope, encode_envelope, stamp_origin, CodecError, FrameCodec, ProtocolError,
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_TERMINATOR,
};
pub use envelope::*;
