//! Integration tests for the relay-core framing codec.
//!
//! These tests drive [`FrameCodec`] through `FramedRead` / `FramedWrite`
//! over scripted byte streams, exercising how frames are split across
//! arbitrary read boundaries, how envelopes are encoded on the way out, and
//! how relay payloads are stamped with their origin.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use relay_core::protocol::{error_code, kind, ClientInfo, Envelope, PING_FRAME};
use relay_core::{decode_envelope, encode_envelope, stamp_origin, CodecError, FrameCodec};
use tokio_test::io::Builder;
use tokio_util::codec::{FramedRead, FramedWrite};

/// Reads every frame from a scripted stream until EOF.
async fn collect_frames(reads: &[&[u8]], codec: FrameCodec) -> Vec<Vec<u8>> {
    let mut builder = Builder::new();
    for chunk in reads {
        builder.read(chunk);
    }
    let mut framed = FramedRead::new(builder.build(), codec);
    let mut frames = Vec::new();
    while let Some(frame) = framed.next().await {
        frames.push(frame.expect("frame must decode").to_vec());
    }
    frames
}

#[tokio::test]
async fn test_frames_split_across_reads_are_reassembled() {
    // Arrange
    let reads: &[&[u8]] = &[b"{\"type\":\"jo", b"in\",\"channel\":\"room1\"}\n{\"a\"", b":1}\n"];

    // Act
    let frames = collect_frames(reads, FrameCodec::default()).await;

    // Assert
    assert_eq!(frames.len(), 2);
    let join = decode_envelope(&frames[0]).expect("join decodes");
    assert_eq!(join.kind, kind::JOIN);
    assert_eq!(join.channel, "room1");
    assert_eq!(frames[1], b"{\"a\":1}");
}

#[tokio::test]
async fn test_empty_frames_are_yielded_for_the_reader_to_skip() {
    let frames = collect_frames(&[b"\n\n{}\n"], FrameCodec::default()).await;
    assert_eq!(frames, vec![Vec::new(), Vec::new(), b"{}".to_vec()]);
}

#[tokio::test]
async fn test_trailing_partial_frame_is_dropped_at_eof() {
    let frames = collect_frames(&[b"{\"a\":1}\n{\"half"], FrameCodec::default()).await;
    assert_eq!(frames, vec![b"{\"a\":1}".to_vec()]);
}

#[tokio::test]
async fn test_oversized_frame_surfaces_error() {
    // Arrange
    let stream = Builder::new().read(&[b'x'; 64]).build();
    let mut framed = FramedRead::new(stream, FrameCodec::new(b'\n', 16));

    // Act
    let result = framed.next().await;

    // Assert
    assert!(matches!(
        result,
        Some(Err(CodecError::FrameTooLong { limit: 16 }))
    ));
}

#[tokio::test]
async fn test_writer_appends_terminator_to_each_frame() {
    // Arrange
    let expected_join = br#"{"type":"channel_joined","channel":"room1","origin":1}"#;
    let mut wire = expected_join.to_vec();
    wire.push(b'\n');
    let mut ping = PING_FRAME.to_vec();
    ping.push(b'\n');
    let stream = Builder::new().write(&ping).write(&wire).build();
    let mut sink = FramedWrite::new(stream, FrameCodec::default());

    // Act
    let joined = encode_envelope(&Envelope::channel_joined("room1", 1, Vec::new()))
        .expect("encode must succeed");
    sink.send(Bytes::from_static(PING_FRAME))
        .await
        .expect("ping write");
    sink.send(joined).await.expect("joined write");
}

#[test]
fn test_channel_joined_matches_expected_wire_form() {
    let env = Envelope::channel_joined(
        "room1",
        2,
        vec![ClientInfo::new(1, "master")],
    );
    let bytes = encode_envelope(&env).expect("encode must succeed");
    assert_eq!(
        std::str::from_utf8(&bytes).expect("utf8"),
        r#"{"type":"channel_joined","channel":"room1","origin":2,"user_ids":[1],"clients":[{"id":1,"connection_type":"master"}]}"#
    );
}

#[test]
fn test_error_codes_decode_back() {
    for code in [
        error_code::ALREADY_JOINED,
        error_code::INVALID_PARAMETERS,
        error_code::UNKNOWN_COMMAND,
        error_code::KEY_UNAVAILABLE,
    ] {
        let bytes = encode_envelope(&Envelope::error(code)).expect("encode must succeed");
        let decoded = decode_envelope(&bytes).expect("decode must succeed");
        assert_eq!(decoded.kind, kind::ERROR);
        assert_eq!(decoded.error, code);
    }
}

#[test]
fn test_relay_payload_stamping_matches_end_to_end_example() {
    let stamped = stamp_origin(br#"{"foo":"bar"}"#, 1).expect("object frame");
    assert_eq!(&stamped[..], br#"{"foo":"bar","origin":1}"#);
}
