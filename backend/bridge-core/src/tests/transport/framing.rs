use crate::error::TransportError;
use crate::transport::framing::{
    MAX_INBOUND_FRAME_LEN, decode_message, encode_request, read_frame, write_frame,
};

use models::{CommandType, CorrelationId, OutboundRequest};

use serde_json::{Value, json};

fn frame(body: &[u8]) -> Vec<u8> {
    let mut framed = (body.len() as u32).to_ne_bytes().to_vec();
    framed.extend_from_slice(body);
    framed
}

/// **VALUE**: Verifies the native-messaging frame layout of an outbound request.
///
/// **WHY THIS MATTERS**: The companion reads exactly this layout. A big-endian prefix or
/// a missing length would make it read garbage and exit.
///
/// **BUG THIS CATCHES**: Would catch a wrong prefix width or byte order, or renamed keys.
#[test]
fn given_request_when_encoded_then_prefix_is_native_length_and_body_is_json() {
    // GIVEN: A ping request
    let request = OutboundRequest {
        id: CorrelationId::new("1"),
        command: CommandType::Ping,
        payload: json!({}),
    };

    // WHEN: Encoding it
    let encoded = encode_request(&request).expect("encodes");

    // THEN: 4-byte native length, then the JSON body
    let (prefix, body) = encoded.split_at(4);
    let length = u32::from_ne_bytes(prefix.try_into().expect("4 bytes")) as usize;
    assert_eq!(length, body.len());
    let value: Value = serde_json::from_slice(body).expect("json body");
    assert_eq!(value, json!({"id": "1", "type": "companion.ping", "payload": {}}));
}

/// **VALUE**: Verifies that consecutive frames are read back one at a time.
///
/// **BUG THIS CATCHES**: Would catch a reader that consumes past the frame boundary.
#[tokio::test]
async fn given_two_frames_when_reading_then_each_body_is_returned_in_order() {
    let mut bytes = frame(br#"{"kind":"event","type":"host.ready","root":"/opt"}"#);
    bytes.extend(frame(br#"{"kind":"response","id":"1","ok":true}"#));
    let mut reader = bytes.as_slice();

    let first = read_frame(&mut reader).await.expect("first").expect("frame");
    let second = read_frame(&mut reader).await.expect("second").expect("frame");
    let end = read_frame(&mut reader).await.expect("eof");

    assert_eq!(
        decode_message(&first).expect("event").as_event().map(|e| e.event_type().to_string()),
        Some(String::from("host.ready"))
    );
    assert!(decode_message(&second).expect("response").as_response().is_some());
    assert!(end.is_none(), "Clean EOF between frames is not an error");
}

/// **VALUE**: Verifies that an oversized length prefix is rejected before allocating.
///
/// **WHY THIS MATTERS**: A corrupted prefix can claim gigabytes; allocating that would
/// take the bridge down.
///
/// **BUG THIS CATCHES**: Would catch a missing size check.
#[tokio::test]
async fn given_oversized_prefix_when_reading_then_framing_error() {
    let bytes = ((MAX_INBOUND_FRAME_LEN + 1) as u32).to_ne_bytes();
    let mut reader = &bytes[..];

    let result = read_frame(&mut reader).await;

    assert!(matches!(result, Err(TransportError::Framing { .. })));
}

#[tokio::test]
async fn given_truncated_body_when_reading_then_framing_error() {
    let mut bytes = 10u32.to_ne_bytes().to_vec();
    bytes.extend_from_slice(b"abc");
    let mut reader = bytes.as_slice();

    let result = read_frame(&mut reader).await;

    assert!(matches!(result, Err(TransportError::Framing { .. })));
}

/// **VALUE**: Verifies that a stream cut off inside the length prefix is a framing error.
///
/// **WHY THIS MATTERS**: A companion that crashes while writing a frame must surface as
/// lost framing, not as a polite close that leaves the user without a diagnostic.
///
/// **BUG THIS CATCHES**: Would catch `UnexpectedEof` from a partial prefix being folded
/// into the clean-close path.
#[tokio::test]
async fn given_partial_length_prefix_when_reading_then_framing_error() {
    // GIVEN: Two of the four length bytes, then end of stream
    let bytes = 7u32.to_ne_bytes();
    let mut reader = &bytes[..2];

    // WHEN
    let result = read_frame(&mut reader).await;

    // THEN
    match result {
        Err(TransportError::Framing { message, .. }) => {
            assert!(message.contains("2 of 4"), "Unexpected message: {message}");
        }
        other => panic!("Expected framing error, got {other:?}"),
    }
}

#[tokio::test]
async fn given_frame_when_written_then_bytes_match() {
    let mut sink: Vec<u8> = Vec::new();
    let framed = frame(b"{}");

    write_frame(&mut sink, &framed).await.expect("write");

    assert_eq!(sink, framed);
}

#[test]
fn given_well_framed_non_message_when_decoding_then_error() {
    assert!(decode_message(br#"{"kind":"gossip"}"#).is_err());
    assert!(decode_message(b"not json").is_err());
}
