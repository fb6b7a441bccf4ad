//! Codec Tests
//!
//! Tests for the fixed records and datagram assembly.

use qrate_udp_proxy::protocol::{
    decode_reply, encode_error_reply, encode_key_by_id_reply, encode_key_by_id_request,
    encode_key_by_length_reply, encode_key_by_length_request, split_request, CommandCode,
    ErrorDescriptionBody, KeyByIdRequestBody, KeyByLengthReplyBody, KeyByLengthRequestBody, KeyId,
    Reply, ReplyHeader, RequestHeader, WireRecord, ERROR_MESSAGE_LENGTH_MAX, KEY_LENGTH_MAX,
    RECV_PACKET_SIZE, SYSTEM_MAGIC,
};
use qrate_udp_proxy::ProxyError;

// =============================================================================
// Record Sizes
// =============================================================================

#[test]
fn test_record_sizes() {
    assert_eq!(RequestHeader::SIZE, 16);
    assert_eq!(ReplyHeader::SIZE, 16);
    assert_eq!(KeyByLengthRequestBody::SIZE, 4);
    assert_eq!(KeyByLengthReplyBody::SIZE, 32);
    assert_eq!(KeyByIdRequestBody::SIZE, 16);
    assert_eq!(ErrorDescriptionBody::SIZE, 16);
}

#[test]
fn test_largest_replies_fit_receive_size() {
    assert!(ReplyHeader::SIZE + KeyByLengthReplyBody::SIZE + KEY_LENGTH_MAX <= RECV_PACKET_SIZE);
    assert!(ReplyHeader::SIZE + ErrorDescriptionBody::SIZE + ERROR_MESSAGE_LENGTH_MAX <= RECV_PACKET_SIZE);
}

#[test]
fn test_encode_produces_exact_size() {
    assert_eq!(RequestHeader::new(SYSTEM_MAGIC, 1, 2).encode().len(), RequestHeader::SIZE);
    assert_eq!(ReplyHeader::new(SYSTEM_MAGIC, 1, -1).encode().len(), ReplyHeader::SIZE);
    assert_eq!(KeyByLengthRequestBody::new(32).encode().len(), 4);
    assert_eq!(
        KeyByLengthReplyBody::new(KeyId::default(), 0).encode().len(),
        KeyByLengthReplyBody::SIZE
    );
    assert_eq!(KeyByIdRequestBody::new(KeyId::default()).encode().len(), 16);
    assert_eq!(ErrorDescriptionBody::new(0.0).encode().len(), 16);
}

// =============================================================================
// Round Trips (boundary values)
// =============================================================================

#[test]
fn test_request_header_round_trip() {
    for (magic, cmd_magic, code) in [(SYSTEM_MAGIC, 0, 0), (0, u16::MAX, u16::MAX), (u32::MAX, 7, 2)] {
        let header = RequestHeader::new(magic, cmd_magic, code);
        assert_eq!(RequestHeader::decode(&header.encode()).unwrap(), header);
    }
}

#[test]
fn test_reply_header_round_trip() {
    for code in [0i16, -1, -201, i16::MIN, i16::MAX] {
        let header = ReplyHeader::new(SYSTEM_MAGIC, 0xBEEF, code);
        assert_eq!(ReplyHeader::decode(&header.encode()).unwrap(), header);
    }
}

#[test]
fn test_key_length_round_trip_boundaries() {
    for len in [0u32, 1, 1384, u32::MAX] {
        let body = KeyByLengthRequestBody::new(len);
        assert_eq!(KeyByLengthRequestBody::decode(&body.encode()).unwrap(), body);
    }
}

#[test]
fn test_key_id_round_trip_boundaries() {
    for id in [KeyId([0x00; 16]), KeyId([0xFF; 16])] {
        let body = KeyByIdRequestBody::new(id);
        assert_eq!(KeyByIdRequestBody::decode(&body.encode()).unwrap(), body);

        let reply = KeyByLengthReplyBody::new(id, u64::MAX);
        assert_eq!(KeyByLengthReplyBody::decode(&reply.encode()).unwrap(), reply);
    }
}

#[test]
fn test_error_description_round_trip() {
    for retry in [0.0f64, 2.5, f64::MAX] {
        let body = ErrorDescriptionBody::new(retry);
        assert_eq!(ErrorDescriptionBody::decode(&body.encode()).unwrap(), body);
    }
}

// =============================================================================
// Key Id Normalization
// =============================================================================

#[test]
fn test_key_id_from_short_slice_is_zero_padded() {
    let id = KeyId::from_slice(&[0xAA, 0xBB]);
    let mut expected = [0u8; 16];
    expected[0] = 0xAA;
    expected[1] = 0xBB;
    assert_eq!(id, KeyId(expected));
}

#[test]
fn test_key_id_from_long_slice_is_truncated() {
    let long: Vec<u8> = (0..40).collect();
    let id = KeyId::from_slice(&long);
    assert_eq!(id.as_bytes()[..], long[..16]);
}

#[test]
fn test_key_id_display_is_hex() {
    let id = KeyId([0x01; 16]);
    assert_eq!(id.to_string(), "01".repeat(16));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_decode_undersized_record() {
    let result = RequestHeader::decode(&[0xAC, 0xEA, 0xAC, 0xEB]);
    match result {
        Err(ProxyError::Format(msg)) => assert!(msg.contains("Incomplete record")),
        other => panic!("Expected format error, got {:?}", other),
    }
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let mut bytes = KeyByLengthRequestBody::new(32).encode();
    bytes.extend_from_slice(b"trailing");
    assert_eq!(KeyByLengthRequestBody::decode(&bytes).unwrap().key_length, 32);
}

#[test]
fn test_split_request_returns_remaining_body() {
    let datagram = encode_key_by_length_request(9, 48);
    let (header, body) = split_request(&datagram).unwrap();

    assert_eq!(header.system_magic, SYSTEM_MAGIC);
    assert_eq!(header.command_magic, 9);
    assert_eq!(header.command_code, CommandCode::GetKeyByLength.as_u16());
    assert_eq!(body, &48u32.to_be_bytes()[..]);
}

#[test]
fn test_command_codes() {
    assert_eq!(CommandCode::from_u16(1), Some(CommandCode::GetKeyById));
    assert_eq!(CommandCode::from_u16(2), Some(CommandCode::GetKeyByLength));
    assert_eq!(CommandCode::from_u16(0), None);
    assert_eq!(CommandCode::from_u16(3), None);
}

// =============================================================================
// Wire Format Verification Tests
// =============================================================================

#[test]
fn test_wire_format_key_by_length_request() {
    let encoded = encode_key_by_length_request(7, 32);

    // [AC EA AC EB][00 07][00 02][00 x 8][00 00 00 20]
    assert_eq!(encoded.len(), 20);
    assert_eq!(&encoded[0..4], &[0xAC, 0xEA, 0xAC, 0xEB]);
    assert_eq!(&encoded[4..6], &[0x00, 0x07]);
    assert_eq!(&encoded[6..8], &[0x00, 0x02]);
    assert_eq!(&encoded[8..16], &[0u8; 8]);
    assert_eq!(&encoded[16..20], &[0x00, 0x00, 0x00, 0x20]);
}

#[test]
fn test_wire_format_key_by_id_request() {
    let encoded = encode_key_by_id_request(0x0102, KeyId([0x5A; 16]));

    assert_eq!(encoded.len(), 32);
    assert_eq!(&encoded[4..6], &[0x01, 0x02]);
    assert_eq!(&encoded[6..8], &[0x00, 0x01]);
    assert_eq!(&encoded[16..32], &[0x5A; 16]);
}

#[test]
fn test_wire_format_key_by_length_reply() {
    let encoded = encode_key_by_length_reply(7, KeyId([0x01; 16]), 1000, &[0x02; 32]);

    assert_eq!(encoded.len(), 16 + 32 + 32);
    assert_eq!(&encoded[0..4], &[0xAC, 0xEA, 0xAC, 0xEB]);
    assert_eq!(&encoded[4..6], &[0x00, 0x07]);
    assert_eq!(&encoded[6..8], &[0x00, 0x00]); // success
    assert_eq!(&encoded[16..32], &[0x01; 16]);
    assert_eq!(&encoded[32..40], &1000u64.to_be_bytes());
    assert_eq!(&encoded[40..48], &[0u8; 8]);
    assert_eq!(&encoded[48..], &[0x02; 32]);
}

#[test]
fn test_wire_format_error_reply() {
    let encoded = encode_error_reply(7, -100, 2.5, b"overloaded");

    assert_eq!(&encoded[6..8], &(-100i16).to_be_bytes());
    assert_eq!(&encoded[16..24], &2.5f64.to_be_bytes());
    assert_eq!(&encoded[24..32], &[0u8; 8]);
    assert_eq!(&encoded[32..], b"overloaded");
}

// =============================================================================
// Truncation
// =============================================================================

#[test]
fn test_key_payload_truncated() {
    let key = vec![0x33; KEY_LENGTH_MAX + 500];

    let by_length = encode_key_by_length_reply(1, KeyId::default(), 0, &key);
    assert_eq!(by_length.len(), ReplyHeader::SIZE + KeyByLengthReplyBody::SIZE + KEY_LENGTH_MAX);

    let by_id = encode_key_by_id_reply(1, &key);
    assert_eq!(by_id.len(), ReplyHeader::SIZE + KEY_LENGTH_MAX);
}

#[test]
fn test_error_message_truncated() {
    let message = vec![b'x'; ERROR_MESSAGE_LENGTH_MAX * 2];
    let encoded = encode_error_reply(1, -1, 0.0, &message);
    assert_eq!(
        encoded.len(),
        ReplyHeader::SIZE + ErrorDescriptionBody::SIZE + ERROR_MESSAGE_LENGTH_MAX
    );
}

// =============================================================================
// Reply Decoding
// =============================================================================

#[test]
fn test_decode_success_reply() {
    let encoded = encode_key_by_id_reply(42, b"key-bytes");
    let (header, reply) = decode_reply(&encoded).unwrap();

    assert_eq!(header.command_magic, 42);
    assert_eq!(header.result_code, 0);
    match reply {
        Reply::Success { payload } => assert_eq!(&payload[..], b"key-bytes"),
        other => panic!("Expected success, got {:?}", other),
    }
}

#[test]
fn test_decode_error_reply() {
    let encoded = encode_error_reply(42, -100, 2.5, b"overloaded");
    let (header, reply) = decode_reply(&encoded).unwrap();

    assert_eq!(header.result_code, -100);
    assert!(!reply.is_success());
    assert_eq!(reply.error_message().as_deref(), Some("overloaded"));
    match reply {
        Reply::Error { retry_after, .. } => assert_eq!(retry_after, 2.5),
        other => panic!("Expected error, got {:?}", other),
    }
}

#[test]
fn test_decode_reply_wrong_magic() {
    let mut encoded = encode_key_by_id_reply(1, b"k").to_vec();
    encoded[0] = 0x00;
    assert!(matches!(decode_reply(&encoded), Err(ProxyError::Format(_))));
}

#[test]
fn test_decode_error_reply_missing_description() {
    let header = ReplyHeader::new(SYSTEM_MAGIC, 1, -5).encode();
    assert!(matches!(decode_reply(&header), Err(ProxyError::Format(_))));
}
