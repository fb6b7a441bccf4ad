//! Thrift Binary Protocol Tests
//!
//! Drives the protocol and the QkdApiService calls over an in-memory stream
//! whose input is a scripted server reply.

#[path = "../common/thrift_fixtures.rs"]
mod thrift_fixtures;

use qrate_udp_proxy::backend::thrift::{message_type, ttype, BinaryProtocol};
use qrate_udp_proxy::backend::{call_get_by_id, call_get_by_length};
use qrate_udp_proxy::protocol::KeyId;
use qrate_udp_proxy::{BackendError, KeyMaterial, ProxyError};
use thrift_fixtures::{server_reply, write_key_data, Duplex};

// =============================================================================
// Request Encoding
// =============================================================================

#[test]
fn test_get_by_length_request_bytes() {
    let reply = server_reply("get_by_length", message_type::REPLY, 1, |p| {
        write_key_data(p, &[1; 16], 0, b"");
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    call_get_by_length(&mut protocol, 1, 32).unwrap();

    let sent = &protocol.get_ref().output;
    let mut expected = vec![0x80, 0x01, 0x00, 0x01]; // strict, CALL
    expected.extend_from_slice(&13i32.to_be_bytes());
    expected.extend_from_slice(b"get_by_length");
    expected.extend_from_slice(&1i32.to_be_bytes()); // seq id
    expected.extend_from_slice(&[ttype::I32, 0x00, 0x01]);
    expected.extend_from_slice(&32i32.to_be_bytes());
    expected.push(ttype::STOP);
    assert_eq!(sent, &expected);
}

#[test]
fn test_get_by_id_request_carries_binary_id() {
    let reply = server_reply("get_by_id", message_type::REPLY, 4, |p| {
        write_key_data(p, &[], 0, b"k");
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    call_get_by_id(&mut protocol, 4, &KeyId([0xEE; 16])).unwrap();

    let sent = &protocol.get_ref().output;
    let args = &sent[4 + 4 + "get_by_id".len() + 4..];
    assert_eq!(&args[..3], &[ttype::STRING, 0x00, 0x01]);
    assert_eq!(&args[3..7], &16i32.to_be_bytes());
    assert_eq!(&args[7..23], &[0xEE; 16]);
    assert_eq!(args[23], ttype::STOP);
}

// =============================================================================
// Reply Decoding
// =============================================================================

#[test]
fn test_success_reply() {
    let reply = server_reply("get_by_length", message_type::REPLY, 1, |p| {
        write_key_data(p, &[0x01; 16], 1000, &[0x02; 32]);
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    let key = call_get_by_length(&mut protocol, 1, 32).unwrap();
    assert_eq!(
        key,
        KeyMaterial {
            key_id: KeyId([0x01; 16]),
            expiration_time: 1000,
            key_body: vec![0x02; 32],
        }
    );
}

#[test]
fn test_client_error_reply() {
    let reply = server_reply("get_by_length", message_type::REPLY, 1, |p| {
        p.write_field_begin(ttype::STRUCT, 1);
        p.write_field_begin(ttype::I32, 1);
        p.write_i32(-1);
        p.write_field_begin(ttype::STRING, 2);
        p.write_string("bad length");
        p.write_field_stop();
        p.write_field_stop();
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    assert_eq!(
        call_get_by_length(&mut protocol, 1, 0),
        Err(BackendError::Client {
            code: -1,
            message: "bad length".to_string(),
        })
    );
}

#[test]
fn test_server_error_reply() {
    let reply = server_reply("get_by_id", message_type::REPLY, 2, |p| {
        p.write_field_begin(ttype::STRUCT, 2);
        p.write_field_begin(ttype::I32, 1);
        p.write_i32(-100);
        p.write_field_begin(ttype::STRING, 2);
        p.write_string("overloaded");
        p.write_field_begin(ttype::DOUBLE, 3);
        p.write_double(2.5);
        p.write_field_stop();
        p.write_field_stop();
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    assert_eq!(
        call_get_by_id(&mut protocol, 2, &KeyId::default()),
        Err(BackendError::Server {
            code: -100,
            message: "overloaded".to_string(),
            retry_after: 2.5,
        })
    );
}

#[test]
fn test_unknown_fields_are_skipped() {
    let reply = server_reply("get_by_length", message_type::REPLY, 1, |p| {
        // list<i32> [7, 8] under an id this client does not know
        p.write_field_begin(ttype::LIST, 9);
        p.write_byte(ttype::I32);
        p.write_i32(2);
        p.write_i32(7);
        p.write_i32(8);
        write_key_data(p, &[0x03; 16], 5, b"abc");
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    let key = call_get_by_length(&mut protocol, 1, 3).unwrap();
    assert_eq!(key.key_id, KeyId([0x03; 16]));
    assert_eq!(key.key_body, b"abc");
    assert_eq!(key.expiration_time, 5);
}

#[test]
fn test_application_exception_is_connection_error() {
    let reply = server_reply("get_by_length", message_type::EXCEPTION, 1, |p| {
        p.write_field_begin(ttype::STRING, 1);
        p.write_string("Internal error processing get_by_length");
        p.write_field_begin(ttype::I32, 2);
        p.write_i32(6);
        p.write_field_stop();
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    match call_get_by_length(&mut protocol, 1, 32) {
        Err(BackendError::Connection(msg)) => {
            assert!(msg.contains("Internal error processing get_by_length"))
        }
        other => panic!("Expected connection error, got {:?}", other),
    }
}

#[test]
fn test_out_of_sequence_reply_is_connection_error() {
    let reply = server_reply("get_by_length", message_type::REPLY, 99, |p| {
        write_key_data(p, &[1; 16], 0, b"");
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    match call_get_by_length(&mut protocol, 1, 32) {
        Err(BackendError::Connection(msg)) => assert!(msg.contains("Out of sequence")),
        other => panic!("Expected connection error, got {:?}", other),
    }
}

#[test]
fn test_empty_result_is_connection_error() {
    let reply = server_reply("get_by_length", message_type::REPLY, 1, |p| {
        p.write_field_stop();
    });
    let mut protocol = BinaryProtocol::new(Duplex::with_input(reply));

    match call_get_by_length(&mut protocol, 1, 32) {
        Err(BackendError::Connection(msg)) => assert!(msg.contains("unknown result")),
        other => panic!("Expected connection error, got {:?}", other),
    }
}

#[test]
fn test_truncated_reply_is_connection_error() {
    let reply = server_reply("get_by_length", message_type::REPLY, 1, |p| {
        write_key_data(p, &[1; 16], 0, &[0u8; 64]);
    });
    let truncated = reply[..reply.len() - 20].to_vec();
    let mut protocol = BinaryProtocol::new(Duplex::with_input(truncated));

    assert!(matches!(
        call_get_by_length(&mut protocol, 1, 64),
        Err(BackendError::Connection(_))
    ));
}

// =============================================================================
// Protocol Primitives
// =============================================================================

#[test]
fn test_non_strict_message_header() {
    let mut input = Vec::new();
    input.extend_from_slice(&3i32.to_be_bytes());
    input.extend_from_slice(b"abc");
    input.push(message_type::REPLY);
    input.extend_from_slice(&42i32.to_be_bytes());

    let mut protocol = BinaryProtocol::new(Duplex::with_input(input));
    let header = protocol.read_message_begin().unwrap();
    assert_eq!(header.name, "abc");
    assert_eq!(header.message_type, message_type::REPLY);
    assert_eq!(header.seq_id, 42);
}

#[test]
fn test_bad_version_rejected() {
    let input = 0x8002_0001u32.to_be_bytes().to_vec();
    let mut protocol = BinaryProtocol::new(Duplex::with_input(input));
    assert!(matches!(protocol.read_message_begin(), Err(ProxyError::Rpc(_))));
}

#[test]
fn test_negative_binary_length_rejected() {
    let input = (-1i32).to_be_bytes().to_vec();
    let mut protocol = BinaryProtocol::new(Duplex::with_input(input));
    assert!(matches!(protocol.read_binary(), Err(ProxyError::Rpc(_))));
}

#[test]
fn test_skip_nested_struct_and_map() {
    let mut input = Vec::new();
    // struct { 1: map<string, i16> { "a": 1 } } STOP
    input.extend_from_slice(&[ttype::MAP, 0x00, 0x01, ttype::STRING, ttype::I16]);
    input.extend_from_slice(&1i32.to_be_bytes());
    input.extend_from_slice(&1i32.to_be_bytes());
    input.push(b'a');
    input.extend_from_slice(&1i16.to_be_bytes());
    input.push(ttype::STOP);
    // sentinel after the struct
    input.push(0x7F);

    let mut protocol = BinaryProtocol::new(Duplex::with_input(input));
    protocol.skip(ttype::STRUCT).unwrap();
    assert_eq!(protocol.read_byte().unwrap(), 0x7F);
}

#[test]
fn test_unknown_type_cannot_be_skipped() {
    let mut protocol = BinaryProtocol::new(Duplex::with_input(vec![0; 8]));
    assert!(matches!(protocol.skip(0x42), Err(ProxyError::Rpc(_))));
}
