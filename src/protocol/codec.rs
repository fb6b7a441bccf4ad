//! Protocol codec
//!
//! Datagram-level encoding and decoding built from the fixed records.
//!
//! ## Size Budget
//! ```text
//! success by length: 16 header + 32 body + 1384 key     = 1432
//! error:             16 header + 16 body + 1392 message = 1424
//! ```
//! Both stay within `RECV_PACKET_SIZE`, so a reply always fits in one read.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProxyError, Result};
use super::{
    CommandCode, ErrorDescriptionBody, KeyByIdRequestBody, KeyByLengthReplyBody,
    KeyByLengthRequestBody, KeyId, Reply, ReplyHeader, RequestHeader, WireRecord,
    ERROR_MESSAGE_LENGTH_MAX, KEY_LENGTH_MAX, RESULT_CODE_SUCCESS, SYSTEM_MAGIC,
};

// =============================================================================
// Requests
// =============================================================================

/// Split a request datagram into its header and the remaining body bytes
///
/// Only the size is checked here; magic and command validation belong to the
/// caller.
pub fn split_request(datagram: &[u8]) -> Result<(RequestHeader, &[u8])> {
    let header = RequestHeader::decode(datagram)?;
    Ok((header, &datagram[RequestHeader::SIZE..]))
}

/// Encode a full get-key-by-length request
pub fn encode_key_by_length_request(command_magic: u16, key_length: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(RequestHeader::SIZE + KeyByLengthRequestBody::SIZE);
    RequestHeader::new(SYSTEM_MAGIC, command_magic, CommandCode::GetKeyByLength.as_u16())
        .write_to(&mut buf);
    KeyByLengthRequestBody::new(key_length).write_to(&mut buf);
    buf.freeze()
}

/// Encode a full get-key-by-id request
pub fn encode_key_by_id_request(command_magic: u16, key_id: KeyId) -> Bytes {
    let mut buf = BytesMut::with_capacity(RequestHeader::SIZE + KeyByIdRequestBody::SIZE);
    RequestHeader::new(SYSTEM_MAGIC, command_magic, CommandCode::GetKeyById.as_u16())
        .write_to(&mut buf);
    KeyByIdRequestBody::new(key_id).write_to(&mut buf);
    buf.freeze()
}

// =============================================================================
// Replies
// =============================================================================

/// Encode a successful get-key-by-length reply; `key` is capped at `KEY_LENGTH_MAX`
pub fn encode_key_by_length_reply(
    command_magic: u16,
    key_id: KeyId,
    expiration_time: u64,
    key: &[u8],
) -> Bytes {
    let key = cap(key, KEY_LENGTH_MAX);
    let mut buf = BytesMut::with_capacity(
        ReplyHeader::SIZE + KeyByLengthReplyBody::SIZE + key.len(),
    );
    ReplyHeader::new(SYSTEM_MAGIC, command_magic, RESULT_CODE_SUCCESS).write_to(&mut buf);
    KeyByLengthReplyBody::new(key_id, expiration_time).write_to(&mut buf);
    buf.put_slice(key);
    buf.freeze()
}

/// Encode a successful get-key-by-id reply; `key` is capped at `KEY_LENGTH_MAX`
pub fn encode_key_by_id_reply(command_magic: u16, key: &[u8]) -> Bytes {
    let key = cap(key, KEY_LENGTH_MAX);
    let mut buf = BytesMut::with_capacity(ReplyHeader::SIZE + key.len());
    ReplyHeader::new(SYSTEM_MAGIC, command_magic, RESULT_CODE_SUCCESS).write_to(&mut buf);
    buf.put_slice(key);
    buf.freeze()
}

/// Encode an error reply; `message` is capped at `ERROR_MESSAGE_LENGTH_MAX`
pub fn encode_error_reply(
    command_magic: u16,
    result_code: i16,
    retry_after: f64,
    message: &[u8],
) -> Bytes {
    let message = cap(message, ERROR_MESSAGE_LENGTH_MAX);
    let mut buf = BytesMut::with_capacity(
        ReplyHeader::SIZE + ErrorDescriptionBody::SIZE + message.len(),
    );
    ReplyHeader::new(SYSTEM_MAGIC, command_magic, result_code).write_to(&mut buf);
    ErrorDescriptionBody::new(retry_after).write_to(&mut buf);
    buf.put_slice(message);
    buf.freeze()
}

/// Decode a reply datagram into its header and typed body
///
/// The system magic is checked; the command magic is left to the caller,
/// which is the only one that knows what it sent.
pub fn decode_reply(datagram: &[u8]) -> Result<(ReplyHeader, Reply)> {
    let header = ReplyHeader::decode(datagram)?;
    if header.system_magic != SYSTEM_MAGIC {
        return Err(ProxyError::Format(format!(
            "Wrong system magic: 0x{:08x}",
            header.system_magic
        )));
    }

    let body = &datagram[ReplyHeader::SIZE..];
    if header.result_code >= 0 {
        return Ok((
            header,
            Reply::Success {
                payload: Bytes::copy_from_slice(body),
            },
        ));
    }

    let description = ErrorDescriptionBody::decode(body)?;
    Ok((
        header,
        Reply::Error {
            result_code: header.result_code,
            retry_after: description.retry_after,
            message: Bytes::copy_from_slice(&body[ErrorDescriptionBody::SIZE..]),
        },
    ))
}

fn cap(bytes: &[u8], max: usize) -> &[u8] {
    &bytes[..bytes.len().min(max)]
}
