//! Protocol Module
//!
//! Defines the UDP wire protocol spoken between requesters and the gateway.
//! Every record is fixed-size and big-endian; variable data (key material,
//! error text) trails the fixed records and runs to the end of the datagram.
//!
//! ## Request Datagram
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬──────────────┬──────────────┐
//! │ SysMagic (4) │ CmdMagic (2) │ CmdCode (2)  │ Reserved (8) │ Body         │
//! └──────────────┴──────────────┴──────────────┴──────────────┴──────────────┘
//! ```
//!
//! ### Request Bodies
//! - 0x0001 GET_KEY_BY_ID:     key_id (16)
//! - 0x0002 GET_KEY_BY_LENGTH: key_length (4)
//!
//! ## Reply Datagram
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬──────────────┬──────────────┐
//! │ SysMagic (4) │ CmdMagic (2) │ Result (2)   │ Reserved (8) │ Body         │
//! └──────────────┴──────────────┴──────────────┴──────────────┴──────────────┘
//! ```
//!
//! ### Reply Bodies
//! - success, by length: key_id (16) + expiration (8) + reserved (8) + key bytes
//! - success, by id:     key bytes
//! - error (result < 0): retry_after f64 (8) + reserved (8) + message bytes

mod command;
mod records;
mod response;
mod codec;

pub use command::{CommandCode, RESULT_CODE_BACKEND_CONNECTION, RESULT_CODE_SUCCESS};
pub use records::{
    ErrorDescriptionBody, KeyByIdRequestBody, KeyByLengthReplyBody, KeyByLengthRequestBody,
    KeyId, ReplyHeader, RequestHeader, WireRecord, KEY_ID_SIZE,
};
pub use response::Reply;
pub use codec::{
    decode_reply, encode_error_reply, encode_key_by_id_reply, encode_key_by_id_request,
    encode_key_by_length_reply, encode_key_by_length_request, split_request,
};

/// System-wide datagram magic, required on every request and echoed in every reply
pub const SYSTEM_MAGIC: u32 = 0xACEA_ACEB;

/// Default bind address for the request socket
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// Default request (inbound) port
pub const DEFAULT_REQUEST_PORT: u16 = 5551;

/// Default reply (outbound) port
pub const DEFAULT_REPLY_PORT: u16 = 5552;

/// Largest datagram the gateway reads
pub const RECV_PACKET_SIZE: usize = 1432;

/// Cap on key bytes appended to a success reply
pub const KEY_LENGTH_MAX: usize = 1384;

/// Cap on message bytes appended to an error reply
pub const ERROR_MESSAGE_LENGTH_MAX: usize = 1392;
