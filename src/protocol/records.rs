//! Fixed-size wire records
//!
//! One struct per record. Each knows its exact byte size and how to pack
//! itself into / unpack itself from a big-endian buffer.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::error::{ProxyError, Result};

/// Width of a key identifier on the wire
pub const KEY_ID_SIZE: usize = 16;

/// Width of every reserved block
const RESERVED_SIZE: usize = 8;

/// A fixed-size, big-endian wire record
pub trait WireRecord: Sized {
    /// Exact encoded size in bytes
    const SIZE: usize;

    /// Pack the record into `buf`, writing exactly `SIZE` bytes
    fn write_to<B: BufMut>(&self, buf: &mut B);

    /// Unpack the record; `buf` must hold at least `SIZE` bytes
    fn read_from<B: Buf>(buf: &mut B) -> Self;

    /// Encode to a freshly allocated buffer of exactly `SIZE` bytes
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut out);
        out
    }

    /// Decode from the leading `SIZE` bytes of `bytes`
    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ProxyError::Format(format!(
                "Incomplete record: expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        let mut buf = &bytes[..Self::SIZE];
        Ok(Self::read_from(&mut buf))
    }
}

// =============================================================================
// Key Identifier
// =============================================================================

/// 16-byte key identifier issued by the backend
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyId(pub [u8; KEY_ID_SIZE]);

impl KeyId {
    /// Build from an arbitrary slice, truncating or zero-padding to 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut id = [0u8; KEY_ID_SIZE];
        let len = bytes.len().min(KEY_ID_SIZE);
        id[..len].copy_from_slice(&bytes[..len]);
        KeyId(id)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self)
    }
}

impl From<[u8; KEY_ID_SIZE]> for KeyId {
    fn from(bytes: [u8; KEY_ID_SIZE]) -> Self {
        KeyId(bytes)
    }
}

// =============================================================================
// Headers
// =============================================================================

/// Header preceding every request datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub system_magic: u32,
    pub command_magic: u16,
    pub command_code: u16,
}

impl RequestHeader {
    pub fn new(system_magic: u32, command_magic: u16, command_code: u16) -> Self {
        Self {
            system_magic,
            command_magic,
            command_code,
        }
    }
}

impl WireRecord for RequestHeader {
    const SIZE: usize = 4 + 2 + 2 + RESERVED_SIZE;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.system_magic);
        buf.put_u16(self.command_magic);
        buf.put_u16(self.command_code);
        buf.put_bytes(0, RESERVED_SIZE);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let header = Self {
            system_magic: buf.get_u32(),
            command_magic: buf.get_u16(),
            command_code: buf.get_u16(),
        };
        buf.advance(RESERVED_SIZE);
        header
    }
}

/// Header preceding every reply datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub system_magic: u32,
    pub command_magic: u16,
    pub result_code: i16,
}

impl ReplyHeader {
    pub fn new(system_magic: u32, command_magic: u16, result_code: i16) -> Self {
        Self {
            system_magic,
            command_magic,
            result_code,
        }
    }
}

impl WireRecord for ReplyHeader {
    const SIZE: usize = 4 + 2 + 2 + RESERVED_SIZE;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.system_magic);
        buf.put_u16(self.command_magic);
        buf.put_i16(self.result_code);
        buf.put_bytes(0, RESERVED_SIZE);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let header = Self {
            system_magic: buf.get_u32(),
            command_magic: buf.get_u16(),
            result_code: buf.get_i16(),
        };
        buf.advance(RESERVED_SIZE);
        header
    }
}

// =============================================================================
// Bodies
// =============================================================================

/// Body of a get-key-by-length request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyByLengthRequestBody {
    pub key_length: u32,
}

impl KeyByLengthRequestBody {
    pub fn new(key_length: u32) -> Self {
        Self { key_length }
    }
}

impl WireRecord for KeyByLengthRequestBody {
    const SIZE: usize = 4;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.key_length);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        Self {
            key_length: buf.get_u32(),
        }
    }
}

/// Body of a successful get-key-by-length reply (key bytes follow)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyByLengthReplyBody {
    pub key_id: KeyId,
    pub expiration_time: u64,
}

impl KeyByLengthReplyBody {
    pub fn new(key_id: KeyId, expiration_time: u64) -> Self {
        Self {
            key_id,
            expiration_time,
        }
    }
}

impl WireRecord for KeyByLengthReplyBody {
    const SIZE: usize = KEY_ID_SIZE + 8 + RESERVED_SIZE;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.key_id.as_bytes());
        buf.put_u64(self.expiration_time);
        buf.put_bytes(0, RESERVED_SIZE);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let mut id = [0u8; KEY_ID_SIZE];
        buf.copy_to_slice(&mut id);
        let expiration_time = buf.get_u64();
        buf.advance(RESERVED_SIZE);
        Self {
            key_id: KeyId(id),
            expiration_time,
        }
    }
}

/// Body of a get-key-by-id request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyByIdRequestBody {
    pub key_id: KeyId,
}

impl KeyByIdRequestBody {
    pub fn new(key_id: KeyId) -> Self {
        Self { key_id }
    }
}

impl WireRecord for KeyByIdRequestBody {
    const SIZE: usize = KEY_ID_SIZE;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.key_id.as_bytes());
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let mut id = [0u8; KEY_ID_SIZE];
        buf.copy_to_slice(&mut id);
        Self { key_id: KeyId(id) }
    }
}

/// Body of every error reply (message bytes follow)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorDescriptionBody {
    /// Seconds the requester should wait before retrying; 0.0 when not applicable
    pub retry_after: f64,
}

impl ErrorDescriptionBody {
    pub fn new(retry_after: f64) -> Self {
        Self { retry_after }
    }
}

impl WireRecord for ErrorDescriptionBody {
    const SIZE: usize = 8 + RESERVED_SIZE;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_f64(self.retry_after);
        buf.put_bytes(0, RESERVED_SIZE);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let retry_after = buf.get_f64();
        buf.advance(RESERVED_SIZE);
        Self { retry_after }
    }
}
