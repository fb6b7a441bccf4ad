//! Thrift binary protocol
//!
//! Just enough of the Thrift binary protocol to call a service over any
//! `Read + Write` stream. Writes are buffered and go out in a single
//! `write_all` on [`BinaryProtocol::flush`], the way a buffered transport
//! does; reads go straight to the stream.
//!
//! ## Message Header (strict)
//! ```text
//! ┌──────────────────────┬──────────────┬──────────┬────────────┐
//! │ 0x8001 | 0x00 | type │ name_len (4) │ name     │ seq_id (4) │
//! └──────────────────────┴──────────────┴──────────┴────────────┘
//! ```
//!
//! ## Field
//! ```text
//! ┌──────────┬────────┬─────────┐
//! │ type (1) │ id (2) │ value   │      struct ends with type = STOP
//! └──────────┴────────┴─────────┘
//! ```

use std::fmt;
use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{ProxyError, Result};

/// Field and element type tags
pub mod ttype {
    pub const STOP: u8 = 0;
    pub const BOOL: u8 = 2;
    pub const BYTE: u8 = 3;
    pub const DOUBLE: u8 = 4;
    pub const I16: u8 = 6;
    pub const I32: u8 = 8;
    pub const I64: u8 = 10;
    pub const STRING: u8 = 11;
    pub const STRUCT: u8 = 12;
    pub const MAP: u8 = 13;
    pub const SET: u8 = 14;
    pub const LIST: u8 = 15;
}

/// Message type tags
pub mod message_type {
    pub const CALL: u8 = 1;
    pub const REPLY: u8 = 2;
    pub const EXCEPTION: u8 = 3;
}

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;

/// Largest string/binary we accept from the peer (16 MB)
const MAX_BINARY_LEN: usize = 16 * 1024 * 1024;

/// Nesting limit when skipping unknown values
const MAX_SKIP_DEPTH: usize = 64;

/// Decoded message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub message_type: u8,
    pub seq_id: i32,
}

/// `TApplicationException` sent by the server instead of a reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplicationException {
    pub message: String,
    pub kind: i32,
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Application exception {}: {}", self.kind, self.message)
    }
}

/// Thrift binary protocol over a byte stream
pub struct BinaryProtocol<S> {
    stream: S,
    out: BytesMut,
}

impl<S: Read + Write> BinaryProtocol<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            out: BytesMut::with_capacity(256),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    // =========================================================================
    // Writing (buffered until flush)
    // =========================================================================

    pub fn write_message_begin(&mut self, name: &str, message_type: u8, seq_id: i32) {
        self.out.put_u32(VERSION_1 | message_type as u32);
        self.write_string(name);
        self.out.put_i32(seq_id);
    }

    pub fn write_field_begin(&mut self, field_type: u8, id: i16) {
        self.out.put_u8(field_type);
        self.out.put_i16(id);
    }

    pub fn write_field_stop(&mut self) {
        self.out.put_u8(ttype::STOP);
    }

    pub fn write_byte(&mut self, value: u8) {
        self.out.put_u8(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.out.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.out.put_i64(value);
    }

    pub fn write_double(&mut self, value: f64) {
        self.out.put_f64(value);
    }

    pub fn write_binary(&mut self, value: &[u8]) {
        self.out.put_i32(value.len() as i32);
        self.out.put_slice(value);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_binary(value.as_bytes());
    }

    /// Send everything buffered so far
    pub fn flush(&mut self) -> Result<()> {
        let pending = self.out.split();
        self.stream.write_all(&pending)?;
        self.stream.flush()?;
        Ok(())
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Read a message header, strict or non-strict
    pub fn read_message_begin(&mut self) -> Result<MessageHeader> {
        let first = self.read_i32()?;
        if first < 0 {
            let version = first as u32 & VERSION_MASK;
            if version != VERSION_1 {
                return Err(ProxyError::Rpc(format!(
                    "Bad protocol version: 0x{:08x}",
                    version
                )));
            }
            let message_type = (first & 0xff) as u8;
            let name = self.read_string()?;
            let seq_id = self.read_i32()?;
            return Ok(MessageHeader {
                name,
                message_type,
                seq_id,
            });
        }

        // Non-strict: the first word is the name length
        let name = self.read_sized_string(first as usize)?;
        let message_type = self.read_byte()?;
        let seq_id = self.read_i32()?;
        Ok(MessageHeader {
            name,
            message_type,
            seq_id,
        })
    }

    /// Read a field header; returns `(ttype::STOP, 0)` at the end of a struct
    pub fn read_field_begin(&mut self) -> Result<(u8, i16)> {
        let field_type = self.read_byte()?;
        if field_type == ttype::STOP {
            return Ok((ttype::STOP, 0));
        }
        let id = self.read_i16()?;
        Ok((field_type, id))
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    pub fn read_binary(&mut self) -> Result<Vec<u8>> {
        let len = self.read_size()?;
        let mut value = vec![0u8; len];
        self.stream.read_exact(&mut value)?;
        Ok(value)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_size()?;
        self.read_sized_string(len)
    }

    /// Read a `TApplicationException` struct
    pub fn read_application_exception(&mut self) -> Result<ApplicationException> {
        let mut exception = ApplicationException::default();
        loop {
            let (field_type, id) = self.read_field_begin()?;
            match (id, field_type) {
                (_, ttype::STOP) => break,
                (1, ttype::STRING) => exception.message = self.read_string()?,
                (2, ttype::I32) => exception.kind = self.read_i32()?,
                _ => self.skip(field_type)?,
            }
        }
        Ok(exception)
    }

    /// Consume a value of the given type without interpreting it
    pub fn skip(&mut self, field_type: u8) -> Result<()> {
        self.skip_nested(field_type, 0)
    }

    fn skip_nested(&mut self, field_type: u8, depth: usize) -> Result<()> {
        if depth > MAX_SKIP_DEPTH {
            return Err(ProxyError::Rpc("Value nesting too deep".to_string()));
        }

        match field_type {
            ttype::BOOL | ttype::BYTE => {
                self.read_byte()?;
            }
            ttype::I16 => {
                self.read_i16()?;
            }
            ttype::I32 => {
                self.read_i32()?;
            }
            ttype::I64 | ttype::DOUBLE => {
                self.read_i64()?;
            }
            ttype::STRING => {
                self.read_binary()?;
            }
            ttype::STRUCT => loop {
                let (inner, _) = self.read_field_begin()?;
                if inner == ttype::STOP {
                    break;
                }
                self.skip_nested(inner, depth + 1)?;
            },
            ttype::MAP => {
                let key_type = self.read_byte()?;
                let value_type = self.read_byte()?;
                let count = self.read_size()?;
                for _ in 0..count {
                    self.skip_nested(key_type, depth + 1)?;
                    self.skip_nested(value_type, depth + 1)?;
                }
            }
            ttype::SET | ttype::LIST => {
                let element_type = self.read_byte()?;
                let count = self.read_size()?;
                for _ in 0..count {
                    self.skip_nested(element_type, depth + 1)?;
                }
            }
            other => {
                return Err(ProxyError::Rpc(format!("Unknown field type: {}", other)));
            }
        }
        Ok(())
    }

    fn read_size(&mut self) -> Result<usize> {
        let size = self.read_i32()?;
        if size < 0 {
            return Err(ProxyError::Rpc(format!("Negative size: {}", size)));
        }
        let size = size as usize;
        if size > MAX_BINARY_LEN {
            return Err(ProxyError::Rpc(format!(
                "Size too large: {} (max {})",
                size, MAX_BINARY_LEN
            )));
        }
        Ok(size)
    }

    fn read_sized_string(&mut self, len: usize) -> Result<String> {
        if len > MAX_BINARY_LEN {
            return Err(ProxyError::Rpc(format!("String too large: {}", len)));
        }
        let mut value = vec![0u8; len];
        self.stream.read_exact(&mut value)?;
        String::from_utf8(value).map_err(|e| ProxyError::Rpc(format!("Invalid UTF-8: {}", e)))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.stream.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}
