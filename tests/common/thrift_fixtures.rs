//! In-memory Thrift peers shared by the backend tests

#![allow(dead_code)]

use std::io::{self, Cursor, Read, Write};

use qrate_udp_proxy::backend::thrift::{ttype, BinaryProtocol};

/// Reads from a scripted buffer, records everything written
#[derive(Default)]
pub struct Duplex {
    pub input: Cursor<Vec<u8>>,
    pub output: Vec<u8>,
}

impl Duplex {
    pub fn with_input(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            output: Vec::new(),
        }
    }
}

impl Read for Duplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Duplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serialize a server reply with the protocol's own writer
pub fn server_reply<F>(name: &str, msg_type: u8, seq_id: i32, body: F) -> Vec<u8>
where
    F: FnOnce(&mut BinaryProtocol<Duplex>),
{
    let mut protocol = BinaryProtocol::new(Duplex::default());
    protocol.write_message_begin(name, msg_type, seq_id);
    body(&mut protocol);
    protocol.flush().unwrap();
    protocol.into_inner().output
}

/// Success result carrying a `KeyData` struct
pub fn write_key_data(p: &mut BinaryProtocol<Duplex>, id: &[u8], expiration: i64, body: &[u8]) {
    p.write_field_begin(ttype::STRUCT, 0);
    p.write_field_begin(ttype::STRING, 1);
    p.write_binary(id);
    p.write_field_begin(ttype::I64, 2);
    p.write_i64(expiration);
    p.write_field_begin(ttype::STRING, 3);
    p.write_binary(body);
    p.write_field_stop();
    p.write_field_stop();
}
