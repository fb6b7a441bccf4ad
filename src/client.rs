//! Gateway Client
//!
//! Requester side of the UDP protocol: sends commands to a gateway and
//! waits for the matching reply on a separate reply socket.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{ProxyError, Result};
use crate::network::socket;
use crate::protocol::{
    decode_reply, encode_key_by_id_request, encode_key_by_length_request, KeyByLengthReplyBody,
    KeyId, Reply, WireRecord, RECV_PACKET_SIZE,
};

/// Default reply wait, matching the gateway's own receive timeout
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(3);

/// Receive buffer requested for the reply socket (256 MB)
const REPLY_BUFFER_SIZE: usize = 256 * 1024 * 1024;

/// A key issued through get-key-by-length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedKey {
    pub key_id: KeyId,
    pub expiration_time: u64,
    pub key: Vec<u8>,
}

/// Client for one gateway
pub struct GatewayClient {
    /// Connected to the gateway's request port
    request_socket: UdpSocket,

    /// Bound to the address the gateway replies to
    reply_socket: UdpSocket,
}

impl GatewayClient {
    /// Connect to `gateway` and listen for replies on `reply_bind`
    pub fn connect(gateway: SocketAddr, reply_bind: SocketAddr, timeout: Duration) -> Result<Self> {
        let request_socket = socket::open_sender(gateway)?;
        request_socket.connect(gateway)?;

        let reply_socket = socket::bind_receiver(reply_bind, timeout, REPLY_BUFFER_SIZE)?;

        Ok(Self {
            request_socket,
            reply_socket,
        })
    }

    /// Build a client around an already bound reply socket, so several
    /// clients can share one reply port
    pub fn with_reply_socket(gateway: SocketAddr, reply_socket: UdpSocket) -> Result<Self> {
        let request_socket = socket::open_sender(gateway)?;
        request_socket.connect(gateway)?;
        Ok(Self {
            request_socket,
            reply_socket,
        })
    }

    /// Address replies are received on
    pub fn reply_addr(&self) -> Result<SocketAddr> {
        Ok(self.reply_socket.local_addr()?)
    }

    /// Send an arbitrary datagram to the gateway
    pub fn send_raw(&self, datagram: &[u8]) -> Result<()> {
        self.request_socket.send(datagram)?;
        Ok(())
    }

    /// Wait for the next reply datagram; times out with an I/O error
    pub fn recv_raw(&self) -> Result<Vec<u8>> {
        let mut buf = [0u8; RECV_PACKET_SIZE];
        let (len, _) = self.reply_socket.recv_from(&mut buf)?;
        Ok(buf[..len].to_vec())
    }

    /// Request a fresh key of `key_length` bytes
    pub fn get_key_by_length(&self, command_magic: u16, key_length: u32) -> Result<IssuedKey> {
        self.send_raw(&encode_key_by_length_request(command_magic, key_length))?;
        let payload = self.await_reply(command_magic)?;

        let body = KeyByLengthReplyBody::decode(&payload)?;
        Ok(IssuedKey {
            key_id: body.key_id,
            expiration_time: body.expiration_time,
            key: payload[KeyByLengthReplyBody::SIZE..].to_vec(),
        })
    }

    /// Fetch the key the peer side was issued under `key_id`
    pub fn get_key_by_id(&self, command_magic: u16, key_id: KeyId) -> Result<Vec<u8>> {
        self.send_raw(&encode_key_by_id_request(command_magic, key_id))?;
        self.await_reply(command_magic)
    }

    fn await_reply(&self, command_magic: u16) -> Result<Vec<u8>> {
        let datagram = self.recv_raw()?;
        let (header, reply) = decode_reply(&datagram)?;

        if header.command_magic != command_magic {
            return Err(ProxyError::Format(format!(
                "Reply for command magic {} while waiting for {}",
                header.command_magic, command_magic
            )));
        }

        match reply {
            Reply::Success { payload } => Ok(payload.to_vec()),
            Reply::Error {
                result_code,
                retry_after,
                message,
            } => Err(ProxyError::Remote {
                result_code,
                message: String::from_utf8_lossy(&message).into_owned(),
                retry_after,
            }),
        }
    }
}
