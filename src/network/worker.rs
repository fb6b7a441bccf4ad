//! Gateway worker
//!
//! The single receive → dispatch → reply loop.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crossbeam::channel::{Receiver, TryRecvError};

use crate::backend::KeyService;
use crate::protocol::RECV_PACKET_SIZE;
use super::dispatch::Dispatcher;

/// Owns both sockets and the backend for the lifetime of the loop
pub(crate) struct Worker<B> {
    /// Inbound requests (read timeout set)
    request_socket: UdpSocket,

    /// Outbound replies, no fixed peer
    reply_socket: UdpSocket,

    /// Replies go to (request sender IP, reply_port)
    reply_port: u16,

    recv_timeout: Duration,

    dispatcher: Dispatcher<B>,

    /// Fires (or disconnects) when the gateway is stopped
    shutdown: Receiver<()>,
}

impl<B: KeyService> Worker<B> {
    pub(crate) fn new(
        request_socket: UdpSocket,
        reply_socket: UdpSocket,
        reply_port: u16,
        recv_timeout: Duration,
        backend: B,
        shutdown: Receiver<()>,
    ) -> Self {
        Self {
            request_socket,
            reply_socket,
            reply_port,
            recv_timeout,
            dispatcher: Dispatcher::new(backend),
            shutdown,
        }
    }

    /// Run until the shutdown signal is observed
    ///
    /// The signal is checked once per iteration, so shutdown waits for at
    /// most one receive timeout plus any in-flight backend call.
    pub(crate) fn run(mut self) {
        let mut buf = [0u8; RECV_PACKET_SIZE];

        loop {
            match self.shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Disconnected) => break,
            }

            let (len, peer) = match self.request_socket.recv_from(&mut buf) {
                Ok(received) => received,
                // Timeouts surface as WouldBlock on Unix and TimedOut on Windows
                Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    tracing::debug!("No data received for {:?}", self.recv_timeout);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Receive failed: {}", e);
                    continue;
                }
            };

            self.handle_datagram(&buf[..len], peer);
        }

        tracing::debug!("Worker loop exited");
    }

    fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) {
        tracing::info!("Got packet of {} bytes from {}", datagram.len(), peer);

        let reply = match self.dispatcher.process(datagram) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Dropping packet from {}: {}", peer, e);
                return;
            }
        };

        let destination = SocketAddr::new(peer.ip(), self.reply_port);
        match self.reply_socket.send_to(&reply, destination) {
            Ok(sent) => tracing::info!("Sent reply of {} bytes to {}", sent, destination),
            Err(e) => tracing::warn!("Failed to send reply to {}: {}", destination, e),
        }
    }
}
