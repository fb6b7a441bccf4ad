//! UDP socket setup
//!
//! Both gateway sockets (and the client's) are built through `socket2` so
//! options can be applied before the socket is bound.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::Result;

/// Bind a receiving socket with a read timeout and, where supported, an
/// enlarged receive buffer
///
/// A `recv_buffer_size` of zero keeps the OS default. Failing to enlarge the
/// buffer is logged and otherwise ignored.
pub fn bind_receiver(addr: SocketAddr, timeout: Duration, recv_buffer_size: usize) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    if recv_buffer_size > 0 && !cfg!(target_os = "macos") {
        if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
            tracing::warn!("Could not set receive buffer to {} bytes: {}", recv_buffer_size, e);
        }
    }

    socket.bind(&addr.into())?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(timeout))?;
    Ok(socket)
}

/// Open a sending socket allowed to reach broadcast destinations
///
/// The socket is bound to an ephemeral port of the same address family as
/// `family_of`; it has no fixed peer.
pub fn open_sender(family_of: SocketAddr) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(family_of), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if family_of.is_ipv4() {
        socket.set_broadcast(true)?;
    }

    let unspecified = match family_of.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    socket.bind(&SocketAddr::new(unspecified, 0).into())?;

    Ok(socket.into())
}
