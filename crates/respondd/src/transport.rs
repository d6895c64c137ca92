//! Datagram socket seam
//!
//! The receive loop only needs three things from a socket: send one datagram,
//! and receive one datagram with a caller-chosen timeout. [`Connector`] opens
//! a fresh socket per request; dropping the socket closes it.

use std::io;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket};
use std::time::Duration;
use tracing::trace;

/// A connected-or-not datagram socket owned by exactly one request.
pub trait DatagramSocket {
    /// Sends `payload` as a single datagram to `dst`.
    fn send_to(&mut self, payload: &[u8], dst: SocketAddrV6) -> io::Result<usize>;

    /// Waits at most `timeout` for one datagram.
    ///
    /// A timeout must surface as [`io::ErrorKind::WouldBlock`] or
    /// [`io::ErrorKind::TimedOut`]. `timeout` is never zero.
    fn recv_from(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, SocketAddr)>;
}

/// Opens one [`DatagramSocket`] per request.
pub trait Connector {
    type Socket: DatagramSocket;

    fn open(&self) -> io::Result<Self::Socket>;
}

impl<C: Connector + ?Sized> Connector for &C {
    type Socket = C::Socket;

    fn open(&self) -> io::Result<Self::Socket> {
        (**self).open()
    }
}

/// UDP/IPv6 sockets bound to an ephemeral port on the unspecified address.
///
/// The outgoing interface of a link-scoped destination is selected by the
/// scope id of the destination address.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    type Socket = UdpDatagramSocket;

    fn open(&self) -> io::Result<Self::Socket> {
        let socket = UdpSocket::bind(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0))?;
        trace!(local = ?socket.local_addr().ok(), "Opened respondd socket");
        Ok(UdpDatagramSocket { socket })
    }
}

/// [`DatagramSocket`] over a blocking [`UdpSocket`].
#[derive(Debug)]
pub struct UdpDatagramSocket {
    socket: UdpSocket,
}

impl UdpDatagramSocket {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramSocket for UdpDatagramSocket {
    fn send_to(&mut self, payload: &[u8], dst: SocketAddrV6) -> io::Result<usize> {
        self.socket.send_to(payload, dst)
    }

    fn recv_from(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, SocketAddr)> {
        // SO_RCVTIMEO is re-armed with the remaining budget before every wait
        self.socket.set_read_timeout(Some(timeout))?;
        self.socket.recv_from(buf)
    }
}
