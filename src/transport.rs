//! Unreliable datagram channel underneath the protocol.
//!
//! A [`Transport`] may lose, duplicate, reorder or corrupt datagrams; the
//! sender and receiver state machines only assume that a datagram is either
//! delivered whole or not at all.

use crate::configuration::RdtConfiguration;
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::Result;
use tokio::net::UdpSocket;

pub trait Transport {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> impl Future<Output = Result<usize>>;

    /// Waits for the next datagram. Must be cancel safe: the sender drops this
    /// future whenever its poll interval elapses first.
    fn recv_from(&self, buf: &mut [u8]) -> impl Future<Output = Result<(usize, SocketAddr)>>;
}

impl Transport for UdpSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> impl Future<Output = Result<usize>> {
        UdpSocket::send_to(self, buf, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> impl Future<Output = Result<(usize, SocketAddr)>> {
        UdpSocket::recv_from(self, buf)
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> impl Future<Output = Result<usize>> {
        self.as_ref().send_to(buf, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> impl Future<Output = Result<(usize, SocketAddr)>> {
        self.as_ref().recv_from(buf)
    }
}

/// Binds a non-blocking UDP socket and registers it with the tokio reactor.
/// Must be called from within a runtime.
pub fn bind_udp(addr: SocketAddr, config: &RdtConfiguration) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if let Some(size) = config.udp_snd_buf_size {
        socket.set_send_buffer_size(size)?;
    }
    if let Some(size) = config.udp_rcv_buf_size {
        socket.set_recv_buffer_size(size)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}
