//! Socket abstraction.
//!
//! `UdpTransport` keeps [`crate::dispatcher::Dispatcher`] free of any direct
//! dependency on `std::net`, so the dispatcher's request-handling policy can
//! be driven from unit and integration tests against an in-memory fake
//! instead of real sockets.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use filexfer_common::FileTransferError;

use crate::wire::{self, DecodedPacket};

pub trait UdpTransport {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), FileTransferError>;

    /// Block until a datagram arrives, decode it, and return it with its
    /// source address. A datagram too short to be a packet at all is not
    /// surfaced as an error — the caller should simply wait for the next
    /// one, matching UDP's "just a message" delivery model.
    fn recv_from(&self) -> Result<(DecodedPacket, SocketAddr), FileTransferError>;
}

/// Production transport, backed by a bound `std::net::UdpSocket`.
pub struct UdpSocketTransport {
    socket: UdpSocket,
}

impl UdpSocketTransport {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(UdpSocketTransport { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        self.socket.connect(addr)
    }

    /// Bound how long `recv_from` blocks. The accept loop uses this to wake
    /// up periodically and check a shutdown flag rather than blocking
    /// forever on a socket that may never receive another datagram.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }
}

impl UdpTransport for UdpSocketTransport {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), FileTransferError> {
        self.socket.send_to(bytes, addr)?;
        Ok(())
    }

    fn recv_from(&self) -> Result<(DecodedPacket, SocketAddr), FileTransferError> {
        let mut buf = [0u8; wire::BUFSIZE];
        loop {
            let (len, addr) = self.socket.recv_from(&mut buf)?;
            if let Some(packet) = wire::decode(&buf[..len]) {
                return Ok((packet, addr));
            }
            tracing::trace!(%addr, len, "dropped undersized datagram");
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    //! An in-memory transport pair for tests, modeling UDP delivery between
    //! exactly two logical endpoints without touching the network.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub struct FakeTransport {
        pub local_addr: SocketAddr,
        inbox: Mutex<VecDeque<(DecodedPacket, SocketAddr)>>,
        pub outbox: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    }

    impl FakeTransport {
        pub fn new(local_addr: SocketAddr) -> Self {
            FakeTransport {
                local_addr,
                inbox: Mutex::new(VecDeque::new()),
                outbox: Mutex::new(Vec::new()),
            }
        }

        pub fn deliver(&self, bytes: &[u8], from: SocketAddr) {
            let packet = wire::decode(bytes).expect("test datagram must decode");
            self.inbox.lock().unwrap().push_back((packet, from));
        }
    }

    impl UdpTransport for FakeTransport {
        fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), FileTransferError> {
            self.outbox.lock().unwrap().push((bytes.to_vec(), addr));
            Ok(())
        }

        fn recv_from(&self) -> Result<(DecodedPacket, SocketAddr), FileTransferError> {
            self.inbox.lock().unwrap().pop_front().ok_or_else(|| {
                io::Error::new(io::ErrorKind::WouldBlock, "no queued datagram").into()
            })
        }
    }
}
