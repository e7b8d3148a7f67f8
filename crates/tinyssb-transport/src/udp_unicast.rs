//! UDP unicast link (§4.G, §6): a fixed peer address, no CRC framing
//! (point-to-point, lower expected loss than the multicast group).
//!
//! Grounded on `io.py`'s `UDP_UNICAST`/`UDP_UNICAST_NEIGHBOR`.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::face::FaceState;
use crate::{Result, TransportError};

/// A point-to-point UDP link to a single fixed peer.
pub struct UdpUnicastTransport {
    socket: UdpSocket,
    peer_addr: SocketAddr,
    face: FaceState,
}

impl UdpUnicastTransport {
    pub async fn connect(peer_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], 0)))
            .await
            .map_err(TransportError::Io)?;
        Ok(Self::from_socket(socket, peer_addr))
    }

    fn from_socket(socket: UdpSocket, peer_addr: SocketAddr) -> Self {
        Self {
            socket,
            peer_addr,
            face: FaceState::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(TransportError::Io)
    }

    pub fn enqueue(&self, frame: Vec<u8>) {
        self.face.enqueue(frame);
    }

    pub async fn pump(&self) -> Result<()> {
        if let Some(frame) = self.face.dequeue() {
            self.socket
                .send_to(&frame, self.peer_addr)
                .await
                .map_err(TransportError::Io)?;
        }
        Ok(())
    }

    pub async fn recv(&self, buf: &mut [u8]) -> Result<Option<Vec<u8>>> {
        let (len, _src) = self.socket.recv_from(buf).await.map_err(TransportError::Io)?;
        Ok(Some(buf[..len].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_over_loopback() {
        let sock_a = UdpSocket::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind a");
        let sock_b = UdpSocket::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind b");
        let a_addr = sock_a.local_addr().expect("addr a");
        let b_addr = sock_b.local_addr().expect("addr b");

        let a = UdpUnicastTransport::from_socket(sock_a, b_addr);
        let b = UdpUnicastTransport::from_socket(sock_b, a_addr);

        b.enqueue(b"hello over udp".to_vec());
        b.pump().await.expect("pump");

        let mut buf = [0u8; 256];
        let frame = a.recv(&mut buf).await.expect("recv").expect("some frame");
        assert_eq!(frame, b"hello over udp");
    }
}
