//! UDP multicast link (§4.G, §6): CRC32-framed broadcast over a multicast
//! group, with own-echo filtering.
//!
//! Grounded on `io.py`'s `UDP_MULTICAST`/`UDP_MULTICAST_NEIGHBOR`.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;

use crate::face::FaceState;
use crate::{Result, TransportError};

/// A UDP multicast link: every frame is CRC32-appended on send and the CRC
/// is verified and stripped on receive; frames whose source is our own
/// bound address (our own echo back from the multicast group) are dropped.
pub struct UdpMulticastTransport {
    socket: UdpSocket,
    group: SocketAddr,
    face: FaceState,
}

impl UdpMulticastTransport {
    /// Join the multicast `group` on the interface bound to `bind_addr`.
    pub async fn bind(group: SocketAddrV4, bind_addr: Ipv4Addr) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::new(group.ip().to_owned().into(), group.port()))
            .await
            .map_err(TransportError::Io)?;
        socket
            .join_multicast_v4(*group.ip(), bind_addr)
            .map_err(TransportError::Io)?;
        socket.set_multicast_loop_v4(true).map_err(TransportError::Io)?;
        Ok(Self {
            socket,
            group: SocketAddr::V4(group),
            face: FaceState::new(),
        })
    }

    fn append_crc(buf: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(buf.len() + 4);
        out.extend_from_slice(buf);
        out.extend_from_slice(&crc32fast::hash(buf).to_be_bytes());
        out
    }

    fn check_and_strip_crc(framed: &[u8]) -> Option<&[u8]> {
        if framed.len() < 4 {
            return None;
        }
        let (body, crc_bytes) = framed.split_at(framed.len() - 4);
        let expected = u32::from_be_bytes(crc_bytes.try_into().expect("4 bytes"));
        if crc32fast::hash(body) == expected {
            Some(body)
        } else {
            None
        }
    }

    /// Queue a frame for broadcast on the next send opportunity.
    pub fn enqueue(&self, frame: Vec<u8>) {
        self.face.enqueue(frame);
    }

    /// Send one queued frame (CRC32-appended) to the multicast group, if any
    /// is pending.
    pub async fn pump(&self) -> Result<()> {
        if let Some(frame) = self.face.dequeue() {
            let framed = Self::append_crc(&frame);
            self.socket
                .send_to(&framed, self.group)
                .await
                .map_err(TransportError::Io)?;
        }
        Ok(())
    }

    /// Receive the next valid frame, or `None` for a CRC mismatch or an echo
    /// of our own bound address (both silently dropped per §4.G).
    pub async fn recv(&self, buf: &mut [u8]) -> Result<Option<Vec<u8>>> {
        let (len, src) = self.socket.recv_from(buf).await.map_err(TransportError::Io)?;
        let local = self.socket.local_addr().map_err(TransportError::Io)?;
        if src == local {
            return Ok(None);
        }
        Ok(Self::check_and_strip_crc(&buf[..len]).map(|b| b.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_roundtrips() {
        let body = b"tinyssb packet contents";
        let framed = UdpMulticastTransport::append_crc(body);
        assert_eq!(framed.len(), body.len() + 4);
        let stripped = UdpMulticastTransport::check_and_strip_crc(&framed).expect("valid crc");
        assert_eq!(stripped, body);
    }

    #[test]
    fn test_tampered_frame_fails_crc() {
        let body = b"tinyssb packet contents";
        let mut framed = UdpMulticastTransport::append_crc(body);
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        assert!(UdpMulticastTransport::check_and_strip_crc(&framed).is_none());
    }

    #[test]
    fn test_short_frame_is_rejected() {
        assert!(UdpMulticastTransport::check_and_strip_crc(&[1, 2, 3]).is_none());
    }
}
