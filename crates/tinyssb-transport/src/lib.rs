//! Concrete transport link kinds (§4.G): UDP multicast, UDP unicast, LoRa,
//! serial KISS, and WebSocket, each wrapping a [`face::FaceState`] outbound
//! queue and duty-cycle gate.
//!
//! There is deliberately no `dyn Transport` trait object here: this crate
//! has no `async-trait` dependency, so each link is a concrete struct
//! rather than a trait impl. [`Link`] plays that role instead, dispatching
//! by hand over the small fixed set of kinds.

pub mod face;
pub mod kiss;
pub mod lora;
pub mod udp_multicast;
pub mod udp_unicast;
pub mod websocket;

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use thiserror::Error;

pub use kiss::KissTransport;
pub use lora::LoraTransport;
pub use udp_multicast::UdpMulticastTransport;
pub use udp_unicast::UdpUnicastTransport;
pub use websocket::WsTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("frame of {0} bytes exceeds the link's size limit")]
    FrameTooLarge(usize),
    #[error("unrecognized or malformed transport uri: {0}")]
    BadUri(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// One open link, of whichever concrete kind [`open`] resolved from its URI.
pub enum Link {
    UdpMulticast(UdpMulticastTransport),
    UdpUnicast(UdpUnicastTransport),
    Lora(LoraTransport),
    Kiss(KissTransport),
    Ws(WsTransport),
}

impl Link {
    pub fn enqueue(&self, frame: Vec<u8>) {
        match self {
            Link::UdpMulticast(t) => t.enqueue(frame),
            Link::UdpUnicast(t) => t.enqueue(frame),
            Link::Lora(t) => t.enqueue(frame),
            Link::Kiss(t) => t.enqueue(frame),
            Link::Ws(t) => t.enqueue(frame),
        }
    }

    pub async fn pump(&self) -> Result<()> {
        match self {
            Link::UdpMulticast(t) => t.pump().await,
            Link::UdpUnicast(t) => t.pump().await,
            Link::Lora(t) => t.pump().await,
            Link::Kiss(t) => t.pump().await,
            Link::Ws(t) => t.pump().await,
        }
    }

    /// Block for the next inbound frame, normalizing each link kind's own
    /// receive shape (datagram buffer, byte-at-a-time SLIP decode, length
    /// prefix, or WebSocket message) into a single `Option<Vec<u8>>`.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>> {
        match self {
            Link::UdpMulticast(t) => {
                let mut buf = [0u8; 1500];
                t.recv(&mut buf).await
            }
            Link::UdpUnicast(t) => {
                let mut buf = [0u8; 1500];
                t.recv(&mut buf).await
            }
            Link::Lora(t) => t.recv().await.map(Some),
            Link::Kiss(t) => {
                // A single serial byte rarely completes a frame; the caller
                // loops, so returning `None` on an incomplete read is
                // expected, not an error.
                t.recv().await
            }
            Link::Ws(t) => t.recv().await,
        }
    }
}

/// Resolve a transport URI (§4.H) into an open [`Link`].
///
/// Recognized schemes: `udp-multicast://<group>:<port>@<bind-addr>`,
/// `udp-unicast://<peer-addr>:<port>`, `lora:///dev/ttyUSB0?baud=57600`,
/// `kiss:///dev/ttyUSB0?baud=9600`, `ws://host:port/path`.
pub async fn open(uri: &str) -> Result<Link> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| TransportError::BadUri(uri.to_string()))?;
    match scheme {
        "udp-multicast" => {
            let (authority, bind_addr) = rest
                .split_once('@')
                .ok_or_else(|| TransportError::BadUri(uri.to_string()))?;
            let group: SocketAddrV4 = authority
                .parse()
                .map_err(|_| TransportError::BadUri(uri.to_string()))?;
            let bind_addr: Ipv4Addr = bind_addr
                .parse()
                .map_err(|_| TransportError::BadUri(uri.to_string()))?;
            Ok(Link::UdpMulticast(UdpMulticastTransport::bind(group, bind_addr).await?))
        }
        "udp-unicast" => {
            let peer_addr: SocketAddr = rest
                .parse()
                .map_err(|_| TransportError::BadUri(uri.to_string()))?;
            Ok(Link::UdpUnicast(UdpUnicastTransport::connect(peer_addr).await?))
        }
        "lora" => {
            let (path, baud) = parse_serial_authority(rest, uri)?;
            Ok(Link::Lora(LoraTransport::open(&path, baud)?))
        }
        "kiss" => {
            let (path, baud) = parse_serial_authority(rest, uri)?;
            Ok(Link::Kiss(KissTransport::open(&path, baud)?))
        }
        "ws" | "wss" => Ok(Link::Ws(WsTransport::connect(uri).await?)),
        _ => Err(TransportError::BadUri(uri.to_string())),
    }
}

/// Parse a `///path/to/device?baud=N` authority shared by `lora://` and
/// `kiss://` URIs, defaulting to 57600 baud when unspecified.
fn parse_serial_authority(rest: &str, uri: &str) -> Result<(String, u32)> {
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let mut baud = 57600;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("baud=") {
            baud = value.parse().map_err(|_| TransportError::BadUri(uri.to_string()))?;
        }
    }
    if path.is_empty() {
        return Err(TransportError::BadUri(uri.to_string()));
    }
    Ok((format!("/{path}"), baud))
}
