//! WebSocket link (§4.G, §6): one logical neighbor per open socket.
//!
//! Grounded on `io.py`'s `WS` class, adapted to `tokio-tungstenite`'s
//! connect/accept split.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::face::FaceState;
use crate::{Result, TransportError};

/// One WebSocket connection to a single neighbor, either side of the
/// handshake.
pub struct WsTransport {
    stream: tokio::sync::Mutex<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    face: FaceState,
}

impl WsTransport {
    /// Dial out to a neighbor's WebSocket listener.
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(Self {
            stream: tokio::sync::Mutex::new(stream),
            face: FaceState::new(),
        })
    }

    /// Accept a single inbound connection on `listener`, becoming that
    /// peer's neighbor for the lifetime of the socket.
    pub async fn accept_one(listener: &TcpListener) -> Result<Self> {
        let (tcp, _peer_addr) = listener.accept().await.map_err(TransportError::Io)?;
        let stream = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(tcp))
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(Self {
            stream: tokio::sync::Mutex::new(stream),
            face: FaceState::new(),
        })
    }

    pub fn enqueue(&self, frame: Vec<u8>) {
        self.face.enqueue(frame);
    }

    pub async fn pump(&self) -> Result<()> {
        if let Some(frame) = self.face.dequeue() {
            self.stream
                .lock()
                .await
                .send(Message::Binary(frame))
                .await
                .map_err(|e| TransportError::Protocol(e.to_string()))?;
        }
        Ok(())
    }

    /// Wait for the next binary frame, skipping ping/pong/close control
    /// frames transparently.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>> {
        let mut stream = self.stream.lock().await;
        match stream.next().await {
            None => Ok(None),
            Some(Ok(Message::Binary(data))) => Ok(Some(data)),
            Some(Ok(_other)) => Ok(None),
            Some(Err(e)) => Err(TransportError::Protocol(e.to_string())),
        }
    }
}
