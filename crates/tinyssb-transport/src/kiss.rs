//! Serial KISS link (§4.G, §6): SLIP-style byte-stuffed framing over a
//! serial port, duty-cycled like the LoRa link.
//!
//! Grounded on `io.py`'s `KISS`/`KISS_NEIGHBOR`.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;

use crate::face::FaceState;
use crate::{Result, TransportError};

const FEND: u8 = 0xC0;
const FESC: u8 = 0xDB;
const TFEND: u8 = 0xDC;
const TFESC: u8 = 0xDD;

/// SLIP-stuff `pkt` and wrap it in leading/trailing `FEND` delimiters.
fn kiss_encode(pkt: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pkt.len() + 2);
    out.push(FEND);
    for &b in pkt {
        match b {
            FEND => {
                out.push(FESC);
                out.push(TFEND);
            }
            FESC => {
                out.push(FESC);
                out.push(TFESC);
            }
            other => out.push(other),
        }
    }
    out.push(FEND);
    out
}

/// Incremental SLIP decoder: feed bytes one at a time, get a decoded frame
/// back each time a closing `FEND` completes one.
#[derive(Default)]
struct KissDecoder {
    buf: Vec<u8>,
    escaped: bool,
}

impl KissDecoder {
    fn push_byte(&mut self, b: u8) -> Option<Vec<u8>> {
        if b == FEND {
            self.escaped = false;
            if self.buf.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.buf));
        }
        if b == FESC {
            self.escaped = true;
            return None;
        }
        if self.escaped {
            self.escaped = false;
            match b {
                TFESC => self.buf.push(FESC),
                TFEND => self.buf.push(FEND),
                _ => {}
            }
            return None;
        }
        self.buf.push(b);
        None
    }
}

/// A serial KISS (TNC-framing) link, duty-cycle paced like LoRa.
pub struct KissTransport {
    port: tokio::sync::Mutex<tokio_serial::SerialStream>,
    face: FaceState,
    decoder: tokio::sync::Mutex<KissDecoder>,
}

impl KissTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .open_native_async()
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        Ok(Self {
            port: tokio::sync::Mutex::new(port),
            face: FaceState::new(),
            decoder: tokio::sync::Mutex::new(KissDecoder::default()),
        })
    }

    pub fn enqueue(&self, frame: Vec<u8>) {
        self.face.enqueue(frame);
    }

    /// Send one queued frame, then gate the next send by ~500ms plus jitter
    /// (mirrors `KISS_NEIGHBOR.send`'s pacing).
    pub async fn pump(&self) -> Result<()> {
        if let Some(frame) = self.face.dequeue() {
            let encoded = kiss_encode(&frame);
            self.port
                .lock()
                .await
                .write_all(&encoded)
                .await
                .map_err(TransportError::Io)?;
            let jitter = rand::random::<u64>() % 50;
            self.face.gate_until(Duration::from_millis(500 + jitter));
        }
        Ok(())
    }

    /// Read and decode bytes until a complete frame emerges, or `None` if
    /// the port yielded bytes but no frame completed yet.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>> {
        let mut byte = [0u8; 1];
        let mut port = self.port.lock().await;
        port.read_exact(&mut byte).await.map_err(TransportError::Io)?;
        let mut decoder = self.decoder.lock().await;
        Ok(decoder.push_byte(byte[0]))
    }
}
