//! LoRa link (§4.G, §6): duty-cycle gated transmission over a UART-attached
//! radio module.
//!
//! Grounded on `io.py`'s `LORA`/`LORA_NEIGHBOR`. The teacher's dependency
//! stack has no generic LoRa radio crate (there is no standard register-level
//! driver for the zoo of UART radio modules in the wild, e.g. RN2483, E32,
//! SX127x-with-AT-firmware); like the Python original, which talks to its
//! radio as a plain serial device, this link is built atop the same
//! `tokio-serial` port used by [`crate::kiss`], distinguished only by its
//! duty-cycle budget.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;

use crate::face::FaceState;
use crate::{Result, TransportError};

/// Minimum spacing enforced between transmissions, approximating the
/// regulatory duty-cycle limit (e.g. 1% airtime in the EU868 band) the
/// Python original's `LORA_NEIGHBOR.send` honors via its own timer.
const DEFAULT_DUTY_CYCLE_GAP: Duration = Duration::from_secs(2);

/// A LoRa radio link, addressed as a serial port and paced by a duty cycle.
pub struct LoraTransport {
    port: tokio::sync::Mutex<tokio_serial::SerialStream>,
    face: FaceState,
    duty_cycle_gap: Duration,
}

impl LoraTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_duty_cycle(path, baud_rate, DEFAULT_DUTY_CYCLE_GAP)
    }

    pub fn open_with_duty_cycle(path: &str, baud_rate: u32, duty_cycle_gap: Duration) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .open_native_async()
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        Ok(Self {
            port: tokio::sync::Mutex::new(port),
            face: FaceState::new(),
            duty_cycle_gap,
        })
    }

    pub fn enqueue(&self, frame: Vec<u8>) {
        self.face.enqueue(frame);
    }

    pub fn has_pending(&self) -> bool {
        !self.face.is_empty()
    }

    /// Send one queued frame (length-prefixed, since LoRa packets are raw
    /// byte blobs with no inherent delimiter), then gate further sends
    /// until the duty cycle re-opens.
    pub async fn pump(&self) -> Result<()> {
        if let Some(frame) = self.face.dequeue() {
            let len = u16::try_from(frame.len()).map_err(|_| TransportError::FrameTooLarge(frame.len()))?;
            let mut port = self.port.lock().await;
            port.write_all(&len.to_be_bytes()).await.map_err(TransportError::Io)?;
            port.write_all(&frame).await.map_err(TransportError::Io)?;
            self.face.gate_until(self.duty_cycle_gap);
        }
        Ok(())
    }

    /// Block for the next length-prefixed frame off the wire.
    pub async fn recv(&self) -> Result<Vec<u8>> {
        let mut port = self.port.lock().await;
        let mut len_bytes = [0u8; 2];
        port.read_exact(&mut len_bytes).await.map_err(TransportError::Io)?;
        let len = u16::from_be_bytes(len_bytes) as usize;
        let mut frame = vec![0u8; len];
        port.read_exact(&mut frame).await.map_err(TransportError::Io)?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duty_cycle_gap_blocks_second_send() {
        let face = FaceState::new();
        face.enqueue(vec![1]);
        assert_eq!(face.dequeue(), Some(vec![1]));
        face.gate_until(Duration::from_millis(30));
        face.enqueue(vec![2]);
        assert_eq!(face.dequeue(), None);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(face.dequeue(), Some(vec![2]));
    }
}
