//! Shared send-queue and duty-cycle state every link kind embeds (§4.G).
//!
//! Grounded on `io.py`'s `FACE`/`NEIGHBOR` superclasses: an outbound queue
//! that drops exact duplicates, and an optional `earliest_send` gate that
//! link kinds with a duty cycle (LoRa, KISS) use to throttle transmission.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

/// Outbound frame queue plus duty-cycle gate shared by every link kind.
#[derive(Default)]
pub struct FaceState {
    outqueue: Mutex<VecDeque<Vec<u8>>>,
    earliest_send: Mutex<Option<Instant>>,
}

impl FaceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for sending, unless it's already queued (mirrors
    /// `FACE.enqueue`'s `if not pktbits in self.outqueue` dedup check).
    pub fn enqueue(&self, frame: Vec<u8>) {
        let mut q = self.outqueue.lock().expect("outqueue mutex poisoned");
        if !q.contains(&frame) {
            q.push_back(frame);
        }
    }

    /// Pop the next queued frame, if the duty-cycle gate (if any) has
    /// opened.
    pub fn dequeue(&self) -> Option<Vec<u8>> {
        if !self.may_send_now() {
            return None;
        }
        self.outqueue.lock().expect("outqueue mutex poisoned").pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.outqueue.lock().expect("outqueue mutex poisoned").is_empty()
    }

    fn may_send_now(&self) -> bool {
        match *self.earliest_send.lock().expect("earliest_send mutex poisoned") {
            None => true,
            Some(t) => Instant::now() >= t,
        }
    }

    /// Push the duty-cycle gate forward by `delay` from now (airtime /
    /// pacing estimate after a send).
    pub fn gate_until(&self, delay: std::time::Duration) {
        *self.earliest_send.lock().expect("earliest_send mutex poisoned") = Some(Instant::now() + delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_enqueue_is_deduped() {
        let face = FaceState::new();
        face.enqueue(vec![1, 2, 3]);
        face.enqueue(vec![1, 2, 3]);
        assert_eq!(face.dequeue(), Some(vec![1, 2, 3]));
        assert_eq!(face.dequeue(), None);
    }

    #[test]
    fn test_gate_blocks_dequeue_until_elapsed() {
        let face = FaceState::new();
        face.enqueue(vec![9]);
        face.gate_until(std::time::Duration::from_millis(50));
        assert_eq!(face.dequeue(), None);
        std::thread::sleep(std::time::Duration::from_millis(60));
        assert_eq!(face.dequeue(), Some(vec![9]));
    }
}
