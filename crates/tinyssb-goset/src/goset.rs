//! The GOset anti-entropy state machine (§4.E): a sorted set of feed IDs,
//! its XOR fold, and the beacon round that narrows disagreement with peers
//! via recursive range-splitting.
//!
//! Grounded on `old/tinyssb/goset.py`'s `GOset` class.

use std::collections::VecDeque;

use tinyssb_types::FeedId;

use crate::wire::{Claim, Frame, Novelty};

/// Maximum number of feed IDs a single GOset instance will track.
pub const GOSET_MAX_KEYS: usize = 100;

/// Seconds between beacon rounds.
pub const GOSET_ROUND_LEN_SECS: u64 = 10;

/// Ceiling on queued novelties/claims before new ones are dropped.
pub const MAX_PENDING: usize = 20;

/// Novelties emitted (from the queue) per beacon round.
pub const NOVELTY_PER_ROUND: u32 = 1;

/// "Ask" rebroadcasts budget per beacon round.
pub const ASK_PER_ROUND: u32 = 1;

/// Range-splitting "help" budget per beacon round.
pub const HELP_PER_ROUND: u32 = 2;

/// A side effect of a GOset state transition that the caller (the
/// replication engine) must react to. GOset holds no back-pointer into the
/// engine or feed registry (§9 Design Notes); it reports events instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GosetEvent {
    /// A feed ID was newly admitted to the tracked set; the engine should
    /// activate it as `PublicRemote` in the feed registry.
    KeyAdded(FeedId),
    /// The XOR-folded `state` changed; the engine should re-derive its
    /// `want`/`chnk` DMX values from the new state.
    StateChanged([u8; 32]),
}

/// The anti-entropy set of feed IDs being replicated, and its beacon logic.
#[derive(Debug, Default)]
pub struct GOset {
    keys: Vec<FeedId>,
    state: [u8; 32],
    pending_claims: Vec<Claim>,
    pending_novelty: VecDeque<Novelty>,
    novelty_credit: u32,
    largest_claim_span: usize,
}

impl GOset {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            state: [0u8; 32],
            pending_claims: Vec::new(),
            pending_novelty: VecDeque::new(),
            novelty_credit: NOVELTY_PER_ROUND,
            largest_claim_span: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[FeedId] {
        &self.keys
    }

    pub fn contains(&self, fid: &FeedId) -> bool {
        self.keys.contains(fid)
    }

    pub fn state(&self) -> [u8; 32] {
        self.state
    }

    fn xor_range(&self, lo: usize, hi: usize) -> [u8; 32] {
        let mut xor = *self.keys[lo].as_bytes();
        for k in &self.keys[lo + 1..=hi] {
            for (x, b) in xor.iter_mut().zip(k.as_bytes().iter()) {
                *x ^= b;
            }
        }
        xor
    }

    fn mk_claim(&self, lo: usize, hi: usize) -> Claim {
        Claim {
            lo: self.keys[lo],
            hi: self.keys[hi],
            xor: self.xor_range(lo, hi),
            sz: (hi - lo + 1) as u8,
        }
    }

    /// Admit a key without any side-effecting novelty scheduling. Returns
    /// `false` for the zero key, a duplicate, or when at capacity.
    fn include_key(&mut self, key: FeedId) -> bool {
        if key.is_zero() || self.keys.contains(&key) || self.keys.len() >= GOSET_MAX_KEYS {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Add a key, scheduling a novelty announcement for it if the set is
    /// large enough to warrant one. Emits [`GosetEvent::KeyAdded`] on
    /// success.
    pub fn add_key(&mut self, key: FeedId, events: &mut Vec<GosetEvent>) -> bool {
        if !self.include_key(key) {
            return false;
        }
        self.keys.sort();
        events.push(GosetEvent::KeyAdded(key));

        if self.keys.len() >= self.largest_claim_span && self.pending_novelty.len() < MAX_PENDING {
            self.pending_novelty.push_back(Novelty { key });
        }
        true
    }

    fn add_pending_claim(&mut self, claim: Claim) {
        if self
            .pending_claims
            .iter()
            .any(|c| c.sz == claim.sz && c.xor == claim.xor)
        {
            return;
        }
        self.pending_claims.push(claim);
    }

    /// Handle an inbound GOset wire frame (including its 7-byte DMX
    /// prefix). Novelties are absorbed via [`GOset::add_key`]; claims are
    /// checked for sync and otherwise queued as pending.
    pub fn rx(&mut self, frame: &[u8], events: &mut Vec<GosetEvent>) {
        if frame.len() <= 7 {
            return;
        }
        let body = &frame[7..];
        match Frame::parse(body) {
            Some(Frame::Novelty(n)) => {
                self.add_key(n.key, events);
            }
            Some(Frame::Claim(c)) => {
                if c.sz as usize > self.largest_claim_span {
                    self.largest_claim_span = c.sz as usize;
                }
                if c.sz as usize == self.keys.len() && c.xor == self.state {
                    tracing::debug!(keys = self.keys.len(), "GOset peer appears in sync");
                } else {
                    self.add_key(c.lo, events);
                    self.add_key(c.hi, events);
                    self.add_pending_claim(c);
                }
            }
            None => {}
        }
    }

    /// Recompute `state` from the current (sorted) key set, emitting
    /// [`GosetEvent::StateChanged`] unconditionally. Used on startup after
    /// reseeding keys from the log store.
    pub fn adjust_state(&mut self, events: &mut Vec<GosetEvent>) {
        self.keys.sort();
        self.state = if self.keys.is_empty() {
            [0u8; 32]
        } else {
            self.xor_range(0, self.keys.len() - 1)
        };
        events.push(GosetEvent::StateChanged(self.state));
    }

    /// Run one beacon round: emit queued novelties, the full-range claim,
    /// and recursive narrowing for any pending claims. Returns the wire
    /// frames to broadcast on every transport, plus any state-change
    /// events for the caller to react to.
    pub fn beacon(&mut self) -> (Vec<Vec<u8>>, Vec<GosetEvent>) {
        let mut emit = Vec::new();
        let mut events = Vec::new();

        if self.keys.is_empty() {
            return (emit, events);
        }

        while self.novelty_credit > 0 {
            match self.pending_novelty.pop_front() {
                Some(n) => {
                    emit.push(n.to_frame());
                    self.novelty_credit -= 1;
                }
                None => break,
            }
        }
        self.novelty_credit = NOVELTY_PER_ROUND;

        let full = self.mk_claim(0, self.keys.len() - 1);
        if full.xor != self.state {
            self.state = full.xor;
            events.push(GosetEvent::StateChanged(self.state));
        }
        emit.push(full.to_frame());

        let mut claims = std::mem::take(&mut self.pending_claims);
        claims.sort_by_key(|c| c.sz);

        let mut max_ask = ASK_PER_ROUND;
        let mut max_help = HELP_PER_ROUND;
        let mut retain = Vec::new();

        for c in claims {
            let lo_idx = self.keys.iter().position(|k| *k == c.lo);
            let hi_idx = self.keys.iter().position(|k| *k == c.hi);
            let (lo, hi) = match (lo_idx, hi_idx) {
                (Some(l), Some(h)) if l <= h => (l, h),
                _ => continue,
            };

            let partial = self.mk_claim(lo, hi);
            if partial.xor == c.xor {
                continue;
            }

            let mut fell_through_to_help = true;
            if partial.sz <= c.sz {
                if max_ask > 0 {
                    emit.push(partial.to_frame());
                    max_ask -= 1;
                }
                if partial.sz < c.sz {
                    retain.push(c);
                    fell_through_to_help = false;
                }
            }
            if !fell_through_to_help {
                continue;
            }

            if max_help > 0 {
                max_help -= 1;
                let lo2 = lo as i64 + 1;
                let hi2 = hi as i64 - 1;
                if hi2 <= lo2 {
                    if lo2 >= 0 && (lo2 as usize) < self.keys.len() {
                        emit.push(Novelty { key: self.keys[lo2 as usize] }.to_frame());
                    }
                } else if hi2 - lo2 <= 2 {
                    emit.push(self.mk_claim(lo2 as usize, hi2 as usize).to_frame());
                } else {
                    let sz = (hi2 + 1 - lo2) / 2;
                    emit.push(self.mk_claim(lo2 as usize, (lo2 + sz - 1) as usize).to_frame());
                    emit.push(self.mk_claim((lo2 + sz) as usize, hi2 as usize).to_frame());
                }
                continue;
            }

            retain.push(c);
        }

        while retain.len() >= MAX_PENDING - 5 {
            retain.pop();
        }
        self.pending_claims = retain;

        (emit, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(b: u8) -> FeedId {
        FeedId([b; 32])
    }

    #[test]
    fn test_rejects_zero_key() {
        let mut g = GOset::new();
        let mut events = Vec::new();
        assert!(!g.add_key(FeedId::ZERO, &mut events));
        assert!(g.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_key() {
        let mut g = GOset::new();
        let mut events = Vec::new();
        assert!(g.add_key(fid(1), &mut events));
        assert!(!g.add_key(fid(1), &mut events));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_caps_at_max_keys() {
        let mut g = GOset::new();
        let mut events = Vec::new();
        for i in 0..GOSET_MAX_KEYS {
            let mut b = [0u8; 32];
            b[0] = (i / 256) as u8;
            b[1] = (i % 256) as u8;
            b[31] = 1; // keep nonzero
            assert!(g.add_key(FeedId(b), &mut events));
        }
        assert_eq!(g.len(), GOSET_MAX_KEYS);
        let mut overflow = [0u8; 32];
        overflow[31] = 2;
        overflow[0] = 200;
        assert!(!g.add_key(FeedId(overflow), &mut events));
        assert_eq!(g.len(), GOSET_MAX_KEYS);
    }

    #[test]
    fn test_state_is_xor_of_sorted_keys() {
        let mut g = GOset::new();
        let mut events = Vec::new();
        g.add_key(fid(1), &mut events);
        g.add_key(fid(2), &mut events);
        g.add_key(fid(4), &mut events);
        g.adjust_state(&mut events);

        let mut expected = [0u8; 32];
        for b in [1u8, 2, 4] {
            for x in expected.iter_mut() {
                *x ^= b;
            }
        }
        assert_eq!(g.state(), expected);
    }

    #[test]
    fn test_empty_goset_has_zero_state() {
        let mut g = GOset::new();
        let mut events = Vec::new();
        g.adjust_state(&mut events);
        assert_eq!(g.state(), [0u8; 32]);
        assert_eq!(events, vec![GosetEvent::StateChanged([0u8; 32])]);
    }

    #[test]
    fn test_beacon_on_empty_set_emits_nothing() {
        let mut g = GOset::new();
        let (emit, events) = g.beacon();
        assert!(emit.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_beacon_emits_queued_novelty_and_full_range_claim() {
        let mut g = GOset::new();
        let mut events = Vec::new();
        g.add_key(fid(1), &mut events);
        g.add_key(fid(2), &mut events);

        let (emit, events) = g.beacon();
        // both keys were queued as novelties on admission; the round's
        // single novelty credit drains one, then the full claim follows.
        assert_eq!(emit.len(), 2);
        match Frame::parse(&emit[0][7..]) {
            Some(Frame::Novelty(n)) => assert_eq!(n.key, fid(1)),
            other => panic!("expected novelty, got {other:?}"),
        }
        match Frame::parse(&emit[1][7..]) {
            Some(Frame::Claim(_)) => {}
            other => panic!("expected claim, got {other:?}"),
        }
        assert!(matches!(events[0], GosetEvent::StateChanged(_)));
    }

    #[test]
    fn test_claim_from_peer_with_matching_state_is_noop() {
        let mut g = GOset::new();
        let mut events = Vec::new();
        g.add_key(fid(1), &mut events);
        g.add_key(fid(2), &mut events);
        g.adjust_state(&mut events);

        let full = g.mk_claim(0, 1);
        let mut events2 = Vec::new();
        g.rx(&full.to_frame(), &mut events2);
        assert!(events2.is_empty());
        assert!(g.pending_claims.is_empty());
    }

    #[test]
    fn test_claim_mismatch_queues_pending_and_adds_endpoints() {
        let mut g = GOset::new();
        let mut events = Vec::new();
        g.add_key(fid(1), &mut events);

        let bogus = Claim {
            lo: fid(5),
            hi: fid(9),
            xor: [0xAA; 32],
            sz: 2,
        };
        let mut events2 = Vec::new();
        g.rx(&bogus.to_frame(), &mut events2);
        assert!(g.contains(&fid(5)));
        assert!(g.contains(&fid(9)));
        assert_eq!(g.pending_claims.len(), 1);
    }

    #[test]
    fn test_novelty_frame_adds_key() {
        let mut g = GOset::new();
        let n = Novelty { key: fid(7) };
        let mut events = Vec::new();
        g.rx(&n.to_frame(), &mut events);
        assert!(g.contains(&fid(7)));
        assert_eq!(events, vec![GosetEvent::KeyAdded(fid(7))]);
    }

    #[test]
    fn test_three_peers_converge_on_union() {
        // A has {1,2}, B has {3}, C has {1,4}; each beacons its full claim at
        // the other two; after enough rounds all three sets equal {1,2,3,4}.
        let mut a = GOset::new();
        let mut b = GOset::new();
        let mut c = GOset::new();
        let mut ev = Vec::new();
        a.add_key(fid(1), &mut ev);
        a.add_key(fid(2), &mut ev);
        b.add_key(fid(3), &mut ev);
        c.add_key(fid(1), &mut ev);
        c.add_key(fid(4), &mut ev);

        for _ in 0..8 {
            let (fa, _) = a.beacon();
            let (fb, _) = b.beacon();
            let (fc, _) = c.beacon();
            for frame in fa.iter().chain(fb.iter()).chain(fc.iter()) {
                let mut e = Vec::new();
                a.rx(frame, &mut e);
                b.rx(frame, &mut e);
                c.rx(frame, &mut e);
            }
        }

        let expected: Vec<FeedId> = {
            let mut v = vec![fid(1), fid(2), fid(3), fid(4)];
            v.sort();
            v
        };
        assert_eq!(a.keys(), expected.as_slice());
        assert_eq!(b.keys(), expected.as_slice());
        assert_eq!(c.keys(), expected.as_slice());
    }
}
