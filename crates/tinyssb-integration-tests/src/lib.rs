//! Multi-node test harness, wiring several in-process [`Engine`]s together
//! without any real transport (mirrors the no-network-I/O pattern used
//! elsewhere in this workspace's own integration suite).
//!
//! A "round" here collapses a GOset beacon tick and an ARQ tick into one
//! step, flooding any reply frames those produce to every node before the
//! round ends. This over-approximates real network timing (which spreads
//! GOset and ARQ on separate, slower intervals) but preserves the
//! round-count order of magnitude the scenarios in the specification call
//! for, without the flakiness of real sockets or sleeps.

use tempfile::TempDir;
use tinyssb_crypto::ed25519::KeyPair;
use tinyssb_engine::Engine;
use tinyssb_goset::GOset;
use tinyssb_store::Store;
use tinyssb_types::FeedId;

/// One in-process node: an isolated store/engine pair backed by its own
/// temp directory, torn down when dropped.
pub struct TestNode {
    pub engine: Engine,
    _dir: TempDir,
}

impl TestNode {
    /// Build a node over an empty store.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        let engine = Engine::open(store, GOset::new(), &dir.path().join("_backed")).expect("open engine");
        Self { engine, _dir: dir }
    }

    /// Build a node whose store already contains every feed in `fids`,
    /// seeded into its own GOset before the engine opens (mirroring a
    /// restart: the engine only ever receives a GOset pre-populated by its
    /// caller, per the daemon's own bootstrap sequence).
    pub fn with_store(dir: TempDir, store: Store, known_fids: &[FeedId]) -> Self {
        let mut goset = GOset::new();
        for fid in known_fids {
            let mut events = Vec::new();
            goset.add_key(*fid, &mut events);
        }
        let engine = Engine::open(store, goset, &dir.path().join("_backed")).expect("open engine");
        Self { engine, _dir: dir }
    }

    pub fn store(&self) -> &Store {
        self.engine.store()
    }

    /// Drop the engine (simulating a process crash) while keeping the
    /// backing directory alive, so the caller can reopen it.
    pub fn into_dir(self) -> TempDir {
        self._dir
    }

    /// Reopen a node from a directory left behind by a crashed/stopped
    /// node: re-scans the store for known feeds and reseeds the GOset from
    /// them, exactly like the daemon's own bootstrap sequence.
    pub fn reopen(dir: TempDir) -> Self {
        let store = Store::open(dir.path()).expect("reopen store");
        let known_fids = store.known_fids();
        Self::with_store(dir, store, &known_fids)
    }
}

/// A fresh Ed25519 keypair together with the [`FeedId`] it signs for.
pub fn new_identity() -> (FeedId, KeyPair) {
    let kp = KeyPair::generate();
    let fid = FeedId::from_slice(&kp.verifying_key().to_bytes()).expect("32 bytes");
    (fid, kp)
}

/// Run one combined GOset-beacon + ARQ round across every node, flooding
/// reply frames (WANT/CHNK answers, GOset claims) to full propagation
/// before returning.
pub fn run_round(nodes: &[&TestNode]) {
    let mut frontier = Vec::new();
    for node in nodes {
        frontier.extend(node.engine.run_goset_beacon());
        frontier.extend(node.engine.run_arq_round());
    }
    for _ in 0..8 {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for frame in &frontier {
            for node in nodes {
                if let Ok(replies) = node.engine.on_rx(frame) {
                    next.extend(replies);
                }
            }
        }
        frontier = next;
    }
}

/// Run [`run_round`] up to `max_rounds` times, stopping as soon as `done`
/// reports convergence.
pub fn run_until(nodes: &[&TestNode], max_rounds: usize, mut done: impl FnMut() -> bool) -> usize {
    for round in 0..max_rounds {
        if done() {
            return round;
        }
        run_round(nodes);
    }
    max_rounds
}
