//! The replication engine (§4.F): dispatch table, WANT/CHNK serving and
//! generation, incoming-entry/blob handlers, pending-chain recovery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tinyssb_crypto::ed25519::{Signature, VerifyingKey};
use tinyssb_goset::{GOset, GosetEvent};
use tinyssb_packet::chain;
use tinyssb_packet::codec::{self, Packet};
use tinyssb_store::registry::{FeedKind, FeedRegistry};
use tinyssb_store::Store;
use tinyssb_types::{Dmx, FeedId, Mid, PacketType, SIGNATURE_LEN};

use crate::handler::Handler;
use crate::pending::{self, PendingChains};
use crate::wire;
use crate::{EngineError, Result};

/// Verify a signature using the feed ID itself as the Ed25519 public key,
/// the only verification capability the engine needs for replicated feeds
/// whose secret key it does not hold.
pub fn verify_by_fid(fid: &FeedId, sig: &[u8; SIGNATURE_LEN], msg: &[u8]) -> bool {
    match VerifyingKey::from_bytes(fid.as_bytes()) {
        Ok(vk) => vk.verify(msg, &Signature::from_bytes(sig)).is_ok(),
        Err(_) => false,
    }
}

fn want_dmx_of(state: &[u8; 32]) -> Dmx {
    let mut data = tinyssb_crypto::hashing::WIRE_PREFIX.to_vec();
    data.extend_from_slice(b"want");
    data.extend_from_slice(state);
    tinyssb_crypto::hashing::dmx(&data)
}

fn chnk_dmx_of(state: &[u8; 32]) -> Dmx {
    let mut data = tinyssb_crypto::hashing::WIRE_PREFIX.to_vec();
    data.extend_from_slice(b"blob");
    data.extend_from_slice(state);
    tinyssb_crypto::hashing::dmx(&data)
}

fn genesis_dmx(fid: &FeedId) -> Dmx {
    let anchor_mid = Mid::from_slice(&fid.as_bytes()[..20]).expect("20 bytes");
    codec::compute_dmx(fid, 1, &anchor_mid)
}

fn next_blob_ptr(blob: &chain::Blob) -> Option<Mid> {
    let ptr = Mid::from_slice(&blob[100..120]).expect("20 bytes");
    if ptr.is_zero() {
        None
    } else {
        Some(ptr)
    }
}

fn chain_head_ptr(pkt: &Packet) -> Option<Mid> {
    if pkt.typ != PacketType::Chain20 {
        return None;
    }
    let ptr = Mid::from_slice(&pkt.payload[28..48]).expect("20 bytes");
    if ptr.is_zero() {
        None
    } else {
        Some(ptr)
    }
}

struct Inner {
    dmx_table: HashMap<Dmx, Handler>,
    blob_table: HashMap<Mid, Handler>,
    pending_chains: PendingChains,
    want_dmx: Dmx,
    chnk_dmx: Dmx,
    log_offset: usize,
}

/// The replication engine: owns the GOset instance, the feed registry, the
/// dispatch tables, and pending-chain recovery state for one node.
pub struct Engine {
    store: Store,
    registry: FeedRegistry,
    goset: Mutex<GOset>,
    inner: Mutex<Inner>,
    backed_dir: PathBuf,
}

impl Engine {
    /// Build an engine over an already-open store and GOset, reloading
    /// `pending_chains.json` and re-arming every handler per §7 recovery.
    pub fn open(store: Store, mut goset: GOset, backed_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(backed_dir)?;
        let pending_chains = pending::load(backed_dir)?;

        let mut events = Vec::new();
        goset.adjust_state(&mut events);
        let state = goset.state();

        let mut dmx_table = HashMap::new();
        dmx_table.insert(wire_goset_dmx(), Handler::Goset);
        let want_dmx = want_dmx_of(&state);
        let chnk_dmx = chnk_dmx_of(&state);
        dmx_table.insert(want_dmx, Handler::Want);
        dmx_table.insert(chnk_dmx, Handler::Chnk);

        let registry = FeedRegistry::new();
        for fid in store.known_fids() {
            registry.register(fid, FeedKind::PublicRemote);
            registry.activate(fid);
            if let Some((front_seq, front_mid)) = store.front_of(&fid) {
                let dmx = codec::compute_dmx(&fid, front_seq + 1, &front_mid);
                dmx_table.insert(dmx, Handler::FeedEntry { fid, seq: front_seq + 1 });
            }
        }

        let mut blob_table = HashMap::new();
        for (hash, (fid, seq, idx)) in &pending_chains {
            blob_table.insert(
                *hash,
                Handler::ChainBlob { hash: *hash, fid: *fid, seq: *seq, idx: *idx },
            );
        }

        Ok(Self {
            store,
            registry,
            goset: Mutex::new(goset),
            inner: Mutex::new(Inner {
                dmx_table,
                blob_table,
                pending_chains,
                want_dmx,
                chnk_dmx,
                log_offset: 0,
            }),
            backed_dir: backed_dir.to_path_buf(),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    fn arm_dmx(&self, inner: &mut Inner, dmx: Dmx, handler: Handler) {
        inner.dmx_table.insert(dmx, handler);
    }

    fn disarm_dmx(&self, inner: &mut Inner, dmx: &Dmx) {
        inner.dmx_table.remove(dmx);
    }

    fn arm_blob(&self, inner: &mut Inner, hash: Mid, handler: Handler) {
        inner.blob_table.insert(hash, handler);
    }

    fn disarm_blob(&self, inner: &mut Inner, hash: &Mid) {
        inner.blob_table.remove(hash);
    }

    fn persist_pending(&self, inner: &Inner) {
        if let Err(err) = pending::save(&self.backed_dir, &inner.pending_chains) {
            tracing::error!(?err, "failed to persist pending_chains.json");
        }
    }

    /// Allocate a brand-new feed whose genesis is expected from the
    /// network, register it, and arm its genesis DMX handler.
    fn admit_remote_feed(&self, inner: &mut Inner, fid: FeedId) -> Result<()> {
        if !self.store.has_log(&fid) {
            self.store.allocate_skeleton(fid)?;
        }
        self.registry.register(fid, FeedKind::PublicRemote);
        self.registry.activate(fid);
        self.arm_dmx(inner, genesis_dmx(&fid), Handler::FeedEntry { fid, seq: 1 });
        Ok(())
    }

    fn rederive_engine_dmx(&self, inner: &mut Inner, state: &[u8; 32]) {
        let old_want = inner.want_dmx;
        let old_chnk = inner.chnk_dmx;
        self.disarm_dmx(inner, &old_want);
        self.disarm_dmx(inner, &old_chnk);
        let want_dmx = want_dmx_of(state);
        let chnk_dmx = chnk_dmx_of(state);
        inner.want_dmx = want_dmx;
        inner.chnk_dmx = chnk_dmx;
        self.arm_dmx(inner, want_dmx, Handler::Want);
        self.arm_dmx(inner, chnk_dmx, Handler::Chnk);
    }

    fn apply_goset_events(&self, inner: &mut Inner, events: &[GosetEvent]) -> Result<()> {
        for ev in events {
            match ev {
                GosetEvent::StateChanged(state) => self.rederive_engine_dmx(inner, state),
                GosetEvent::KeyAdded(fid) => self.admit_remote_feed(inner, *fid)?,
            }
        }
        Ok(())
    }

    /// Dispatch a single incoming wire frame, returning any reply frames to
    /// broadcast on every transport.
    pub fn on_rx(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>> {
        if buf.len() < 7 {
            return Ok(Vec::new());
        }
        let mut dmx = [0u8; 7];
        dmx.copy_from_slice(&buf[..7]);

        let handler = {
            let inner = self.inner.lock().expect("engine mutex poisoned");
            inner.dmx_table.get(&dmx).copied()
        };

        if let Some(handler) = handler {
            return self.dispatch(handler, buf);
        }

        if buf.len() == 120 {
            let hash = tinyssb_crypto::hashing::mid20(buf);
            let handler = {
                let inner = self.inner.lock().expect("engine mutex poisoned");
                inner.blob_table.get(&hash).copied()
            };
            if let Some(handler) = handler {
                return self.dispatch(handler, buf);
            }
        }

        Ok(Vec::new())
    }

    fn dispatch(&self, handler: Handler, buf: &[u8]) -> Result<Vec<Vec<u8>>> {
        match handler {
            Handler::Goset => self.handle_goset(buf),
            Handler::Want => self.handle_want(buf),
            Handler::Chnk => self.handle_chnk(buf),
            Handler::FeedEntry { fid, seq } => self.handle_feed_entry(fid, seq, buf),
            Handler::ChainBlob { hash, fid, seq, idx } => {
                self.handle_chained_blob(hash, fid, seq, idx, buf)
            }
        }
    }

    fn handle_goset(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut events = Vec::new();
        self.goset.lock().expect("goset mutex poisoned").rx(buf, &mut events);
        let mut inner = self.inner.lock().expect("engine mutex poisoned");
        self.apply_goset_events(&mut inner, &events)?;
        Ok(Vec::new())
    }

    fn handle_want(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>> {
        let Some((offset, seqs)) = wire::decode_want(&buf[7..]) else {
            return Ok(Vec::new());
        };
        let goset = self.goset.lock().expect("goset mutex poisoned");
        let keys = goset.keys();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut emit = Vec::new();
        let mut credit = wire::CREDIT;
        for (i, seq) in seqs.iter().enumerate() {
            if credit == 0 {
                break;
            }
            let fid = keys[(offset as usize + i) % keys.len()];
            if let Some(pkt) = self.store.read(&fid, *seq)? {
                emit.push(pkt.wire.to_vec());
                credit -= 1;
            }
        }
        Ok(emit)
    }

    fn handle_chnk(&self, buf: &[u8]) -> Result<Vec<Vec<u8>>> {
        let Some(entries) = wire::decode_chnk(&buf[7..]) else {
            return Ok(Vec::new());
        };
        let goset = self.goset.lock().expect("goset mutex poisoned");
        let keys = goset.keys().to_vec();
        drop(goset);

        let mut emit = Vec::new();
        let mut credit = wire::CREDIT;
        for (feed_idx, seq, blob_idx) in entries {
            if credit == 0 {
                break;
            }
            let Some(fid) = keys.get(feed_idx as usize).copied() else {
                continue;
            };
            let Some(head) = self.store.read(&fid, seq)? else {
                continue;
            };
            let mut ptr = chain_head_ptr(&head);
            let mut skip = blob_idx;
            while let Some(hash) = ptr {
                let Some(blob) = self.store.fetch_blob(&hash)? else {
                    break;
                };
                if skip > 0 {
                    skip -= 1;
                    ptr = next_blob_ptr(&blob);
                    continue;
                }
                emit.push(blob.to_vec());
                credit -= 1;
                if credit == 0 {
                    break;
                }
                ptr = next_blob_ptr(&blob);
            }
        }
        Ok(emit)
    }

    fn handle_feed_entry(&self, fid: FeedId, _seq: u32, buf: &[u8]) -> Result<Vec<Vec<u8>>> {
        let pkt = match self.store.append(&fid, buf, |f, s, m| verify_by_fid(f, s, m)) {
            Ok(pkt) => pkt,
            Err(_) => return Ok(Vec::new()), // verification failed; leave handler armed
        };

        let mut inner = self.inner.lock().expect("engine mutex poisoned");

        match pkt.typ {
            PacketType::Contdas => {
                let next_fid = FeedId::from_slice(&pkt.payload[..32]).map_err(|_| EngineError::Corrupt)?;
                self.admit_remote_feed(&mut inner, next_fid)?;
            }
            PacketType::MkChild => {
                let child_fid = FeedId::from_slice(&pkt.payload[..32]).map_err(|_| EngineError::Corrupt)?;
                self.admit_remote_feed(&mut inner, child_fid)?;
            }
            PacketType::Chain20 => {
                match self.store.undo_chain(&pkt)? {
                    chain::ChainOutcome::Complete(content) => {
                        self.store.fire_append_cb(&fid, &content)?;
                    }
                    chain::ChainOutcome::NeedBlob(hash) => {
                        inner.pending_chains.insert(hash, (fid, pkt.seq, 0));
                        self.arm_blob(&mut inner, hash, Handler::ChainBlob { hash, fid, seq: pkt.seq, idx: 0 });
                        self.persist_pending(&inner);
                    }
                }
            }
            PacketType::Plain48 => {
                self.store.fire_append_cb(&fid, &pkt.payload)?;
            }
            _ => {}
        }

        // A feed cannot be extended past a contdas entry (§3 invariants):
        // don't arm a handler that would accept a further entry on it.
        if pkt.typ != PacketType::Contdas {
            let next_dmx = pkt.predict_next_dmx();
            self.arm_dmx(&mut inner, next_dmx, Handler::FeedEntry { fid, seq: pkt.seq + 1 });
        }
        Ok(Vec::new())
    }

    fn handle_chained_blob(
        &self,
        hash: Mid,
        fid: FeedId,
        seq: u32,
        idx: u32,
        buf: &[u8],
    ) -> Result<Vec<Vec<u8>>> {
        if buf.len() != 120 {
            return Ok(Vec::new());
        }
        let mut blob: chain::Blob = [0u8; 120];
        blob.copy_from_slice(buf);
        self.store.add_blob(&blob)?;

        let mut inner = self.inner.lock().expect("engine mutex poisoned");
        self.disarm_blob(&mut inner, &hash);
        inner.pending_chains.remove(&hash);

        match next_blob_ptr(&blob) {
            None => {
                if let Some(head) = self.store.read(&fid, seq)? {
                    if let chain::ChainOutcome::Complete(content) = self.store.undo_chain(&head)? {
                        self.store.fire_append_cb(&fid, &content)?;
                    }
                }
            }
            Some(next_hash) => {
                inner.pending_chains.insert(next_hash, (fid, seq, idx + 1));
                self.arm_blob(
                    &mut inner,
                    next_hash,
                    Handler::ChainBlob { hash: next_hash, fid, seq, idx: idx + 1 },
                );
            }
        }
        self.persist_pending(&inner);
        Ok(Vec::new())
    }

    /// Run one GOset beacon round, returning frames to broadcast.
    pub fn run_goset_beacon(&self) -> Vec<Vec<u8>> {
        let (emit, events) = self.goset.lock().expect("goset mutex poisoned").beacon();
        let mut inner = self.inner.lock().expect("engine mutex poisoned");
        if let Err(err) = self.apply_goset_events(&mut inner, &events) {
            tracing::error!(?err, "failed to apply GOset events");
        }
        emit
    }

    /// Run one ARQ round: advance the rotation offset, build and emit the
    /// WANT vector, and re-request any still-pending chain blobs.
    pub fn run_arq_round(&self) -> Vec<Vec<u8>> {
        let goset = self.goset.lock().expect("goset mutex poisoned");
        let keys = goset.keys().to_vec();
        drop(goset);

        let mut emit = Vec::new();
        if keys.is_empty() {
            return emit;
        }

        let mut inner = self.inner.lock().expect("engine mutex poisoned");
        inner.log_offset = (inner.log_offset + 1) % keys.len();
        let offset = inner.log_offset;

        let capacity = wire::want_capacity().min(keys.len());
        let mut seqs = Vec::with_capacity(capacity);
        for i in 0..capacity {
            let fid = keys[(offset + i) % keys.len()];
            let (front_seq, _) = self.store.front(&fid).unwrap_or((0, Mid::ZERO));
            let next_seq = front_seq + 1;
            seqs.push(next_seq);
            if let Some((_, front_mid)) = self.store.front_of(&fid) {
                let dmx = codec::compute_dmx(&fid, next_seq, &front_mid);
                self.arm_dmx(&mut inner, dmx, Handler::FeedEntry { fid, seq: next_seq });
            }
        }
        let want_body = wire::encode_want(offset as u8, &seqs);
        let mut want_frame = inner.want_dmx.to_vec();
        want_frame.extend_from_slice(&want_body);
        emit.push(want_frame);

        if !inner.pending_chains.is_empty() {
            let mut entries = Vec::new();
            for (_, (fid, seq, idx)) in inner.pending_chains.iter().take(wire::chnk_capacity()) {
                if let Some(feed_idx) = keys.iter().position(|k| k == fid) {
                    entries.push((feed_idx as u8, *seq, *idx as u8));
                }
            }
            if !entries.is_empty() {
                let chnk_body = wire::encode_chnk(&entries);
                let mut chnk_frame = inner.chnk_dmx.to_vec();
                chnk_frame.extend_from_slice(&chnk_body);
                emit.push(chnk_frame);
            }
        }

        emit
    }

    /// Publish a new plain48 entry on a feed this node holds the signing
    /// key for.
    pub fn write_plain_48b(
        &self,
        fid: &FeedId,
        payload: &[u8],
        sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
    ) -> Result<Packet> {
        self.write_typed_48b(fid, PacketType::Plain48, payload, sign_fn)
    }

    /// Publish a new entry of the given type on a feed this node holds the
    /// signing key for.
    pub fn write_typed_48b(
        &self,
        fid: &FeedId,
        typ: PacketType,
        payload: &[u8],
        sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
    ) -> Result<Packet> {
        let (seq, mid) = self.store.front(fid)?;
        let pkt = codec::encode_typed(fid, seq + 1, &mid, typ, payload, sign_fn)?;
        let appended = self.store.append(fid, &pkt.wire, |f, s, m| verify_by_fid(f, s, m))?;
        let mut inner = self.inner.lock().expect("engine mutex poisoned");
        let next_dmx = appended.predict_next_dmx();
        self.arm_dmx(&mut inner, next_dmx, Handler::FeedEntry { fid: *fid, seq: appended.seq + 1 });
        Ok(appended)
    }

    /// Publish a payload too large for a single entry as a `chain20` head
    /// plus its blob sidechain.
    pub fn write_blob_chain(
        &self,
        fid: &FeedId,
        content: &[u8],
        sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
    ) -> Result<Packet> {
        let (seq, mid) = self.store.front(fid)?;
        let (head, blobs) = chain::mk_chain(fid, seq + 1, &mid, content, sign_fn)?;
        let appended = self
            .store
            .persist_chain(fid, &head, &blobs, |f, s, m| verify_by_fid(f, s, m))?;
        let mut inner = self.inner.lock().expect("engine mutex poisoned");
        let next_dmx = appended.predict_next_dmx();
        self.arm_dmx(&mut inner, next_dmx, Handler::FeedEntry { fid: *fid, seq: appended.seq + 1 });
        Ok(appended)
    }
}

fn wire_goset_dmx() -> Dmx {
    tinyssb_goset::wire::goset_dmx()
}
