//! Store-level operations (§4.C): per-process cache of open logs, feed
//! allocation (`allocate_log`/`mk_generic_log`/`mk_child_log`/
//! `mk_continuation_log`), and startup directory scanning.
//!
//! Grounded on `repository.py`'s `REPO` class.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tinyssb_packet::chain::Blob;
use tinyssb_packet::{chain, codec};
use tinyssb_types::{FeedId, Mid, PacketType, SIGNATURE_LEN};

use crate::blob::BlobStore;
use crate::log::LogHandle;
use crate::{Result, StoreError};

fn logs_dir(root: &Path) -> PathBuf {
    root.join("_logs")
}

fn log_path(root: &Path, fid: &FeedId) -> PathBuf {
    logs_dir(root).join(format!("{}.log", fid.to_hex()))
}

/// The on-disk store: a directory of per-feed log files plus a blob CAS,
/// with open logs cached in memory for the lifetime of the process.
pub struct Store {
    root: PathBuf,
    blobs: BlobStore,
    open_logs: Mutex<HashMap<FeedId, LogHandle>>,
}

impl Store {
    /// Open (or create) the store rooted at `root`, scanning `_logs/` for
    /// any log files already present and opening each one. This is the
    /// store-level counterpart to the engine's own startup reseed.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(logs_dir(root))?;
        fs::create_dir_all(root.join("_backed"))?;
        let blobs = BlobStore::open(root)?;

        let mut open_logs = HashMap::new();
        for entry in fs::read_dir(logs_dir(root))? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }
            let handle = LogHandle::open(&path)?;
            open_logs.insert(handle.fid(), handle);
        }

        Ok(Self {
            root: root.to_path_buf(),
            blobs,
            open_logs: Mutex::new(open_logs),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All feed IDs with an open log, for GOset/engine reseed on startup.
    pub fn known_fids(&self) -> Vec<FeedId> {
        self.open_logs
            .lock()
            .expect("store mutex poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// `(front_seq, front_mid)` of a known feed, for re-arming DMX handlers.
    pub fn front_of(&self, fid: &FeedId) -> Option<(u32, Mid)> {
        self.open_logs
            .lock()
            .expect("store mutex poisoned")
            .get_mut(fid)
            .map(|h| h.front())
    }

    /// Allocate a brand-new log with an explicit anchor, optionally
    /// appending a pre-built, already-encoded genesis packet.
    #[allow(clippy::too_many_arguments)]
    pub fn allocate_log(
        &self,
        fid: FeedId,
        anchor_seq: u32,
        anchor_mid: Mid,
        genesis: Option<&[u8]>,
        parent_fid: FeedId,
        parent_seq: u32,
        verify_fn: impl Fn(&FeedId, &[u8; SIGNATURE_LEN], &[u8]) -> bool,
    ) -> Result<()> {
        let path = log_path(&self.root, &fid);
        let handle = LogHandle::create(
            &path,
            fid,
            anchor_seq,
            anchor_mid,
            parent_fid,
            parent_seq,
            genesis,
            verify_fn,
        )?;
        self.open_logs
            .lock()
            .expect("store mutex poisoned")
            .insert(fid, handle);
        Ok(())
    }

    /// Allocate an empty skeleton log for a feed known only by its ID (e.g.
    /// from a GOset digest): `anchor_seq=0`, `anchor_mid=fid[:20]`, no
    /// genesis entry yet.
    pub fn allocate_skeleton(&self, fid: FeedId) -> Result<()> {
        if self.has_log(&fid) {
            return Ok(());
        }
        let anchor_mid = Mid::from_slice(&fid.as_bytes()[..20]).expect("20 bytes");
        self.allocate_log(fid, 0, anchor_mid, None, FeedId::ZERO, 0, |_, _, _| true)
    }

    /// Special case of `allocate_log` where `anchor_seq=0`,
    /// `anchor_mid=fid[:20]`, and the genesis entry (seq=1) is created
    /// inline from a payload and signing capability, rather than from an
    /// already-encoded packet.
    pub fn mk_generic_log(
        &self,
        fid: FeedId,
        typ: PacketType,
        payload48: &[u8],
        sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
        parent_fid: FeedId,
        parent_seq: u32,
    ) -> Result<()> {
        let anchor_mid = Mid::from_slice(&fid.as_bytes()[..20]).expect("20 bytes");
        let genesis = codec::encode_typed(&fid, 1, &anchor_mid, typ, payload48, sign_fn)?;
        self.allocate_log(
            fid,
            0,
            anchor_mid,
            Some(&genesis.wire),
            parent_fid,
            parent_seq,
            |_, _, _| true,
        )
    }

    /// Append a `mkchild` entry to the parent feed, then allocate the child
    /// feed with an `ischild` genesis whose proof is the last 12 bytes of
    /// the parent entry's signature (§9 Open Questions: resolved reading).
    pub fn mk_child_log(
        &self,
        parent_fid: FeedId,
        parent_sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
        child_fid: FeedId,
        child_sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
        usage16: &[u8],
        verify_fn: impl Fn(&FeedId, &[u8; SIGNATURE_LEN], &[u8]) -> bool,
    ) -> Result<()> {
        if usage16.len() > 16 {
            return Err(StoreError::Packet(tinyssb_packet::PacketError::PayloadTooLong(
                usage16.len(),
            )));
        }
        let mut payload = [0u8; 48];
        payload[..32].copy_from_slice(child_fid.as_bytes());
        payload[32..32 + usage16.len()].copy_from_slice(usage16);

        let parent_entry = {
            let mut logs = self.open_logs.lock().expect("store mutex poisoned");
            let parent = logs.get_mut(&parent_fid).ok_or(StoreError::NotFound)?;
            let (front_seq, front_mid) = parent.front();
            let pkt = codec::encode_typed(
                &parent_fid,
                front_seq + 1,
                &front_mid,
                PacketType::MkChild,
                &payload,
                parent_sign_fn,
            )?;
            parent.append(&pkt.wire, &verify_fn)?
        };

        let mut proof = [0u8; 12];
        proof.copy_from_slice(&parent_entry.signature[SIGNATURE_LEN - 12..]);

        let mut child_payload = [0u8; 48];
        child_payload[..32].copy_from_slice(parent_fid.as_bytes());
        child_payload[32..36].copy_from_slice(&parent_entry.seq.to_be_bytes());
        child_payload[36..48].copy_from_slice(&proof);

        self.mk_generic_log(
            child_fid,
            PacketType::IsChild,
            &child_payload,
            child_sign_fn,
            parent_fid,
            parent_entry.seq,
        )
    }

    /// Symmetric to [`Store::mk_child_log`], using `contdas`/`iscontn`.
    pub fn mk_continuation_log(
        &self,
        prev_fid: FeedId,
        prev_sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
        cont_fid: FeedId,
        cont_sign_fn: impl FnOnce(&[u8]) -> [u8; SIGNATURE_LEN],
        verify_fn: impl Fn(&FeedId, &[u8; SIGNATURE_LEN], &[u8]) -> bool,
    ) -> Result<()> {
        let mut payload = [0u8; 48];
        payload[..32].copy_from_slice(cont_fid.as_bytes());

        let prev_entry = {
            let mut logs = self.open_logs.lock().expect("store mutex poisoned");
            let prev = logs.get_mut(&prev_fid).ok_or(StoreError::NotFound)?;
            let (front_seq, front_mid) = prev.front();
            let pkt = codec::encode_typed(
                &prev_fid,
                front_seq + 1,
                &front_mid,
                PacketType::Contdas,
                &payload,
                prev_sign_fn,
            )?;
            prev.append(&pkt.wire, &verify_fn)?
        };

        let mut proof = [0u8; 12];
        proof.copy_from_slice(&prev_entry.signature[SIGNATURE_LEN - 12..]);

        let mut cont_payload = [0u8; 48];
        cont_payload[..32].copy_from_slice(prev_fid.as_bytes());
        cont_payload[32..36].copy_from_slice(&prev_entry.seq.to_be_bytes());
        cont_payload[36..48].copy_from_slice(&proof);

        self.mk_generic_log(
            cont_fid,
            PacketType::IsContn,
            &cont_payload,
            cont_sign_fn,
            prev_fid,
            prev_entry.seq,
        )
    }

    /// Register (or clear) the append-completion callback for a feed.
    pub fn set_append_cb(&self, fid: &FeedId, cb: Option<Box<dyn FnMut(&[u8]) + Send>>) -> Result<()> {
        let mut logs = self.open_logs.lock().expect("store mutex poisoned");
        let log = logs.get_mut(fid).ok_or(StoreError::NotFound)?;
        log.set_append_cb(cb);
        Ok(())
    }

    /// Fire a feed's append callback with the now-complete entry content.
    pub fn fire_append_cb(&self, fid: &FeedId, content: &[u8]) -> Result<()> {
        let mut logs = self.open_logs.lock().expect("store mutex poisoned");
        let log = logs.get_mut(fid).ok_or(StoreError::NotFound)?;
        log.fire_append_cb(content);
        Ok(())
    }

    pub fn has_log(&self, fid: &FeedId) -> bool {
        self.open_logs
            .lock()
            .expect("store mutex poisoned")
            .contains_key(fid)
    }

    /// Append a raw wire packet to a known feed's log.
    pub fn append(
        &self,
        fid: &FeedId,
        buf: &[u8],
        verify_fn: impl Fn(&FeedId, &[u8; SIGNATURE_LEN], &[u8]) -> bool,
    ) -> Result<codec::Packet> {
        let mut logs = self.open_logs.lock().expect("store mutex poisoned");
        let log = logs.get_mut(fid).ok_or(StoreError::NotFound)?;
        log.append(buf, verify_fn)
    }

    /// Random read of a feed's packet at `seq`.
    pub fn read(&self, fid: &FeedId, seq: u32) -> Result<Option<codec::Packet>> {
        let mut logs = self.open_logs.lock().expect("store mutex poisoned");
        match logs.get_mut(fid) {
            Some(log) => log.read(seq),
            None => Ok(None),
        }
    }

    /// `(front_seq, front_mid)` of a known feed.
    pub fn front(&self, fid: &FeedId) -> Result<(u32, Mid)> {
        let mut logs = self.open_logs.lock().expect("store mutex poisoned");
        logs.get_mut(fid).map(|l| l.front()).ok_or(StoreError::NotFound)
    }

    pub fn delete_log(&self, fid: &FeedId) -> Result<()> {
        let mut logs = self.open_logs.lock().expect("store mutex poisoned");
        if let Some(handle) = logs.remove(fid) {
            fs::remove_file(handle.path())?;
        }
        Ok(())
    }

    pub fn add_blob(&self, data: &Blob) -> Result<Mid> {
        Ok(self.blobs.add_blob(data)?)
    }

    pub fn fetch_blob(&self, hash: &Mid) -> Result<Option<Blob>> {
        Ok(self.blobs.fetch_blob(hash)?)
    }

    /// Persist blobs first (crash safety), then the head packet, to a
    /// feed's log.
    pub fn persist_chain(
        &self,
        fid: &FeedId,
        head: &codec::Packet,
        blobs: &[Blob],
        verify_fn: impl Fn(&FeedId, &[u8; SIGNATURE_LEN], &[u8]) -> bool,
    ) -> Result<codec::Packet> {
        for blob in blobs {
            self.blobs.add_blob(blob)?;
        }
        self.append(fid, &head.wire, verify_fn)
    }

    /// Reassemble a `chain20` entry's content using only locally-stored
    /// blobs, convenience wrapper over [`chain::undo_chain`].
    pub fn undo_chain(&self, packet: &codec::Packet) -> Result<chain::ChainOutcome> {
        Ok(chain::undo_chain(packet, |h| {
            self.blobs.fetch_blob(h).ok().flatten()
        })?)
    }
}
