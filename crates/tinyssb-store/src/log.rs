//! Per-feed append-only log file (§4.C).
//!
//! Grounded on `repository.py`'s `LOG` class: a 120-byte header block
//! followed by 120-byte packet blocks at sequence numbers
//! `anchor_seq+1 ..= front_seq`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tinyssb_packet::{codec, Packet};
use tinyssb_types::{FeedId, Mid, PACKET_LEN};

use crate::header::LogHeader;
use crate::{Result, StoreError};

/// An open per-feed log file: header + verified packet blocks.
pub struct LogHandle {
    path: PathBuf,
    file: File,
    header: LogHeader,
    append_cb: Option<Box<dyn FnMut(&[u8]) + Send>>,
}

impl LogHandle {
    /// Allocate a brand-new log file with the given header fields and,
    /// optionally, a validated genesis packet at `anchor_seq + 1`.
    pub fn create(
        path: &Path,
        fid: FeedId,
        anchor_seq: u32,
        anchor_mid: Mid,
        parent_fid: FeedId,
        parent_seq: u32,
        genesis: Option<&[u8]>,
        verify_fn: impl FnOnce(&FeedId, &[u8; 64], &[u8]) -> bool,
    ) -> Result<Self> {
        if path.exists() {
            return Err(StoreError::AlreadyExists);
        }

        let (front_seq, front_mid, genesis_pkt) = match genesis {
            None => (anchor_seq, anchor_mid, None),
            Some(buf) => {
                let pkt = codec::decode(buf, &fid, anchor_seq + 1, &anchor_mid, verify_fn)?;
                (pkt.seq, pkt.mid, Some(pkt))
            }
        };

        let header = LogHeader {
            fid,
            parent_fid,
            parent_seq,
            anchor_seq,
            anchor_mid,
            front_seq,
            front_mid,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&header.to_bytes())?;
        if let Some(pkt) = &genesis_pkt {
            file.write_all(&pkt.wire)?;
        }
        file.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            append_cb: None,
        })
    }

    /// Open an already-allocated log file.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut buf = [0u8; PACKET_LEN];
        file.read_exact(&mut buf)?;
        let header = LogHeader::from_bytes(&buf)?;

        let expected_len =
            PACKET_LEN as u64 * (1 + (header.front_seq - header.anchor_seq) as u64);
        let actual_len = file.metadata()?.len();
        if actual_len != expected_len {
            return Err(StoreError::HeaderCorrupt);
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            append_cb: None,
        })
    }

    pub fn fid(&self) -> FeedId {
        self.header.fid
    }

    pub fn parent(&self) -> (FeedId, u32) {
        (self.header.parent_fid, self.header.parent_seq)
    }

    pub fn anchor(&self) -> (u32, Mid) {
        (self.header.anchor_seq, self.header.anchor_mid)
    }

    /// `(front_seq, front_mid)` — the sequence and MID of the last stored entry.
    pub fn front(&self) -> (u32, Mid) {
        (self.header.front_seq, self.header.front_mid)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_append_cb(&mut self, cb: Option<Box<dyn FnMut(&[u8]) + Send>>) {
        self.append_cb = cb;
    }

    /// Invoke the registered append callback with the entry's complete
    /// content, if one is registered. The engine calls this once it has
    /// determined that the entry (plain48 immediately, chain20 after its
    /// last blob) is complete.
    pub fn fire_append_cb(&mut self, content: &[u8]) {
        if let Some(cb) = self.append_cb.as_mut() {
            cb(content);
        }
    }

    /// Decode, verify, and append a 120-byte wire packet. Rejects (without
    /// modifying the file) if decode/verification fails.
    pub fn append(
        &mut self,
        buf: &[u8],
        verify_fn: impl FnOnce(&FeedId, &[u8; 64], &[u8]) -> bool,
    ) -> Result<Packet> {
        let expected_seq = self.header.front_seq + 1;
        let pkt = codec::decode(
            buf,
            &self.header.fid,
            expected_seq,
            &self.header.front_mid,
            verify_fn,
        )?;

        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&pkt.wire)?;

        self.header.front_seq = pkt.seq;
        self.header.front_mid = pkt.mid;
        self.file.seek(SeekFrom::Start(LogHeader::FRONT_OFFSET))?;
        self.file.write_all(&self.header.front_seq.to_be_bytes())?;
        self.file.write_all(self.header.front_mid.as_ref())?;
        self.file.flush()?;

        Ok(pkt)
    }

    /// Random read of the packet stored at `seq`. The `prev_mid` fed into
    /// decoding is `anchor_mid` for the first stored entry, else the
    /// all-zero sentinel (per-entry MIDs are not persisted; the chain link
    /// was only verified once, at insert time).
    pub fn read(&mut self, seq: u32) -> Result<Option<Packet>> {
        if seq <= self.header.anchor_seq || seq > self.header.front_seq {
            return Ok(None);
        }
        let pos = PACKET_LEN as u64 * (seq - self.header.anchor_seq) as u64;
        self.file.seek(SeekFrom::Start(pos))?;
        let mut buf = [0u8; PACKET_LEN];
        self.file.read_exact(&mut buf)?;

        let prev_mid = if seq == self.header.anchor_seq + 1 {
            self.header.anchor_mid
        } else {
            Mid::ZERO
        };
        let pkt = codec::decode_unchecked(&buf, &self.header.fid, seq, &prev_mid)?;
        Ok(Some(pkt))
    }

    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyssb_crypto::ed25519::KeyPair;
    use tinyssb_packet::encode_plain;

    fn verify(kp: &KeyPair) -> impl Fn(&FeedId, &[u8; 64], &[u8]) -> bool + '_ {
        move |_fid, sig, msg| {
            kp.verifying_key
                .verify(msg, &tinyssb_crypto::ed25519::Signature::from_bytes(sig))
                .is_ok()
        }
    }

    #[test]
    fn test_lone_publisher_scenario() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let kp = KeyPair::generate();
        let fid = FeedId(kp.verifying_key.to_bytes());
        let anchor_mid = Mid::from_slice(&fid.as_bytes()[..20]).expect("20 bytes");

        let path = dir.path().join("feed.log");
        let mut log = LogHandle::create(
            &path,
            fid,
            0,
            anchor_mid,
            FeedId::ZERO,
            0,
            None,
            |_, _, _| true,
        )
        .expect("create");

        for payload in [&b"hi"[..], b"how", b"are"] {
            let (front_seq, front_mid) = log.front();
            let pkt = encode_plain(&fid, front_seq + 1, &front_mid, payload, |msg| {
                kp.signing_key.sign(msg).to_bytes()
            })
            .expect("encode");
            log.append(&pkt.wire, verify(&kp)).expect("append");
        }

        assert_eq!(log.front().0, 3);
        let e1 = log.read(1).expect("read").expect("present");
        assert_eq!(&e1.payload[..2], b"hi");
        let e2 = log.read(2).expect("read").expect("present");
        assert_eq!(e2.prev_mid, Mid::ZERO); // not re-verified, per spec note
        assert_eq!(
            log.file_size().expect("size"),
            (PACKET_LEN * 4) as u64
        );
    }

    #[test]
    fn test_append_rejects_bad_signature_without_modifying_file() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let kp = KeyPair::generate();
        let fid = FeedId(kp.verifying_key.to_bytes());
        let anchor_mid = Mid::from_slice(&fid.as_bytes()[..20]).expect("20 bytes");
        let path = dir.path().join("feed.log");
        let mut log = LogHandle::create(
            &path,
            fid,
            0,
            anchor_mid,
            FeedId::ZERO,
            0,
            None,
            |_, _, _| true,
        )
        .expect("create");

        let pkt = encode_plain(&fid, 1, &anchor_mid, b"x", |msg| {
            kp.signing_key.sign(msg).to_bytes()
        })
        .expect("encode");
        let before = log.file_size().expect("size");
        let err = log.append(&pkt.wire, |_, _, _| false).unwrap_err();
        assert!(matches!(err, StoreError::Packet(_)));
        assert_eq!(log.file_size().expect("size"), before);
    }

    #[test]
    fn test_reopen_reads_back_header_and_front() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let kp = KeyPair::generate();
        let fid = FeedId(kp.verifying_key.to_bytes());
        let anchor_mid = Mid::from_slice(&fid.as_bytes()[..20]).expect("20 bytes");
        let path = dir.path().join("feed.log");
        {
            let mut log = LogHandle::create(
                &path,
                fid,
                0,
                anchor_mid,
                FeedId::ZERO,
                0,
                None,
                |_, _, _| true,
            )
            .expect("create");
            let pkt = encode_plain(&fid, 1, &anchor_mid, b"x", |msg| {
                kp.signing_key.sign(msg).to_bytes()
            })
            .expect("encode");
            log.append(&pkt.wire, verify(&kp)).expect("append");
        }

        let reopened = LogHandle::open(&path).expect("reopen");
        assert_eq!(reopened.front().0, 1);
    }
}
