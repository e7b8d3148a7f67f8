//! Content-addressed blob store for chain20 sidechains (§4.B, §4.C).
//!
//! Grounded on `repository.py`'s `fetch_blob`/`_blobpath` sharding
//! (`_blob/<first-byte-hex>/<rest-hex>`).

use std::fs;
use std::path::{Path, PathBuf};

use tinyssb_types::Mid;

use crate::Result;

/// A flat, content-addressed store of 120-byte blob segments, sharded two
/// hex digits deep to keep any one directory small.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join("_blob"))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn path_for(&self, hash: &Mid) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join("_blob").join(&hex[..2]).join(&hex[2..])
    }

    /// Store a 120-byte blob segment under its own `sha256[:20]` hash.
    /// Idempotent: writing the same content twice is a no-op the second
    /// time.
    pub fn add_blob(&self, data: &[u8; 120]) -> Result<Mid> {
        let hash = tinyssb_crypto::hashing::mid20(data);
        let path = self.path_for(&hash);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, data)?;
        }
        Ok(hash)
    }

    pub fn fetch_blob(&self, hash: &Mid) -> Result<Option<[u8; 120]>> {
        let path = self.path_for(hash);
        match fs::read(&path) {
            Ok(bytes) if bytes.len() == 120 => {
                let mut buf = [0u8; 120];
                buf.copy_from_slice(&bytes);
                Ok(Some(buf))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn has_blob(&self, hash: &Mid) -> bool {
        self.path_for(hash).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_fetch_roundtrips() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = BlobStore::open(dir.path()).expect("open");
        let data = [7u8; 120];
        let hash = store.add_blob(&data).expect("add");
        let fetched = store.fetch_blob(&hash).expect("fetch").expect("present");
        assert_eq!(fetched, data);
    }

    #[test]
    fn test_missing_blob_is_none() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = BlobStore::open(dir.path()).expect("open");
        assert_eq!(store.fetch_blob(&Mid::ZERO).expect("fetch"), None);
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let store = BlobStore::open(dir.path()).expect("open");
        let data = [3u8; 120];
        let h1 = store.add_blob(&data).expect("add1");
        let h2 = store.add_blob(&data).expect("add2");
        assert_eq!(h1, h2);
        assert!(store.has_blob(&h1));
    }
}
