//! Persistence for `pending_chains` (§9 design notes): a small JSON file
//! mapping the next expected blob hash to the log entry it completes,
//! written with a write-replace-rename pattern for crash safety.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tinyssb_types::FeedId;
use tinyssb_types::Mid;

use crate::{EngineError, Result};

/// In-memory shape: `next_blob_hash -> (fid, seq, blob_index)` of the
/// `chain20` entry that blob continues.
pub type PendingChains = HashMap<Mid, (FeedId, u32, u32)>;

#[derive(Serialize, Deserialize, Default)]
struct PendingChainsFile(HashMap<String, (String, u32, u32)>);

/// Load `pending_chains.json` from `dir`, or an empty map if it doesn't
/// exist yet.
pub fn load(dir: &Path) -> Result<PendingChains> {
    let path = dir.join("pending_chains.json");
    if !path.exists() {
        return Ok(PendingChains::new());
    }
    let raw = fs::read_to_string(&path)?;
    let file: PendingChainsFile = serde_json::from_str(&raw)?;

    let mut out = PendingChains::new();
    for (hash_hex, (fid_hex, seq, idx)) in file.0 {
        let hash_bytes = hex::decode(&hash_hex).map_err(|_| EngineError::Corrupt)?;
        let hash = Mid::from_slice(&hash_bytes).ok_or(EngineError::Corrupt)?;
        let fid: FeedId = fid_hex.parse().map_err(|_| EngineError::Corrupt)?;
        out.insert(hash, (fid, seq, idx));
    }
    Ok(out)
}

/// Atomically persist `pending_chains.json` under `dir`
/// (`.part` file, then rename).
pub fn save(dir: &Path, chains: &PendingChains) -> Result<()> {
    let mut file = PendingChainsFile::default();
    for (hash, (fid, seq, idx)) in chains {
        file.0.insert(hash.to_hex(), (fid.to_hex(), *seq, *idx));
    }
    let serialized = serde_json::to_string(&file)?;

    let final_path = dir.join("pending_chains.json");
    let part_path = dir.join("pending_chains.json.part");
    fs::write(&part_path, serialized)?;
    fs::rename(&part_path, &final_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrips_through_disk() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let mut chains = PendingChains::new();
        let fid = FeedId([7u8; 32]);
        let hash = Mid([9u8; 20]);
        chains.insert(hash, (fid, 5, 2));

        save(dir.path(), &chains).expect("save");
        let loaded = load(dir.path()).expect("load");
        assert_eq!(loaded, chains);
    }

    #[test]
    fn test_missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let loaded = load(dir.path()).expect("load");
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let mut chains = PendingChains::new();
        chains.insert(Mid([1u8; 20]), (FeedId([1u8; 32]), 1, 0));
        save(dir.path(), &chains).expect("save1");

        chains.clear();
        chains.insert(Mid([2u8; 20]), (FeedId([2u8; 32]), 2, 1));
        save(dir.path(), &chains).expect("save2");

        let loaded = load(dir.path()).expect("load");
        assert_eq!(loaded, chains);
    }
}
