//! Load-or-generate the node's own signing key (§4.H). The core never sees
//! the raw key material, only the sign/verify capability closures built
//! from it.

use std::path::Path;

use tinyssb_crypto::ed25519::KeyPair;

/// Read the 32-byte secret key at `path`, or generate and persist a fresh
/// one if no file exists there yet.
pub fn load_or_generate(path: &Path) -> anyhow::Result<KeyPair> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        let bytes = std::fs::read(path)?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("signing key file {} is not 32 bytes", path.display()))?;
        Ok(KeyPair::from_bytes(&secret))
    } else {
        let keypair = KeyPair::generate();
        std::fs::write(path, keypair.to_bytes())?;
        Ok(keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_and_reloads_identical_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("identity.key");

        let first = load_or_generate(&path).expect("generate");
        let second = load_or_generate(&path).expect("reload");

        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn test_rejects_truncated_key_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("identity.key");
        std::fs::write(&path, [1, 2, 3]).expect("write");

        assert!(load_or_generate(&path).is_err());
    }
}
