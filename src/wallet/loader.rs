//! Keypair decoding
//!
//! Accepts the two secret-key encodings seen in the wild: a JSON array of
//! 64 raw bytes (what `solana-keygen` writes) and a base58 string (what
//! wallet UIs export).

use std::path::Path;

use solana_sdk::signature::Keypair;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Expected secret-key length in bytes (32-byte seed + 32-byte pubkey)
const SECRET_KEY_LEN: usize = 64;

/// Decode a keypair from a raw string.
///
/// The string is either a JSON array of integers (raw secret-key bytes) or a
/// base58-encoded secret. Leading/trailing whitespace is ignored.
pub fn keypair_from_str(raw: &str) -> Result<Keypair> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidKeypair("empty secret".into()));
    }

    let bytes: Vec<u8> = if raw.starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|e| Error::InvalidKeypair(format!("bad JSON byte array: {}", e)))?
    } else {
        bs58::decode(raw)
            .into_vec()
            .map_err(|e| Error::InvalidKeypair(format!("bad base58: {}", e)))?
    };

    if bytes.len() != SECRET_KEY_LEN {
        return Err(Error::InvalidKeypair(format!(
            "secret key must be {} bytes, got {}",
            SECRET_KEY_LEN,
            bytes.len()
        )));
    }

    Keypair::from_bytes(&bytes)
        .map_err(|e| Error::InvalidKeypair(format!("invalid key material: {}", e)))
}

/// Load all valid keypairs from a file, one candidate per line.
///
/// Blank lines and `#` comments are skipped. Each remaining line is decoded
/// independently; failures are logged by line number (never echoing the
/// secret itself) and dropped. Fails only when no valid key remains.
pub fn keypairs_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<Keypair>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let mut keypairs = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match keypair_from_str(line) {
            Ok(kp) => keypairs.push(kp),
            Err(e) => warn!(
                "Skipping wallet entry at {}:{}: {}",
                path.display(),
                idx + 1,
                e
            ),
        }
    }

    if keypairs.is_empty() {
        return Err(Error::NoValidWallets(path.display().to_string()));
    }

    info!("Loaded {} wallet(s) from {}", keypairs.len(), path.display());
    Ok(keypairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signer::Signer;
    use std::io::Write;

    fn sample_keypair() -> Keypair {
        Keypair::new()
    }

    #[test]
    fn test_base58_roundtrip() {
        let kp = sample_keypair();
        let encoded = bs58::encode(kp.to_bytes()).into_string();
        let decoded = keypair_from_str(&encoded).unwrap();
        assert_eq!(decoded.pubkey(), kp.pubkey());
    }

    #[test]
    fn test_json_array_roundtrip() {
        let kp = sample_keypair();
        let encoded = serde_json::to_string(&kp.to_bytes().to_vec()).unwrap();
        let decoded = keypair_from_str(&encoded).unwrap();
        assert_eq!(decoded.pubkey(), kp.pubkey());
    }

    #[test]
    fn test_whitespace_tolerated() {
        let kp = sample_keypair();
        let encoded = format!("  {}\n", bs58::encode(kp.to_bytes()).into_string());
        assert!(keypair_from_str(&encoded).is_ok());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(keypair_from_str("").is_err());
        assert!(keypair_from_str("not-base58-0OIl").is_err());
        assert!(keypair_from_str("[1,2,3]").is_err());
        // Valid base58 but wrong length
        assert!(keypair_from_str("abc").is_err());
    }

    #[test]
    fn test_file_drops_invalid_lines() {
        let kp1 = sample_keypair();
        let kp2 = sample_keypair();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# wallets").unwrap();
        writeln!(file, "{}", bs58::encode(kp1.to_bytes()).into_string()).unwrap();
        writeln!(file, "definitely-not-a-key").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", bs58::encode(kp2.to_bytes()).into_string()).unwrap();

        let loaded = keypairs_from_file(file.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].pubkey(), kp1.pubkey());
        assert_eq!(loaded[1].pubkey(), kp2.pubkey());
    }

    #[test]
    fn test_file_with_zero_valid_keys_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, "[1,2,3]").unwrap();

        assert!(matches!(
            keypairs_from_file(file.path()),
            Err(Error::NoValidWallets(_))
        ));
    }
}
