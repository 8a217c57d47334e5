//! Token list loading
//!
//! Token files are newline-delimited base58 mint addresses.

use std::path::Path;
use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Load the valid mint addresses from a flat file, one per line.
///
/// Lines are trimmed; blanks and `#` comments are skipped. A line that does
/// not parse as a well-formed address is dropped with a warning. Fails only
/// when the resulting valid set is empty.
pub fn load_token_list<P: AsRef<Path>>(path: P) -> Result<Vec<Pubkey>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let mut mints = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Pubkey::from_str(line) {
            Ok(mint) => mints.push(mint),
            Err(e) => warn!(
                "Skipping token entry at {}:{}: {} ({})",
                path.display(),
                idx + 1,
                line,
                e
            ),
        }
    }

    if mints.is_empty() {
        return Err(Error::EmptyTokenList(path.display().to_string()));
    }

    info!("Loaded {} token mint(s) from {}", mints.len(), path.display());
    Ok(mints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    const WSOL: &str = "So11111111111111111111111111111111111111112";

    #[test]
    fn test_invalid_lines_dropped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# tokens under rotation").unwrap();
        writeln!(file, "{}", USDC).unwrap();
        writeln!(file, "not-a-mint!!!").unwrap();
        writeln!(file, "  {}  ", WSOL).unwrap();
        writeln!(file).unwrap();

        let mints = load_token_list(file.path()).unwrap();
        assert_eq!(mints.len(), 2);
        assert_eq!(mints[0].to_string(), USDC);
        assert_eq!(mints[1].to_string(), WSOL);
    }

    #[test]
    fn test_empty_valid_set_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bogus").unwrap();
        writeln!(file, "# comment only").unwrap();

        assert!(matches!(
            load_token_list(file.path()),
            Err(Error::EmptyTokenList(_))
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            load_token_list("/nonexistent/tokens.txt"),
            Err(Error::Config(_))
        ));
    }
}
