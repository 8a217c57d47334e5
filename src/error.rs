//! Error types for the volume bot

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the volume bot
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("No valid wallet secrets in {0}")]
    NoValidWallets(String),

    #[error("No valid token mints in {0}")]
    EmptyTokenList(String),

    #[error("Invalid mint address: {0}")]
    InvalidMint(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("No live RPC endpoint among {0} candidates")]
    NoLiveEndpoint(usize),

    // Aggregator API errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Aggregator API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unusable quote: {0}")]
    BadQuote(String),

    #[error("Swap API returned no transaction: {0}")]
    MissingSwapTransaction(String),

    // Trading errors
    #[error("Transaction signing failed: {0}")]
    TransactionSign(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Transaction failed on chain: {0}")]
    TransactionFailed(String),

    #[error("Confirmation timed out after {0}ms")]
    ConfirmationTimeout(u64),

    #[error("Insufficient balance: {available} lamports available, {required} required")]
    InsufficientBalance { available: u64, required: u64 },

    // Proxy/IP utility errors
    #[error("IP check failed: {0}")]
    IpCheck(String),

    // Serialization errors
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::Http(_) | Error::TransactionSend(_)
        )
    }

    /// Check if this error should skip the current loop iteration
    /// rather than abort the trading loop
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. }
                | Error::BadQuote(_)
                | Error::Api { .. }
                | Error::Http(_)
                | Error::Rpc(_)
                | Error::TransactionSend(_)
                | Error::TransactionFailed(_)
                | Error::ConfirmationTimeout(_)
                | Error::MissingSwapTransaction(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Deserialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skippable_errors_keep_loop_alive() {
        assert!(Error::InsufficientBalance {
            available: 100,
            required: 200
        }
        .is_skippable());
        assert!(Error::ConfirmationTimeout(75_000).is_skippable());
        assert!(!Error::Config("missing file".into()).is_skippable());
        assert!(!Error::NoValidWallets("wallets.txt".into()).is_skippable());
    }

    #[test]
    fn test_retryable() {
        assert!(Error::TransactionSend("blockhash expired".into()).is_retryable());
        assert!(!Error::BadQuote("outAmount = 0".into()).is_retryable());
    }
}
