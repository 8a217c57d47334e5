//! Swap transaction signing, broadcast, and confirmation
//!
//! The aggregator returns a fully built, unsigned transaction. We only
//! re-sign the message and shepherd it onto the chain: bounded submission
//! retries, then a polling loop that re-broadcasts the same signed bytes
//! every few seconds until the signature reaches a terminal status or the
//! budget runs out.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionConfirmationStatus;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::ConfirmationConfig;
use crate::error::{Error, Result};

/// Submission attempts before giving up on sendTransaction
const SEND_ATTEMPTS: u32 = 3;

/// Fixed delay between submission attempts
const SEND_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Maximum serialized transaction size accepted by the network
const MAX_TX_WIRE_BYTES: usize = 1232;

/// Decode a base64 unsigned transaction and sign it with the wallet.
pub fn sign_swap_transaction(tx_base64: &str, wallet: &Keypair) -> Result<VersionedTransaction> {
    let bytes = BASE64
        .decode(tx_base64.trim())
        .map_err(|e| Error::Deserialization(format!("bad base64 transaction: {}", e)))?;

    let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
        .map_err(|e| Error::Deserialization(format!("bad transaction bytes: {}", e)))?;

    VersionedTransaction::try_new(unsigned.message, &[wallet])
        .map_err(|e| Error::TransactionSign(e.to_string()))
}

/// Broadcasts signed transactions and waits for a terminal status
pub struct Submitter {
    rpc: Arc<RpcClient>,
    config: ConfirmationConfig,
    max_send_retries: usize,
}

impl Submitter {
    pub fn new(rpc: Arc<RpcClient>, config: ConfirmationConfig, max_send_retries: usize) -> Self {
        Self {
            rpc,
            config,
            max_send_retries,
        }
    }

    /// Submit a signed transaction and poll until confirmed, failed, or
    /// timed out. Unresolved signatures are re-broadcast periodically to
    /// improve landing odds under congestion.
    pub async fn submit_and_confirm(&self, tx: &VersionedTransaction) -> Result<Signature> {
        let wire = bincode::serialize(tx)
            .map_err(|e| Error::Deserialization(format!("serialize failed: {}", e)))?;
        if wire.len() > MAX_TX_WIRE_BYTES {
            return Err(Error::TransactionSend(format!(
                "transaction is {} bytes, over the {} byte wire limit",
                wire.len(),
                MAX_TX_WIRE_BYTES
            )));
        }
        debug!("Submitting {} byte transaction", wire.len());

        let signature = self.send_with_retries(tx).await?;
        info!("Sent transaction: {}", signature);

        self.confirm(tx, &signature).await?;
        info!(
            "Confirmed: https://explorer.solana.com/tx/{}",
            signature
        );
        Ok(signature)
    }

    async fn send_with_retries(&self, tx: &VersionedTransaction) -> Result<Signature> {
        let mut attempt = 0;
        loop {
            match self
                .rpc
                .send_transaction_with_config(tx, self.send_config())
                .await
            {
                Ok(sig) => return Ok(sig),
                Err(e) => {
                    attempt += 1;
                    if attempt >= SEND_ATTEMPTS {
                        return Err(Error::TransactionSend(e.to_string()));
                    }
                    warn!("sendTransaction attempt {} failed: {}", attempt, e);
                    sleep(SEND_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Poll the signature status once per poll interval inside the budget.
    ///
    /// A status carrying an error fails immediately. Re-broadcast errors are
    /// the one class of error this module swallows.
    async fn confirm(&self, tx: &VersionedTransaction, signature: &Signature) -> Result<()> {
        let budget = Duration::from_millis(self.config.budget_ms);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let rebroadcast_interval = Duration::from_millis(self.config.rebroadcast_interval_ms);

        let deadline = Instant::now() + budget;
        let mut last_rebroadcast = Instant::now();

        loop {
            if Instant::now() >= deadline {
                return Err(Error::ConfirmationTimeout(self.config.budget_ms));
            }

            match self.rpc.get_signature_statuses(&[*signature]).await {
                Ok(response) => {
                    if let Some(Some(status)) = response.value.first() {
                        if let Some(err) = &status.err {
                            return Err(Error::TransactionFailed(err.to_string()));
                        }
                        if matches!(
                            status.confirmation_status,
                            Some(TransactionConfirmationStatus::Confirmed)
                                | Some(TransactionConfirmationStatus::Finalized)
                        ) {
                            return Ok(());
                        }
                    }
                }
                // Status polls ride out transient RPC errors; the budget
                // still bounds the wait.
                Err(e) => warn!("Status poll failed: {}", e),
            }

            if last_rebroadcast.elapsed() >= rebroadcast_interval {
                if let Err(e) = self
                    .rpc
                    .send_transaction_with_config(tx, self.send_config())
                    .await
                {
                    debug!("Re-broadcast ignored error: {}", e);
                }
                last_rebroadcast = Instant::now();
            }

            sleep(poll_interval).await;
        }
    }

    fn send_config(&self) -> RpcSendTransactionConfig {
        RpcSendTransactionConfig {
            skip_preflight: self.config.skip_preflight,
            max_retries: Some(self.max_send_retries),
            ..Default::default()
        }
    }
}
