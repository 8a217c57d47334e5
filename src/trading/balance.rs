//! Balance lookups
//!
//! Native SOL comes straight from getBalance. Token holdings are summed
//! across every token account the wallet owns for the mint, since wallets
//! routinely end up with more than one account per mint.

use solana_account_decoder::UiAccountData;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::pubkey::Pubkey;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Wallet's native balance in lamports
pub async fn native_balance(rpc: &RpcClient, owner: &Pubkey) -> Result<u64> {
    let lamports = rpc.get_balance(owner).await?;
    debug!("Balance of {}: {} lamports", owner, lamports);
    Ok(lamports)
}

/// Wallet's total holding of a mint in raw atoms, summed across all of the
/// owner's token accounts for that mint.
pub async fn token_balance(rpc: &RpcClient, owner: &Pubkey, mint: &Pubkey) -> Result<u64> {
    let accounts = rpc
        .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(*mint))
        .await?;

    let mut total: u64 = 0;
    for keyed in accounts {
        if let UiAccountData::Json(parsed) = keyed.account.data {
            if let Some(atoms) = parsed_token_amount(&parsed.parsed) {
                total = total.saturating_add(atoms);
            }
        }
    }

    debug!("Holding of {} for {}: {} atoms", mint, owner, total);
    Ok(total)
}

/// Decimals for a mint, read from the token supply record
pub async fn token_decimals(rpc: &RpcClient, mint: &Pubkey) -> Result<u8> {
    let supply = rpc.get_token_supply(mint).await?;
    Ok(supply.decimals)
}

/// Pull the raw amount out of a jsonParsed token account.
/// The amount field is a decimal string to survive JSON number limits.
fn parsed_token_amount(parsed: &Value) -> Option<u64> {
    parsed
        .get("info")?
        .get("tokenAmount")?
        .get("amount")?
        .as_str()?
        .parse::<u64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parsed_token_amount() {
        let parsed = json!({
            "info": {
                "mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                "tokenAmount": {
                    "amount": "123456789",
                    "decimals": 6,
                    "uiAmount": 123.456789
                }
            },
            "type": "account"
        });
        assert_eq!(parsed_token_amount(&parsed), Some(123_456_789));
    }

    #[test]
    fn test_parsed_token_amount_malformed() {
        assert_eq!(parsed_token_amount(&json!({})), None);
        assert_eq!(
            parsed_token_amount(&json!({"info": {"tokenAmount": {"amount": 5}}})),
            None
        );
        assert_eq!(
            parsed_token_amount(&json!({"info": {"tokenAmount": {"amount": "x"}}})),
            None
        );
    }
}
