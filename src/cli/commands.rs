//! CLI command implementations

use std::sync::Arc;

use anyhow::Result;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::ipcheck::{self, IpCheckOutcome};
use crate::jupiter::{JupiterClient, QuoteRequest, SwapMode};
use crate::mints::{sol_to_lamports, ui_amount_to_atoms, WSOL_MINT};
use crate::rpc;
use crate::trading::balance;
use crate::trading::submitter::{sign_swap_transaction, Submitter};
use crate::trading::{TradeDirection, Trader};
use crate::wallet::{keypair_from_str, keypairs_from_file, load_token_list};

/// Start the randomized trading loop
pub async fn run(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - quotes only, nothing is signed or sent");
    }

    let rpc_client = Arc::new(rpc::select_endpoint(&config.rpc).await?);
    let wallets = load_wallets(config)?;
    let tokens = load_token_list(&config.tokens.list_file)?;

    let jupiter = JupiterClient::new(&config.jupiter);
    let submitter = Submitter::new(
        rpc_client.clone(),
        config.confirmation.clone(),
        config.rpc.max_send_retries,
    );

    let trader = Trader::new(
        rpc_client,
        jupiter,
        submitter,
        wallets,
        tokens,
        config.trading.clone(),
        config.jupiter.slippage_bps,
        dry_run,
    )?;

    trader.run().await?;
    Ok(())
}

/// Execute a single swap with the primary wallet
pub async fn swap(
    config: &Config,
    direction: &str,
    mint: &str,
    amount: f64,
    dry_run: bool,
) -> Result<()> {
    let direction = match direction.to_ascii_lowercase().as_str() {
        "buy" => TradeDirection::Buy,
        "sell" => TradeDirection::Sell,
        other => anyhow::bail!("direction must be 'buy' or 'sell', got '{}'", other),
    };

    let mint: Pubkey = mint
        .parse()
        .map_err(|e| Error::InvalidMint(format!("{}: {}", mint, e)))?;
    if mint == *WSOL_MINT {
        anyhow::bail!("refusing to swap wrapped SOL against itself");
    }
    if amount <= 0.0 || !amount.is_finite() {
        anyhow::bail!("amount must be a positive number, got {}", amount);
    }

    let rpc_client = Arc::new(rpc::select_endpoint(&config.rpc).await?);
    let wallets = load_wallets(config)?;
    let wallet = &wallets[0];
    info!("Using wallet {}", wallet.pubkey());

    let jupiter = JupiterClient::new(&config.jupiter);

    // Amounts are given in UI units; the quote API wants raw units.
    let request = match direction {
        TradeDirection::Buy => QuoteRequest {
            input_mint: *WSOL_MINT,
            output_mint: mint,
            amount: sol_to_lamports(amount),
            slippage_bps: config.jupiter.slippage_bps,
            swap_mode: SwapMode::ExactIn,
        },
        TradeDirection::Sell => {
            let decimals = balance::token_decimals(&rpc_client, &mint).await?;
            QuoteRequest {
                input_mint: mint,
                output_mint: *WSOL_MINT,
                amount: ui_amount_to_atoms(amount, decimals),
                slippage_bps: config.jupiter.slippage_bps,
                swap_mode: SwapMode::ExactIn,
            }
        }
    };
    if request.amount == 0 {
        anyhow::bail!("amount {} converts to zero raw units", amount);
    }

    let quote = jupiter.quote(&request).await?;
    info!(
        "Quote: {} in -> {} out ({}bps slippage)",
        quote.in_amount, quote.out_amount, config.jupiter.slippage_bps
    );

    if dry_run {
        println!("[DRY-RUN] quote accepted, not sending");
        return Ok(());
    }

    let tx_b64 = jupiter.swap_transaction(&quote, &wallet.pubkey()).await?;
    let signed = sign_swap_transaction(&tx_b64, wallet)?;

    let submitter = Submitter::new(
        rpc_client,
        config.confirmation.clone(),
        config.rpc.max_send_retries,
    );
    let signature = submitter.submit_and_confirm(&signed).await?;
    println!("https://explorer.solana.com/tx/{}", signature);

    Ok(())
}

/// Verify proxy rotation by consensus public IP
pub async fn check_ip(
    config: &Config,
    proxy: Option<String>,
    state_file: Option<String>,
) -> Result<IpCheckOutcome> {
    let proxy_url = match proxy.or_else(|| std::env::var("PROXY_URL").ok()) {
        Some(url) if !url.trim().is_empty() => url,
        _ => return Err(Error::MissingEnvVar("PROXY_URL".into()).into()),
    };

    let mut ipcheck_config = config.ipcheck.clone();
    if let Some(path) = state_file {
        ipcheck_config.state_file = path;
    }

    let outcome = ipcheck::verify_proxy(&proxy_url, &ipcheck_config).await?;
    match &outcome {
        IpCheckOutcome::Changed { previous, current } => println!(
            "IP changed: {} -> {}",
            previous
                .map(|p| p.to_string())
                .unwrap_or_else(|| "(none)".into()),
            current
        ),
        IpCheckOutcome::Unchanged(ip) => println!("IP unchanged: {}", ip),
        IpCheckOutcome::NoConsensus => println!("No IP obtained"),
    }
    Ok(outcome)
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Probe every candidate RPC endpoint and the wallet configuration
pub async fn health(config: &Config) -> Result<()> {
    println!("RPC endpoints:");
    let results = rpc::probe_all(&config.rpc).await;
    let mut any_live = false;
    for (url, live) in &results {
        let shown = url.split('?').next().unwrap_or(url);
        println!("  {} ... {}", shown, if *live { "OK" } else { "FAILED" });
        any_live = any_live || *live;
    }

    print!("Wallets... ");
    match load_wallets(config) {
        Ok(wallets) => println!("OK ({} loaded)", wallets.len()),
        Err(e) => println!("FAILED: {}", e),
    }

    print!("Token list... ");
    match load_token_list(&config.tokens.list_file) {
        Ok(tokens) => println!("OK ({} mints)", tokens.len()),
        Err(e) => println!("FAILED: {}", e),
    }

    if !any_live {
        anyhow::bail!("no live RPC endpoint among {} candidates", results.len());
    }
    Ok(())
}

/// Resolve wallets from configuration: an inline secret wins, then the
/// multi-key file, then the WALLET_SECRET environment variable.
fn load_wallets(config: &Config) -> Result<Vec<Keypair>> {
    if !config.wallet.secret.trim().is_empty() {
        return Ok(vec![keypair_from_str(&config.wallet.secret)?]);
    }
    if !config.wallet.keys_file.trim().is_empty() {
        return Ok(keypairs_from_file(&config.wallet.keys_file)?);
    }
    if let Ok(secret) = std::env::var("WALLET_SECRET") {
        if !secret.trim().is_empty() {
            return Ok(vec![keypair_from_str(&secret)?]);
        }
    }
    Err(Error::Config(
        "no wallet configured: set wallet.secret, wallet.keys_file, or WALLET_SECRET".into(),
    )
    .into())
}
