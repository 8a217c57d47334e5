//! Randomized trading loop
//!
//! Each iteration picks a wallet, a token, and a direction, sizes the trade
//! from the live balance, runs the swap, and sleeps a random interval. Trade
//! failures are logged and the loop moves on; only configuration-class
//! errors abort it. The loop has no terminal state of its own.

use std::sync::Arc;
use std::time::Duration;

use rand::prelude::*;
use rand::rngs::StdRng;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::TradingConfig;
use crate::error::{Error, Result};
use crate::jupiter::{JupiterClient, Quote, QuoteRequest, SwapMode};
use crate::mints::{lamports_to_sol, WSOL_MINT};
use crate::trading::balance;
use crate::trading::submitter::{sign_swap_transaction, Submitter};

/// Direction of a single trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// The randomized trading loop
pub struct Trader {
    rpc: Arc<RpcClient>,
    jupiter: JupiterClient,
    submitter: Submitter,
    wallets: Vec<Keypair>,
    tokens: Vec<Pubkey>,
    bias_token: Option<Pubkey>,
    config: TradingConfig,
    slippage_bps: u32,
    rng: StdRng,
    dry_run: bool,
}

impl Trader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rpc: Arc<RpcClient>,
        jupiter: JupiterClient,
        submitter: Submitter,
        wallets: Vec<Keypair>,
        mut tokens: Vec<Pubkey>,
        config: TradingConfig,
        slippage_bps: u32,
        dry_run: bool,
    ) -> Result<Self> {
        // Wrapped SOL is the quote side of every swap; trading it against
        // itself is meaningless.
        let before = tokens.len();
        tokens.retain(|m| m != &*WSOL_MINT);
        if tokens.len() < before {
            warn!("Removed wrapped SOL from the token rotation");
        }
        if tokens.is_empty() {
            return Err(Error::Config("token list is empty after filtering".into()));
        }
        if wallets.is_empty() {
            return Err(Error::Config("no wallets to trade with".into()));
        }

        let bias_token = if config.bias_token.trim().is_empty() {
            None
        } else {
            Some(
                config
                    .bias_token
                    .trim()
                    .parse::<Pubkey>()
                    .map_err(|e| Error::InvalidMint(format!("bias_token: {}", e)))?,
            )
        };

        Ok(Self {
            rpc,
            jupiter,
            submitter,
            wallets,
            tokens,
            bias_token,
            config,
            slippage_bps,
            rng: StdRng::from_entropy(),
            dry_run,
        })
    }

    /// Reset the RNG with a fixed seed so a run can be replayed
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Run the trading loop forever. Returns only on a fatal error;
    /// otherwise the process is stopped externally.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Trading loop starting: {} wallet(s), {} token(s), buy_probability={}{}",
            self.wallets.len(),
            self.tokens.len(),
            self.config.buy_probability,
            if self.dry_run { " [DRY-RUN]" } else { "" }
        );

        self.jupiter.warn_if_untradable(&self.tokens).await;

        loop {
            match self.iteration().await {
                Ok(Some(sig)) => info!("Trade landed: {}", sig),
                Ok(None) => {}
                Err(e) if e.is_skippable() => warn!("Trade failed, continuing: {}", e),
                Err(e) => return Err(e),
            }

            let pause = sleep_interval(
                &mut self.rng,
                self.config.interval_min_secs,
                self.config.interval_max_secs,
            );
            debug!("Sleeping {:.1}s", pause.as_secs_f64());
            sleep(pause).await;
        }
    }

    /// One loop iteration: pick, size, swap.
    async fn iteration(&mut self) -> Result<Option<Signature>> {
        let wallet_idx = self.rng.gen_range(0..self.wallets.len());
        let token = pick_token(
            &mut self.rng,
            &self.tokens,
            self.bias_token.as_ref(),
            self.config.bias_probability,
        );
        let direction = pick_direction(&mut self.rng, self.config.buy_probability);

        debug!(
            "Iteration: wallet #{} {:?} {}",
            wallet_idx, direction, token
        );

        match direction {
            TradeDirection::Buy => self.execute_buy(wallet_idx, token).await,
            TradeDirection::Sell => self.execute_sell(wallet_idx, token).await,
        }
    }

    async fn execute_buy(&mut self, wallet_idx: usize, mint: Pubkey) -> Result<Option<Signature>> {
        let owner = self.wallets[wallet_idx].pubkey();
        let lamports = balance::native_balance(&self.rpc, &owner).await?;

        let amount = match buy_size(
            &mut self.rng,
            lamports,
            self.config.fee_buffer_lamports,
            self.config.min_trade_lamports,
            self.config.buy_fraction_min,
            self.config.buy_fraction_max,
        ) {
            Some(a) => a,
            None => {
                info!(
                    "Skipping buy: wallet {} has {:.4} SOL, not enough past the fee buffer",
                    owner,
                    lamports_to_sol(lamports)
                );
                return Ok(None);
            }
        };

        info!(
            "BUY {:.4} SOL -> {} from wallet {}",
            lamports_to_sol(amount),
            mint,
            owner
        );

        let quote = self
            .jupiter
            .quote(&QuoteRequest {
                input_mint: *WSOL_MINT,
                output_mint: mint,
                amount,
                slippage_bps: self.slippage_bps,
                swap_mode: SwapMode::ExactIn,
            })
            .await?;

        self.settle(wallet_idx, &quote).await
    }

    async fn execute_sell(&mut self, wallet_idx: usize, mint: Pubkey) -> Result<Option<Signature>> {
        let owner = self.wallets[wallet_idx].pubkey();
        let holding = balance::token_balance(&self.rpc, &owner, &mint).await?;

        let amount = match sell_size(
            &mut self.rng,
            holding,
            self.config.sell_fraction_min,
            self.config.sell_fraction_max,
        ) {
            Some(a) => a,
            None => {
                info!("Skipping sell: wallet {} holds no {}", owner, mint);
                return Ok(None);
            }
        };

        info!("SELL {} atoms of {} from wallet {}", amount, mint, owner);

        let quote = self
            .jupiter
            .quote(&QuoteRequest {
                input_mint: mint,
                output_mint: *WSOL_MINT,
                amount,
                slippage_bps: self.slippage_bps,
                swap_mode: SwapMode::ExactIn,
            })
            .await?;

        self.settle(wallet_idx, &quote).await
    }

    /// Turn an accepted quote into a signed, confirmed transaction.
    async fn settle(&self, wallet_idx: usize, quote: &Quote) -> Result<Option<Signature>> {
        let wallet = &self.wallets[wallet_idx];

        if self.dry_run {
            info!(
                "[DRY-RUN] Quote accepted: in={} out={}, not sending",
                quote.in_amount, quote.out_amount
            );
            return Ok(None);
        }

        let tx_b64 = self
            .jupiter
            .swap_transaction(quote, &wallet.pubkey())
            .await?;
        let signed = sign_swap_transaction(&tx_b64, wallet)?;
        let signature = self.submitter.submit_and_confirm(&signed).await?;
        Ok(Some(signature))
    }
}

/// Weighted coin flip for the trade direction
pub fn pick_direction(rng: &mut impl Rng, buy_probability: f64) -> TradeDirection {
    if rng.gen_bool(buy_probability.clamp(0.0, 1.0)) {
        TradeDirection::Buy
    } else {
        TradeDirection::Sell
    }
}

/// Uniform token pick, with a fixed probability of preferring the
/// designated bias token instead.
pub fn pick_token(
    rng: &mut impl Rng,
    tokens: &[Pubkey],
    bias: Option<&Pubkey>,
    bias_probability: f64,
) -> Pubkey {
    if let Some(bias) = bias {
        if bias_probability > 0.0 && rng.gen_bool(bias_probability.clamp(0.0, 1.0)) {
            return *bias;
        }
    }
    *tokens.choose(rng).expect("token list is never empty")
}

/// Size a buy: a random fraction of the balance left after the fee buffer.
/// Returns None when the spendable remainder is below the dust floor.
pub fn buy_size(
    rng: &mut impl Rng,
    balance_lamports: u64,
    fee_buffer_lamports: u64,
    min_trade_lamports: u64,
    fraction_min: f64,
    fraction_max: f64,
) -> Option<u64> {
    let spendable = balance_lamports.saturating_sub(fee_buffer_lamports);
    if spendable < min_trade_lamports.max(1) {
        return None;
    }
    let fraction = rng.gen_range(fraction_min..=fraction_max);
    let amount = (spendable as f64 * fraction) as u64;
    (amount > 0).then_some(amount)
}

/// Size a sell: a random fraction of the holding. None when there is
/// nothing to sell.
pub fn sell_size(
    rng: &mut impl Rng,
    holding_atoms: u64,
    fraction_min: f64,
    fraction_max: f64,
) -> Option<u64> {
    if holding_atoms == 0 {
        return None;
    }
    let fraction = rng.gen_range(fraction_min..=fraction_max);
    let amount = (holding_atoms as f64 * fraction) as u64;
    (amount > 0).then_some(amount)
}

/// Uniform random pause between iterations
pub fn sleep_interval(rng: &mut impl Rng, min_secs: u64, max_secs: u64) -> Duration {
    Duration::from_secs(rng.gen_range(min_secs..=max_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_buy_size_respects_fee_buffer_and_bounds() {
        let mut rng = rng();
        let balance = 1_000_000_000; // 1 SOL
        let buffer = 5_000_000;
        let spendable = balance - buffer;

        for _ in 0..200 {
            let amount = buy_size(&mut rng, balance, buffer, 100_000, 0.05, 0.20).unwrap();
            assert!(amount >= (spendable as f64 * 0.05) as u64);
            assert!(amount <= (spendable as f64 * 0.20) as u64);
        }
    }

    #[test]
    fn test_buy_size_skips_when_below_buffer() {
        let mut rng = rng();
        // Balance entirely eaten by the fee buffer
        assert_eq!(buy_size(&mut rng, 4_000_000, 5_000_000, 100_000, 0.05, 0.2), None);
        // Spendable but under the dust floor
        assert_eq!(buy_size(&mut rng, 5_050_000, 5_000_000, 100_000, 0.05, 0.2), None);
    }

    #[test]
    fn test_sell_size_bounds() {
        let mut rng = rng();
        let holding = 10_000_000u64;
        for _ in 0..200 {
            let amount = sell_size(&mut rng, holding, 0.10, 0.40).unwrap();
            assert!(amount >= 1_000_000);
            assert!(amount <= 4_000_000);
        }
    }

    #[test]
    fn test_sell_size_zero_holding_skips() {
        let mut rng = rng();
        assert_eq!(sell_size(&mut rng, 0, 0.1, 0.4), None);
    }

    #[test]
    fn test_direction_bias() {
        let mut rng = rng();
        let mut buys = 0;
        let iterations = 2000;
        for _ in 0..iterations {
            if pick_direction(&mut rng, 0.7) == TradeDirection::Buy {
                buys += 1;
            }
        }
        let buy_rate = buys as f64 / iterations as f64;
        assert!(buy_rate > 0.65 && buy_rate < 0.75, "buy_rate = {}", buy_rate);
    }

    #[test]
    fn test_direction_extremes() {
        let mut rng = rng();
        for _ in 0..50 {
            assert_eq!(pick_direction(&mut rng, 1.0), TradeDirection::Buy);
            assert_eq!(pick_direction(&mut rng, 0.0), TradeDirection::Sell);
        }
    }

    #[test]
    fn test_token_bias_probability() {
        let mut rng = rng();
        let tokens: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
        let bias = Pubkey::new_unique();

        let mut biased = 0;
        let iterations = 2000;
        for _ in 0..iterations {
            if pick_token(&mut rng, &tokens, Some(&bias), 0.25) == bias {
                biased += 1;
            }
        }
        // The bias token is not in the uniform pool, so its rate is exactly
        // the bias probability (within sampling noise).
        let rate = biased as f64 / iterations as f64;
        assert!(rate > 0.20 && rate < 0.30, "rate = {}", rate);
    }

    #[test]
    fn test_token_pick_without_bias_is_uniform_over_list() {
        let mut rng = rng();
        let tokens: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
        for _ in 0..100 {
            let picked = pick_token(&mut rng, &tokens, None, 0.0);
            assert!(tokens.contains(&picked));
        }
    }

    #[test]
    fn test_sleep_interval_range() {
        let mut rng = rng();
        for _ in 0..200 {
            let pause = sleep_interval(&mut rng, 15, 45);
            assert!(pause.as_secs() >= 15);
            assert!(pause.as_secs() <= 45);
        }
    }
}
