//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
///
/// Every section is optional in the file; defaults below are usable for a
/// dry run against mainnet. Secrets normally arrive via the environment
/// (`VOLBOT_WALLET__SECRET` or `WALLET_SECRET`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub jupiter: JupiterConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub ipcheck: IpCheckConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Ordered candidate endpoints, probed first to last
    #[serde(default = "default_rpc_endpoints")]
    pub endpoints: Vec<String>,
    /// Per-endpoint liveness probe timeout
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Request timeout for the selected endpoint
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retry hint passed to the node on sendTransaction
    #[serde(default = "default_max_send_retries")]
    pub max_send_retries: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoints: default_rpc_endpoints(),
            probe_timeout_ms: default_probe_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_send_retries: default_max_send_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JupiterConfig {
    #[serde(default = "default_jupiter_base_url")]
    pub base_url: String,
    #[serde(default = "default_jupiter_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    /// Let the aggregator wrap/unwrap SOL around the swap
    #[serde(default = "default_true")]
    pub wrap_and_unwrap_sol: bool,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            base_url: default_jupiter_base_url(),
            timeout_ms: default_jupiter_timeout_ms(),
            slippage_bps: default_slippage_bps(),
            wrap_and_unwrap_sol: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Single secret key: base58 string or JSON byte array.
    /// Usually injected via VOLBOT_WALLET__SECRET rather than the file.
    #[serde(default)]
    pub secret: String,
    /// File with one candidate secret per line
    #[serde(default)]
    pub keys_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// File with one mint address per line
    #[serde(default = "default_token_list")]
    pub list_file: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            list_file: default_token_list(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Probability of a BUY on each iteration (SELL otherwise)
    #[serde(default = "default_buy_probability")]
    pub buy_probability: f64,
    /// Optional mint preferred over the uniform token pick
    #[serde(default)]
    pub bias_token: String,
    /// Probability of substituting the bias token for the uniform pick
    #[serde(default)]
    pub bias_probability: f64,
    #[serde(default = "default_buy_fraction_min")]
    pub buy_fraction_min: f64,
    #[serde(default = "default_buy_fraction_max")]
    pub buy_fraction_max: f64,
    #[serde(default = "default_sell_fraction_min")]
    pub sell_fraction_min: f64,
    #[serde(default = "default_sell_fraction_max")]
    pub sell_fraction_max: f64,
    /// Lamports held back on every buy to cover fees and rent
    #[serde(default = "default_fee_buffer_lamports")]
    pub fee_buffer_lamports: u64,
    /// Smallest spend worth quoting; below this the iteration is skipped
    #[serde(default = "default_min_trade_lamports")]
    pub min_trade_lamports: u64,
    #[serde(default = "default_interval_min_secs")]
    pub interval_min_secs: u64,
    #[serde(default = "default_interval_max_secs")]
    pub interval_max_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            buy_probability: default_buy_probability(),
            bias_token: String::new(),
            bias_probability: 0.0,
            buy_fraction_min: default_buy_fraction_min(),
            buy_fraction_max: default_buy_fraction_max(),
            sell_fraction_min: default_sell_fraction_min(),
            sell_fraction_max: default_sell_fraction_max(),
            fee_buffer_lamports: default_fee_buffer_lamports(),
            min_trade_lamports: default_min_trade_lamports(),
            interval_min_secs: default_interval_min_secs(),
            interval_max_secs: default_interval_max_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_rebroadcast_interval_ms")]
    pub rebroadcast_interval_ms: u64,
    /// Total time allowed for a signature to reach a terminal status
    #[serde(default = "default_confirmation_budget_ms")]
    pub budget_ms: u64,
    #[serde(default = "default_true")]
    pub skip_preflight: bool,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            rebroadcast_interval_ms: default_rebroadcast_interval_ms(),
            budget_ms: default_confirmation_budget_ms(),
            skip_preflight: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpCheckConfig {
    /// Where the last consensus IP is persisted
    #[serde(default = "default_ip_state_file")]
    pub state_file: String,
    /// Per-echo-service timeout
    #[serde(default = "default_ipcheck_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for IpCheckConfig {
    fn default() -> Self {
        Self {
            state_file: default_ip_state_file(),
            timeout_ms: default_ipcheck_timeout_ms(),
        }
    }
}

// Default value functions
fn default_rpc_endpoints() -> Vec<String> {
    vec!["https://api.mainnet-beta.solana.com".into()]
}

fn default_probe_timeout_ms() -> u64 {
    7000
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_max_send_retries() -> usize {
    3
}

fn default_jupiter_base_url() -> String {
    "https://quote-api.jup.ag/v6".into()
}

fn default_jupiter_timeout_ms() -> u64 {
    10000
}

fn default_slippage_bps() -> u32 {
    100
}

fn default_token_list() -> String {
    "tokens.txt".into()
}

fn default_buy_probability() -> f64 {
    0.5
}

fn default_buy_fraction_min() -> f64 {
    0.05
}

fn default_buy_fraction_max() -> f64 {
    0.20
}

fn default_sell_fraction_min() -> f64 {
    0.10
}

fn default_sell_fraction_max() -> f64 {
    0.40
}

fn default_fee_buffer_lamports() -> u64 {
    5_000_000
}

fn default_min_trade_lamports() -> u64 {
    100_000
}

fn default_interval_min_secs() -> u64 {
    15
}

fn default_interval_max_secs() -> u64 {
    45
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_rebroadcast_interval_ms() -> u64 {
    5000
}

fn default_confirmation_budget_ms() -> u64 {
    75_000
}

fn default_ip_state_file() -> String {
    "last_ip.txt".into()
}

fn default_ipcheck_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix VOLBOT_)
            .add_source(
                config::Environment::with_prefix("VOLBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.rpc.endpoints.iter().all(|e| e.trim().is_empty()) {
            anyhow::bail!("rpc.endpoints must contain at least one URL");
        }

        if self.jupiter.slippage_bps > 10000 {
            anyhow::bail!("slippage_bps cannot exceed 10000 (100%)");
        }

        if !(0.0..=1.0).contains(&self.trading.buy_probability) {
            anyhow::bail!("buy_probability must be between 0 and 1");
        }

        if !(0.0..=1.0).contains(&self.trading.bias_probability) {
            anyhow::bail!("bias_probability must be between 0 and 1");
        }

        if self.trading.bias_probability > 0.0 && self.trading.bias_token.trim().is_empty() {
            anyhow::bail!("bias_probability set but bias_token is empty");
        }

        validate_fraction_range(
            "buy_fraction",
            self.trading.buy_fraction_min,
            self.trading.buy_fraction_max,
        )?;
        validate_fraction_range(
            "sell_fraction",
            self.trading.sell_fraction_min,
            self.trading.sell_fraction_max,
        )?;

        if self.trading.interval_min_secs > self.trading.interval_max_secs {
            anyhow::bail!("interval_min_secs exceeds interval_max_secs");
        }

        if self.confirmation.budget_ms < self.confirmation.poll_interval_ms {
            anyhow::bail!("confirmation budget_ms is smaller than poll_interval_ms");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoints: {:?}
    probe_timeout: {}ms
  Jupiter:
    base_url: {}
    slippage: {}bps
    wrap_and_unwrap_sol: {}
  Wallet:
    secret: {}
    keys_file: {}
  Tokens:
    list_file: {}
  Trading:
    buy_probability: {}
    bias: {} (p={})
    buy_fraction: {}..{}
    sell_fraction: {}..{}
    fee_buffer: {} lamports
    interval: {}..{}s
  Confirmation:
    poll: {}ms, rebroadcast: {}ms, budget: {}ms
"#,
            self.rpc
                .endpoints
                .iter()
                .map(|e| mask_url(e))
                .collect::<Vec<_>>(),
            self.rpc.probe_timeout_ms,
            self.jupiter.base_url,
            self.jupiter.slippage_bps,
            self.jupiter.wrap_and_unwrap_sol,
            if self.wallet.secret.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.wallet.keys_file,
            self.tokens.list_file,
            self.trading.buy_probability,
            if self.trading.bias_token.is_empty() {
                "(none)"
            } else {
                &self.trading.bias_token
            },
            self.trading.bias_probability,
            self.trading.buy_fraction_min,
            self.trading.buy_fraction_max,
            self.trading.sell_fraction_min,
            self.trading.sell_fraction_max,
            self.trading.fee_buffer_lamports,
            self.trading.interval_min_secs,
            self.trading.interval_max_secs,
            self.confirmation.poll_interval_ms,
            self.confirmation.rebroadcast_interval_ms,
            self.confirmation.budget_ms,
        )
    }
}

fn validate_fraction_range(name: &str, min: f64, max: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) {
        anyhow::bail!("{name} bounds must be between 0 and 1");
    }
    if min > max {
        anyhow::bail!("{name}_min exceeds {name}_max");
    }
    Ok(())
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.jupiter.slippage_bps, 100);
        assert_eq!(config.trading.buy_probability, 0.5);
        assert_eq!(config.confirmation.budget_ms, 75_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = Config::load("/nonexistent/config.toml").unwrap();
        assert_eq!(config.rpc.probe_timeout_ms, 7000);
        assert_eq!(config.trading.interval_min_secs, 15);
    }

    #[test]
    fn test_bias_requires_token() {
        let mut config = Config::default();
        config.trading.bias_probability = 0.3;
        assert!(config.validate().is_err());

        config.trading.bias_token = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fraction_bounds_rejected() {
        let mut config = Config::default();
        config.trading.buy_fraction_min = 0.5;
        config.trading.buy_fraction_max = 0.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.trading.sell_fraction_max = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://mainnet.helius-rpc.com/?api-key=secret"),
            "https://mainnet.helius-rpc.com/?***"
        );
        assert_eq!(
            mask_url("https://api.mainnet-beta.solana.com"),
            "https://api.mainnet-beta.solana.com"
        );
    }
}
