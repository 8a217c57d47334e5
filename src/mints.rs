//! Well-known mint addresses and unit conversions
//!
//! Wrapped SOL is the input side of every buy and the output side of every
//! sell, so its mint shows up all over the trading paths.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Wrapped SOL mint (the native mint of the SPL token program)
pub const WSOL_MINT_STR: &str = "So11111111111111111111111111111111111111112";

/// USDC mint address
pub const USDC_MINT_STR: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

lazy_static::lazy_static! {
    /// Wrapped SOL mint as Pubkey. Must match spl-token's native mint.
    pub static ref WSOL_MINT: Pubkey = spl_token::native_mint::ID;

    /// USDC mint as Pubkey
    pub static ref USDC_MINT: Pubkey =
        Pubkey::from_str(USDC_MINT_STR).expect("Invalid USDC mint");
}

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Convert SOL to lamports, saturating at zero for negative input
pub fn sol_to_lamports(sol: f64) -> u64 {
    if sol <= 0.0 {
        return 0;
    }
    (sol * LAMPORTS_PER_SOL as f64) as u64
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Convert a UI token amount to raw atoms given the mint's decimals
pub fn ui_amount_to_atoms(amount: f64, decimals: u8) -> u64 {
    if amount <= 0.0 {
        return 0;
    }
    (amount * 10f64.powi(decimals as i32)) as u64
}
