//! Jupiter aggregator API client
//!
//! Two calls per swap: GET /quote for the route, POST /swap for a prebuilt
//! unsigned transaction. The v6 quote endpoint answers either with a bare
//! quote object or with `{"data": [...]}` depending on deployment, so both
//! shapes are handled.
//!
//! Rate limits apply - don't spam requests

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::config::JupiterConfig;
use crate::error::{Error, Result};

/// Jupiter token list, used as an advisory tradability pre-check
const TOKEN_LIST_URL: &str = "https://token.jup.ag/all";

/// How much of an error body to carry into error messages
const BODY_SNIPPET_LEN: usize = 300;

/// Swap mode for quote requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapMode {
    ExactIn,
    ExactOut,
}

impl SwapMode {
    fn as_str(&self) -> &'static str {
        match self {
            SwapMode::ExactIn => "ExactIn",
            SwapMode::ExactOut => "ExactOut",
        }
    }
}

/// Parameters for a quote request
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Raw units of the fixed side (lamports or token atoms)
    pub amount: u64,
    pub slippage_bps: u32,
    pub swap_mode: SwapMode,
}

/// A usable quote: validated amounts plus the raw record the swap endpoint
/// wants echoed back verbatim.
#[derive(Debug, Clone)]
pub struct Quote {
    pub in_amount: u64,
    pub out_amount: u64,
    raw: Value,
}

#[derive(Debug, Deserialize)]
struct TokenListEntry {
    address: String,
    trades: Option<i64>,
    #[serde(default)]
    extensions: Value,
}

/// Jupiter API client
pub struct JupiterClient {
    client: Client,
    base_url: String,
    wrap_and_unwrap_sol: bool,
}

impl JupiterClient {
    pub fn new(config: &JupiterConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            wrap_and_unwrap_sol: config.wrap_and_unwrap_sol,
        }
    }

    /// Fetch a quote for the requested swap.
    ///
    /// Fails on non-success HTTP status, on an empty route list, and on any
    /// quote whose output amount is non-positive - a worthless quote must
    /// never travel further down the pipeline.
    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let url = format!("{}/quote", self.base_url);
        debug!(
            "Requesting quote: {} -> {} amount={} mode={}",
            request.input_mint,
            request.output_mint,
            request.amount,
            request.swap_mode.as_str()
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", request.input_mint.to_string()),
                ("outputMint", request.output_mint.to_string()),
                ("amount", request.amount.to_string()),
                ("slippageBps", request.slippage_bps.to_string()),
                ("swapMode", request.swap_mode.as_str().to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let json: Value = serde_json::from_str(&body)?;
        parse_quote(json, request.amount)
    }

    /// Exchange an accepted quote for a base64-encoded unsigned transaction.
    pub async fn swap_transaction(&self, quote: &Quote, user_pubkey: &Pubkey) -> Result<String> {
        let url = format!("{}/swap", self.base_url);
        let payload = serde_json::json!({
            "quoteResponse": quote.raw,
            "userPublicKey": user_pubkey.to_string(),
            "wrapAndUnwrapSol": self.wrap_and_unwrap_sol,
        });

        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let json: Value = serde_json::from_str(&body)?;
        match json.get("swapTransaction").and_then(Value::as_str) {
            Some(tx) if !tx.is_empty() => Ok(tx.to_string()),
            _ => Err(Error::MissingSwapTransaction(snippet(&body))),
        }
    }

    /// Fetch the set of mints Jupiter marks as tradable.
    ///
    /// Advisory only: callers treat a download failure as a warning and
    /// proceed without the check, matching long-standing behavior.
    pub async fn tradable_tokens(&self) -> Result<HashSet<String>> {
        let entries: Vec<TokenListEntry> = self
            .client
            .get(TOKEN_LIST_URL)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Http(e.to_string()))?
            .json()
            .await?;

        let tradable: HashSet<String> = entries
            .into_iter()
            .filter(|t| t.trades != Some(0) || t.extensions.get("coingeckoId").is_some())
            .map(|t| t.address)
            .collect();

        info!("Jupiter token list: {} tradable mints", tradable.len());
        Ok(tradable)
    }

    /// Advisory tradability check; never blocks a swap on its own failure.
    pub async fn warn_if_untradable(&self, mints: &[Pubkey]) {
        match self.tradable_tokens().await {
            Ok(tradable) => {
                for mint in mints {
                    if !tradable.contains(&mint.to_string()) {
                        warn!("Mint {} is not marked tradable in the Jupiter token list", mint);
                    }
                }
            }
            Err(e) => warn!("Could not download Jupiter token list ({}), continuing without tradability check", e),
        }
    }
}

/// Pick the first route record out of the quote response and validate it.
///
/// Accepts all three response shapes: a bare quote object, `{"data": [...]}`,
/// and a top-level array.
fn parse_quote(json: Value, requested_amount: u64) -> Result<Quote> {
    let record = match &json {
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(routes)) => routes.first().cloned(),
            Some(_) | None => {
                if map.contains_key("outAmount") {
                    Some(json.clone())
                } else {
                    None
                }
            }
        },
        Value::Array(routes) => routes.first().cloned(),
        _ => None,
    };

    let record = match record {
        Some(r) => r,
        None => {
            // Surface the pair's minimum size when the API reports one
            if let Some(min_in) = json
                .get("minInAmount")
                .or_else(|| json.get("minIn"))
                .and_then(amount_field)
            {
                if min_in > requested_amount {
                    return Err(Error::BadQuote(format!(
                        "no route: amount below pair minimum (minInAmount = {})",
                        min_in
                    )));
                }
            }
            return Err(Error::BadQuote(format!(
                "no route in response: {}",
                snippet(&json.to_string())
            )));
        }
    };

    let out_amount = record
        .get("outAmount")
        .and_then(amount_field)
        .ok_or_else(|| Error::BadQuote("outAmount missing or not a positive integer".into()))?;
    if out_amount == 0 {
        return Err(Error::BadQuote("outAmount is zero".into()));
    }

    let in_amount = record
        .get("inAmount")
        .and_then(amount_field)
        .unwrap_or(requested_amount);

    Ok(Quote {
        in_amount,
        out_amount,
        raw: record,
    })
}

/// Amounts arrive as decimal strings or bare numbers depending on API
/// revision. Rejects negatives, non-finite floats, and non-numeric strings.
fn amount_field(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u)
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            }
        }
        _ => None,
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_quote_object() {
        let json = json!({
            "inAmount": "1000000",
            "outAmount": "987654",
            "routePlan": []
        });
        let quote = parse_quote(json, 1_000_000).unwrap();
        assert_eq!(quote.in_amount, 1_000_000);
        assert_eq!(quote.out_amount, 987_654);
    }

    #[test]
    fn test_parse_data_array_shape() {
        let json = json!({
            "data": [
                {"inAmount": "500", "outAmount": 42},
                {"inAmount": "500", "outAmount": 41}
            ]
        });
        let quote = parse_quote(json, 500).unwrap();
        // First record wins
        assert_eq!(quote.out_amount, 42);
    }

    #[test]
    fn test_parse_top_level_array() {
        let json = json!([{"outAmount": "7"}]);
        assert_eq!(parse_quote(json, 10).unwrap().out_amount, 7);
    }

    #[test]
    fn test_zero_out_amount_rejected() {
        let json = json!({"outAmount": "0", "inAmount": "100"});
        assert!(matches!(
            parse_quote(json, 100),
            Err(Error::BadQuote(_))
        ));
    }

    #[test]
    fn test_negative_and_nonfinite_rejected() {
        assert!(parse_quote(json!({"outAmount": "-5"}), 100).is_err());
        assert!(parse_quote(json!({"outAmount": "NaN"}), 100).is_err());
        assert!(parse_quote(json!({"outAmount": {}}), 100).is_err());
    }

    #[test]
    fn test_empty_routes_reports_min_in_amount() {
        let json = json!({"data": [], "minInAmount": 250000});
        let err = parse_quote(json, 1000).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("minInAmount = 250000"), "got: {}", msg);
    }

    #[test]
    fn test_empty_routes_without_min_is_plain_error() {
        let json = json!({"data": []});
        assert!(matches!(
            parse_quote(json, 1000),
            Err(Error::BadQuote(_))
        ));
    }

    #[test]
    fn test_amount_field_shapes() {
        assert_eq!(amount_field(&json!("123")), Some(123));
        assert_eq!(amount_field(&json!(123)), Some(123));
        assert_eq!(amount_field(&json!(1.5)), Some(1));
        assert_eq!(amount_field(&json!("abc")), None);
        assert_eq!(amount_field(&json!(-3)), None);
        assert_eq!(amount_field(&json!(null)), None);
    }

    #[test]
    fn test_swap_mode_wire_names() {
        assert_eq!(SwapMode::ExactIn.as_str(), "ExactIn");
        assert_eq!(SwapMode::ExactOut.as_str(), "ExactOut");
    }
}
