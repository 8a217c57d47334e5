//! RPC endpoint selection
//!
//! Probes an ordered list of candidate endpoints and hands back a client for
//! the first one that answers a liveness check in time. One pass, no retries
//! across the list: a dead endpoint gets a warning and we move on.

use std::future::Future;
use std::time::Duration;

use solana_client::nonblocking::rpc_client::RpcClient;
use tracing::{debug, info, warn};

use crate::config::RpcConfig;
use crate::error::{Error, Result};

/// Environment variables that expand into extra candidate endpoints.
/// Empty or unset keys are filtered out.
const HELIUS_API_KEY_ENV: &str = "HELIUS_API_KEY";
const EXTRA_RPC_URL_ENV: &str = "RPC_URL";

/// Build the ordered candidate list: configured URLs first, then endpoints
/// derived from optional API-key environment variables.
pub fn candidate_endpoints(config: &RpcConfig) -> Vec<String> {
    let mut candidates: Vec<String> = config
        .endpoints
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    if let Ok(url) = std::env::var(EXTRA_RPC_URL_ENV) {
        if !url.trim().is_empty() {
            candidates.push(url.trim().to_string());
        }
    }

    if let Ok(key) = std::env::var(HELIUS_API_KEY_ENV) {
        if !key.trim().is_empty() {
            candidates.push(format!(
                "https://mainnet.helius-rpc.com/?api-key={}",
                key.trim()
            ));
        }
    }

    candidates
}

/// Select the first live endpoint from the candidate list.
///
/// Returns a client bound to the winning URL with the configured request
/// timeout. Fails terminally when no candidate responds.
pub async fn select_endpoint(config: &RpcConfig) -> Result<RpcClient> {
    let candidates = candidate_endpoints(config);
    let probe_timeout = Duration::from_millis(config.probe_timeout_ms);

    let url = first_live(&candidates, |url| async move {
        probe(&url, probe_timeout).await
    })
    .await?;

    info!("Selected RPC endpoint: {}", mask(&url));
    Ok(RpcClient::new_with_timeout(
        url,
        Duration::from_millis(config.request_timeout_ms),
    ))
}

/// Probe every candidate and report which are live. Used by `health`.
pub async fn probe_all(config: &RpcConfig) -> Vec<(String, bool)> {
    let probe_timeout = Duration::from_millis(config.probe_timeout_ms);
    let mut results = Vec::new();
    for url in candidate_endpoints(config) {
        let live = probe(&url, probe_timeout).await;
        results.push((url, live));
    }
    results
}

/// Run the given liveness check against each URL in order and return the
/// first that passes.
async fn first_live<F, Fut>(candidates: &[String], mut check: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = bool>,
{
    for url in candidates {
        debug!("Probing RPC endpoint: {}", mask(url));
        if check(url.clone()).await {
            return Ok(url.clone());
        }
        warn!("RPC endpoint not responding: {}", mask(url));
    }
    Err(Error::NoLiveEndpoint(candidates.len()))
}

/// Liveness check: getVersion is the cheapest request that proves the node
/// parses JSON-RPC and answers within the timeout.
async fn probe(url: &str, timeout: Duration) -> bool {
    let client = RpcClient::new_with_timeout(url.to_string(), timeout);
    matches!(
        tokio::time::timeout(timeout, client.get_version()).await,
        Ok(Ok(_))
    )
}

/// Hide API keys in query strings when logging endpoint URLs
fn mask(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_first_live_probes_in_order() {
        let urls: Vec<String> = (1..=7).map(|i| format!("https://rpc{}.example", i)).collect();
        let probed = Arc::new(Mutex::new(Vec::new()));

        let probed_clone = probed.clone();
        let selected = first_live(&urls, move |url| {
            let probed = probed_clone.clone();
            async move {
                probed.lock().unwrap().push(url.clone());
                // Only the 5th endpoint is live
                url.ends_with("rpc5.example")
            }
        })
        .await
        .unwrap();

        assert_eq!(selected, "https://rpc5.example");
        let probed = probed.lock().unwrap();
        assert_eq!(
            *probed,
            vec![
                "https://rpc1.example",
                "https://rpc2.example",
                "https://rpc3.example",
                "https://rpc4.example",
                "https://rpc5.example"
            ]
        );
    }

    #[tokio::test]
    async fn test_first_live_exhausted_is_terminal() {
        let urls: Vec<String> = (1..=3).map(|i| format!("https://rpc{}.example", i)).collect();
        let attempts = AtomicUsize::new(0);

        let err = first_live(&urls, |_url| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await
        .unwrap_err();

        // Single pass only: each candidate probed exactly once
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(matches!(err, Error::NoLiveEndpoint(3)));
    }

    #[test]
    fn test_candidate_endpoints_filters_blanks() {
        let config = RpcConfig {
            endpoints: vec![
                "https://a.example".into(),
                "   ".into(),
                "https://b.example".into(),
            ],
            probe_timeout_ms: 7000,
            request_timeout_ms: 30000,
            max_send_retries: 3,
        };
        let candidates = candidate_endpoints(&config);
        assert!(candidates.contains(&"https://a.example".to_string()));
        assert!(candidates.contains(&"https://b.example".to_string()));
        assert!(!candidates.iter().any(|c| c.trim().is_empty()));
    }

    #[test]
    fn test_mask_strips_query() {
        assert_eq!(
            mask("https://mainnet.helius-rpc.com/?api-key=abc"),
            "https://mainnet.helius-rpc.com/"
        );
        assert_eq!(mask("https://rpc.example"), "https://rpc.example");
    }
}
