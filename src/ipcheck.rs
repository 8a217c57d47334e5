//! Proxy verification via consensus public IP
//!
//! Asks several independent IP-echo services for our apparent address,
//! all through the configured proxy, and takes a majority vote. The result
//! is compared against the previously recorded IP so a rotation schedule
//! can be verified from cron: exit code 0 means the IP changed, 1 means it
//! did not, 2 means no service answered usably.

use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, Proxy};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::IpCheckConfig;
use crate::error::{Error, Result};

/// Independent echo services; each gets its own timeout and failures are
/// tolerated as long as a majority remains.
const ECHO_SERVICES: [&str; 5] = [
    "https://api.ipify.org",
    "https://icanhazip.com",
    "https://ifconfig.me/ip",
    "https://checkip.amazonaws.com",
    "https://ipinfo.io/ip",
];

/// Result of one verification round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpCheckOutcome {
    /// Consensus IP differs from the recorded one
    Changed { previous: Option<IpAddr>, current: IpAddr },
    /// Consensus IP equals the recorded one
    Unchanged(IpAddr),
    /// No usable responses, no consensus
    NoConsensus,
}

impl IpCheckOutcome {
    /// Process exit code for the check-ip command
    pub fn exit_code(&self) -> i32 {
        match self {
            IpCheckOutcome::Changed { .. } => 0,
            IpCheckOutcome::Unchanged(_) => 1,
            IpCheckOutcome::NoConsensus => 2,
        }
    }
}

/// Run a full verification round through the given proxy.
pub async fn verify_proxy(proxy_url: &str, config: &IpCheckConfig) -> Result<IpCheckOutcome> {
    // Validate the proxy URL up front so a typo fails loudly, not as five
    // identical connect errors.
    url::Url::parse(proxy_url)
        .map_err(|e| Error::IpCheck(format!("invalid proxy URL: {}", e)))?;

    let client = Client::builder()
        .proxy(Proxy::all(proxy_url).map_err(|e| Error::IpCheck(e.to_string()))?)
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()
        .map_err(|e| Error::IpCheck(e.to_string()))?;

    let mut observed = Vec::new();
    for service in ECHO_SERVICES {
        match fetch_ip(&client, service).await {
            Ok(ip) => {
                debug!("{} reports {}", service, ip);
                observed.push(ip);
            }
            Err(e) => warn!("{} failed: {}", service, e),
        }
    }

    let consensus = match consensus_ip(&observed) {
        Some(ip) => ip,
        None => {
            warn!("No consensus IP from {} responses", observed.len());
            return Ok(IpCheckOutcome::NoConsensus);
        }
    };

    let previous = read_recorded_ip(&config.state_file);
    record_ip(&config.state_file, &consensus)?;

    let outcome = match previous {
        Some(prev) if prev == consensus => {
            info!("Proxy IP unchanged: {}", consensus);
            IpCheckOutcome::Unchanged(consensus)
        }
        prev => {
            info!(
                "Proxy IP changed: {} -> {}",
                prev.map(|p| p.to_string()).unwrap_or_else(|| "(none)".into()),
                consensus
            );
            IpCheckOutcome::Changed {
                previous: prev,
                current: consensus,
            }
        }
    };

    Ok(outcome)
}

/// Query one echo service and normalize its answer to an IP address.
async fn fetch_ip(client: &Client, service: &str) -> Result<IpAddr> {
    let body = client
        .get(service)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| Error::Http(e.to_string()))?
        .text()
        .await?;

    parse_ip_body(&body)
        .ok_or_else(|| Error::IpCheck(format!("unparseable response from {}", service)))
}

/// Accepts plain-text bodies and the common JSON shapes
/// (`{"ip": ...}` / `{"origin": ...}`).
fn parse_ip_body(body: &str) -> Option<IpAddr> {
    let body = body.trim();
    if body.starts_with('{') {
        let json: Value = serde_json::from_str(body).ok()?;
        let field = json
            .get("ip")
            .or_else(|| json.get("origin"))
            .and_then(Value::as_str)?;
        return IpAddr::from_str(field.trim()).ok();
    }
    IpAddr::from_str(body).ok()
}

/// Majority vote over the successful responses. Ties go to the IP observed
/// first, which keeps the result stable across runs.
fn consensus_ip(observed: &[IpAddr]) -> Option<IpAddr> {
    let mut best: Option<(IpAddr, usize)> = None;
    for (idx, ip) in observed.iter().enumerate() {
        // Count only the first occurrence of each distinct IP
        if observed[..idx].contains(ip) {
            continue;
        }
        let count = observed.iter().filter(|o| *o == ip).count();
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((*ip, count)),
        }
    }
    best.map(|(ip, _)| ip)
}

/// Read the previously recorded IP, ignoring the timestamp comment.
fn read_recorded_ip<P: AsRef<Path>>(path: P) -> Option<IpAddr> {
    let content = std::fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .and_then(|l| IpAddr::from_str(l).ok())
}

/// Overwrite the state file with the new consensus IP.
fn record_ip<P: AsRef<Path>>(path: P, ip: &IpAddr) -> Result<()> {
    let content = format!("# recorded {}\n{}\n", chrono::Utc::now().to_rfc3339(), ip);
    std::fs::write(path.as_ref(), content)
        .map_err(|e| Error::IpCheck(format!("cannot write state file: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    #[test]
    fn test_majority_consensus() {
        let observed = vec![
            ip("1.2.3.4"),
            ip("5.6.7.8"),
            ip("1.2.3.4"),
            ip("9.9.9.9"),
            ip("1.2.3.4"),
        ];
        assert_eq!(consensus_ip(&observed), Some(ip("1.2.3.4")));
    }

    #[test]
    fn test_consensus_tie_goes_to_first_observed() {
        let observed = vec![ip("1.1.1.1"), ip("2.2.2.2"), ip("2.2.2.2"), ip("1.1.1.1")];
        assert_eq!(consensus_ip(&observed), Some(ip("1.1.1.1")));
    }

    #[test]
    fn test_consensus_empty() {
        assert_eq!(consensus_ip(&[]), None);
    }

    #[test]
    fn test_parse_ip_bodies() {
        assert_eq!(parse_ip_body("1.2.3.4\n"), Some(ip("1.2.3.4")));
        assert_eq!(parse_ip_body("  2606:4700::1111 "), Some(ip("2606:4700::1111")));
        assert_eq!(parse_ip_body(r#"{"ip": "9.8.7.6"}"#), Some(ip("9.8.7.6")));
        assert_eq!(parse_ip_body(r#"{"origin": "4.3.2.1"}"#), Some(ip("4.3.2.1")));
        assert_eq!(parse_ip_body("<html>nope</html>"), None);
        assert_eq!(parse_ip_body(""), None);
    }

    #[test]
    fn test_state_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_ip.txt");

        assert_eq!(read_recorded_ip(&path), None);

        record_ip(&path, &ip("10.0.0.1")).unwrap();
        assert_eq!(read_recorded_ip(&path), Some(ip("10.0.0.1")));

        // Always overwritten with the newest consensus
        record_ip(&path, &ip("10.0.0.2")).unwrap();
        assert_eq!(read_recorded_ip(&path), Some(ip("10.0.0.2")));
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(
            IpCheckOutcome::Changed {
                previous: None,
                current: ip("1.2.3.4")
            }
            .exit_code(),
            0
        );
        assert_eq!(IpCheckOutcome::Unchanged(ip("1.2.3.4")).exit_code(), 1);
        assert_eq!(IpCheckOutcome::NoConsensus.exit_code(), 2);
    }
}
