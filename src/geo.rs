//! IP geolocation for lead provenance and login logs.
//!
//! Wraps the ip-api.com JSON endpoint with a 24h cache and a circuit
//! breaker. Lookups never fail the surrounding request: private/loopback
//! addresses resolve to `Local`, every error path resolves to `Unknown`.

use failsafe::futures::CircuitBreaker;
use failsafe::{backoff, failure_policy, StateMachine};
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

type GeoBreaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates the circuit breaker guarding the geolocation API.
///
/// 5 consecutive failures open the circuit; exponential backoff from 10s to
/// 60s before recovery attempts. While open, lookups fail fast and resolve
/// to `Unknown` instead of queueing on a dead upstream.
fn create_geo_circuit_breaker() -> GeoBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    failsafe::Config::new()
        .failure_policy(failure_policy)
        .build()
}

/// Resolved country for an IP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryInfo {
    pub country: String,
    pub country_code: String,
}

impl CountryInfo {
    fn local() -> Self {
        Self {
            country: "Local".to_string(),
            country_code: "LOC".to_string(),
        }
    }

    fn unknown() -> Self {
        Self {
            country: "Unknown".to_string(),
            country_code: "UNK".to_string(),
        }
    }
}

/// Wire format of the ip-api.com JSON endpoint.
#[derive(Debug, Deserialize)]
struct GeoApiResponse {
    status: Option<String>,
    country: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

pub struct GeoService {
    client: Client,
    base_url: String,
    cache: Cache<String, CountryInfo>,
    breaker: GeoBreaker,
}

impl GeoService {
    pub fn new(base_url: String) -> Self {
        // 24 hour TTL: a given IP's country does not move
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(86400))
            .max_capacity(50_000)
            .build();

        Self {
            client: Client::new(),
            base_url,
            cache,
            breaker: create_geo_circuit_breaker(),
        }
    }

    /// Resolve the country for an IP address. Infallible: local/private
    /// ranges short-circuit without a network call, and every failure path
    /// degrades to `Unknown`.
    pub async fn lookup(&self, ip: &str) -> CountryInfo {
        if ip.is_empty() || is_private_ip(ip) {
            return CountryInfo::local();
        }

        if let Some(cached) = self.cache.get(ip).await {
            tracing::debug!("Geo cache HIT for {}", ip);
            return cached;
        }

        match self.breaker.call(self.fetch(ip)).await {
            Ok(info) => {
                self.cache.insert(ip.to_string(), info.clone()).await;
                info
            }
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Geo lookup circuit open, skipping lookup for {}", ip);
                CountryInfo::unknown()
            }
            Err(failsafe::Error::Inner(e)) => {
                tracing::warn!("Geo lookup failed for {}: {}", ip, e);
                CountryInfo::unknown()
            }
        }
    }

    async fn fetch(&self, ip: &str) -> Result<CountryInfo, reqwest::Error> {
        let url = format!("{}/json/{}", self.base_url, ip);
        tracing::debug!("Geo lookup: {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: GeoApiResponse = response.json().await?;

        // ip-api reports reserved/unroutable addresses with status "fail"
        if body.status.as_deref() != Some("success") {
            tracing::debug!("Geo API returned non-success status for {}", ip);
            return Ok(CountryInfo::unknown());
        }

        Ok(CountryInfo {
            country: body.country.unwrap_or_else(|| "Unknown".to_string()),
            country_code: body.country_code.unwrap_or_else(|| "UNK".to_string()),
        })
    }
}

/// Loopback and RFC1918-style ranges seen in development traffic.
fn is_private_ip(ip: &str) -> bool {
    ip == "127.0.0.1"
        || ip == "::1"
        || ip.starts_with("192.168.")
        || ip.starts_with("10.")
        || ip.starts_with("172.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_ip_detection() {
        assert!(is_private_ip("127.0.0.1"));
        assert!(is_private_ip("::1"));
        assert!(is_private_ip("192.168.0.14"));
        assert!(is_private_ip("10.1.2.3"));
        assert!(is_private_ip("172.16.0.1"));
        assert!(!is_private_ip("8.8.8.8"));
    }

    #[tokio::test]
    async fn test_local_ips_short_circuit() {
        // Unroutable base URL: a network call here would fail the test
        let geo = GeoService::new("http://127.0.0.1:1".to_string());

        let info = geo.lookup("127.0.0.1").await;
        assert_eq!(info.country, "Local");
        assert_eq!(info.country_code, "LOC");

        let info = geo.lookup("").await;
        assert_eq!(info.country, "Local");
    }

    #[tokio::test]
    async fn test_unreachable_api_degrades_to_unknown() {
        let geo = GeoService::new("http://127.0.0.1:1".to_string());

        let info = geo.lookup("8.8.8.8").await;
        assert_eq!(info.country, "Unknown");
        assert_eq!(info.country_code, "UNK");
    }
}
