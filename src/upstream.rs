// 🛰️ Upstream feeds - country registry + exchange-rate table
//
// Both payloads are decoded leniently: unknown fields are ignored and
// missing ones fall back to their defaults. Each fetch is bounded by the
// client timeout; a timeout, transport error, non-2xx status or undecodable
// body is an UpstreamUnavailable error and aborts the refresh.

use crate::error::{LedgerError, LedgerResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const REGISTRY_SOURCE: &str = "country registry";
pub const RATES_SOURCE: &str = "exchange rates";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyDescriptor {
    pub code: String,
    pub name: String,
    pub symbol: String,
}

/// One country as published by the registry feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryEntry {
    pub name: String,
    pub capital: Option<String>,
    pub region: String,
    pub population: u64,
    #[serde(rename = "flag")]
    pub flag_url: String,
    pub independent: bool,
    /// Only the first entry is used downstream
    pub currencies: Vec<CurrencyDescriptor>,
}

impl RegistryEntry {
    pub fn primary_currency(&self) -> Option<&str> {
        self.currencies.first().map(|c| c.code.as_str())
    }
}

/// Exchange-rate feed payload. Only `rates` feeds the merger; the rest is provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeRateTable {
    pub result: String,
    pub provider: String,
    #[serde(rename = "base_code")]
    pub base_code: String,
    #[serde(rename = "time_last_update_unix")]
    pub last_update_unix: i64,
    #[serde(rename = "time_next_update_unix")]
    pub next_update_unix: i64,
    pub rates: HashMap<String, f64>,
}

impl ExchangeRateTable {
    pub fn rate_for(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }
}

// ============================================================================
// FETCH CLIENT
// ============================================================================

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    registry_url: String,
    rates_url: String,
}

impl UpstreamClient {
    pub fn new(registry_url: &str, rates_url: &str, timeout: Duration) -> LedgerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::upstream("http client", e))?;

        Ok(UpstreamClient {
            http,
            registry_url: registry_url.to_string(),
            rates_url: rates_url.to_string(),
        })
    }

    pub async fn fetch_registry(&self) -> LedgerResult<Vec<RegistryEntry>> {
        let entries: Vec<RegistryEntry> = self.fetch_json(REGISTRY_SOURCE, &self.registry_url).await?;
        debug!(count = entries.len(), "fetched registry entries");
        Ok(entries)
    }

    pub async fn fetch_rates(&self) -> LedgerResult<ExchangeRateTable> {
        let table: ExchangeRateTable = self.fetch_json(RATES_SOURCE, &self.rates_url).await?;
        debug!(base = %table.base_code, count = table.rates.len(), "fetched exchange rates");
        Ok(table)
    }

    /// Issue both fetches concurrently. The first failure wins.
    pub async fn fetch_both(&self) -> LedgerResult<(Vec<RegistryEntry>, ExchangeRateTable)> {
        tokio::try_join!(self.fetch_registry(), self.fetch_rates())
    }

    async fn fetch_json<T: DeserializeOwned>(&self, source_name: &'static str, url: &str) -> LedgerResult<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LedgerError::upstream(source_name, e))?;

        response
            .json::<T>()
            .await
            .map_err(|e| LedgerError::upstream(source_name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_registry_entry_decodes_leniently() {
        let raw = json!({
            "name": "Nigeria",
            "region": "Africa",
            "population": 206139587,
            "flag": "https://flagcdn.com/ng.svg",
            "currencies": [
                {"code": "NGN", "name": "Nigerian naira", "symbol": "₦"},
                {"code": "USD"}
            ],
            "altSpellings": ["NG"],
            "independent": true
        });

        let entry: RegistryEntry = serde_json::from_value(raw).unwrap();

        assert_eq!(entry.name, "Nigeria");
        assert_eq!(entry.capital, None);
        assert_eq!(entry.flag_url, "https://flagcdn.com/ng.svg");
        assert_eq!(entry.primary_currency(), Some("NGN"));
        assert_eq!(entry.currencies[1].symbol, "");
    }

    #[test]
    fn test_rate_table_decodes() {
        let raw = json!({
            "result": "success",
            "provider": "https://www.exchangerate-api.com",
            "time_last_update_unix": 1700000000,
            "base_code": "USD",
            "rates": {"USD": 1, "NGN": 1600.5, "EUR": 0.92}
        });

        let table: ExchangeRateTable = serde_json::from_value(raw).unwrap();

        assert_eq!(table.base_code, "USD");
        assert_eq!(table.rate_for("NGN"), Some(1600.5));
        assert_eq!(table.rate_for("USD"), Some(1.0));
        assert_eq!(table.rate_for("XXX"), None);
    }

    #[tokio::test]
    async fn test_fetch_both_succeeds() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/all");
                then.status(200)
                    .json_body(json!([{"name": "Ghana", "region": "Africa", "population": 31072940,
                                       "currencies": [{"code": "GHS"}]}]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/latest/USD");
                then.status(200).json_body(json!({"base_code": "USD", "rates": {"GHS": 15.3}}));
            })
            .await;

        let client = UpstreamClient::new(
            &server.url("/all"),
            &server.url("/latest/USD"),
            Duration::from_secs(5),
        )
        .unwrap();

        let (registry, rates) = client.fetch_both().await.unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry[0].name, "Ghana");
        assert_eq!(rates.rate_for("GHS"), Some(15.3));
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/latest/USD");
                then.status(503);
            })
            .await;

        let client = UpstreamClient::new(
            &server.url("/all"),
            &server.url("/latest/USD"),
            Duration::from_secs(5),
        )
        .unwrap();

        match client.fetch_rates().await {
            Err(LedgerError::UpstreamUnavailable { source_name, .. }) => {
                assert_eq!(source_name, RATES_SOURCE)
            }
            other => panic!("expected upstream failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/all");
                then.status(200)
                    .delay(Duration::from_millis(1500))
                    .json_body(json!([]));
            })
            .await;

        let client = UpstreamClient::new(
            &server.url("/all"),
            &server.url("/latest/USD"),
            Duration::from_millis(200),
        )
        .unwrap();

        let result = client.fetch_registry().await;
        assert!(matches!(
            result,
            Err(LedgerError::UpstreamUnavailable { source_name: REGISTRY_SOURCE, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_upstream_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/all");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let client = UpstreamClient::new(
            &server.url("/all"),
            &server.url("/latest/USD"),
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(client.fetch_registry().await.is_err());
    }
}
