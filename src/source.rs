//! Backend access: the static region dataset and the filtered market query.

use std::env;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::records::{FilterState, MarketRecord, RegionMap};

/// Endpoint paths, resolved relative to the configured base URL so a path
/// prefix such as `http://host/agri/` is kept.
pub const REGION_DATA_PATH: &str = "data/indian-states-districts.json";
pub const MARKET_DATA_PATH: &str = "api/market-data";
pub const NO_DATA_FOUND_ERROR: &str = "No data found";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<MarketDataPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MarketDataResponse {
    pub fn ok(markets: Vec<MarketRecord>) -> Self {
        Self {
            success: true,
            data: Some(MarketDataPayload {
                total_records: Some(markets.len() as u64),
                markets,
                ..MarketDataPayload::default()
            }),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Server-side aggregates are informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataPayload {
    #[serde(default)]
    pub markets: Vec<MarketRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Error)]
pub enum MarketApiError {
    #[error("invalid API base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("HTTP request failed for {url}: {message}")]
    HttpRequest { url: String, message: String },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

pub trait MarketDataSource: Send + Sync + 'static {
    fn region_map(&self) -> Result<RegionMap, MarketApiError>;
    fn market_data(&self, filters: &FilterState) -> Result<MarketDataResponse, MarketApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketApiConfig {
    pub base_url: String,
    pub http_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for MarketApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            http_timeout_ms: 15_000,
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

pub fn market_api_config_from_env() -> MarketApiConfig {
    let mut config = MarketApiConfig::default();

    if let Ok(base_url) = env::var("AGRI_API_BASE_URL") {
        let trimmed = base_url.trim();
        if !trimmed.is_empty() {
            config.base_url = trimmed.to_string();
        }
    }
    if let Some(timeout) = parse_env_number("AGRI_HTTP_TIMEOUT_MS") {
        config.http_timeout_ms = timeout;
    }
    if let Some(retries) = parse_env_number("AGRI_HTTP_MAX_RETRIES") {
        config.max_retries = retries;
    }
    if let Some(backoff) = parse_env_number("AGRI_HTTP_RETRY_BACKOFF_MS") {
        config.retry_backoff_ms = backoff;
    }

    config
}

fn parse_env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}

struct HttpReply {
    status: u16,
    body: Vec<u8>,
}

trait HttpFetcher: Send + Sync {
    fn get(&self, url: &Url) -> Result<HttpReply, MarketApiError>;
}

struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingFetcher {
    fn new(timeout_ms: u64) -> Result<Self, MarketApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| MarketApiError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestBlockingFetcher {
    fn get(&self, url: &Url) -> Result<HttpReply, MarketApiError> {
        let response =
            self.client
                .get(url.clone())
                .send()
                .map_err(|err| MarketApiError::HttpRequest {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|err| MarketApiError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })?
            .to_vec();

        Ok(HttpReply { status, body })
    }
}

/// Talks to the market backend over HTTP with a blocking client. Call it
/// from a blocking context, never directly on an async worker.
pub struct HttpMarketDataSource {
    base_url: Url,
    config: MarketApiConfig,
    fetcher: Box<dyn HttpFetcher>,
}

impl HttpMarketDataSource {
    pub fn new(config: MarketApiConfig) -> Result<Self, MarketApiError> {
        let fetcher = ReqwestBlockingFetcher::new(config.http_timeout_ms)?;
        Self::with_fetcher(config, Box::new(fetcher))
    }

    fn with_fetcher(
        config: MarketApiConfig,
        fetcher: Box<dyn HttpFetcher>,
    ) -> Result<Self, MarketApiError> {
        let mut base_url =
            Url::parse(&config.base_url).map_err(|err| MarketApiError::InvalidBaseUrl {
                url: config.base_url.clone(),
                message: err.to_string(),
            })?;
        if !base_url.path().ends_with('/') {
            let dir = format!("{}/", base_url.path());
            base_url.set_path(&dir);
        }
        Ok(Self {
            base_url,
            config,
            fetcher,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, MarketApiError> {
        self.base_url
            .join(path)
            .map_err(|err| MarketApiError::InvalidBaseUrl {
                url: format!("{}{}", self.base_url, path),
                message: err.to_string(),
            })
    }

    fn market_data_url(&self, filters: &FilterState) -> Result<Url, MarketApiError> {
        let mut url = self.endpoint(MARKET_DATA_PATH)?;
        url.query_pairs_mut()
            .clear()
            .extend_pairs(filters.query_pairs());
        Ok(url)
    }

    fn get_with_retry(&self, url: &Url) -> Result<HttpReply, MarketApiError> {
        retry(&self.config, || self.fetcher.get(url))
    }
}

impl MarketDataSource for HttpMarketDataSource {
    fn region_map(&self) -> Result<RegionMap, MarketApiError> {
        let url = self.endpoint(REGION_DATA_PATH)?;
        let reply = self.get_with_retry(&url)?;
        if !(200..300).contains(&reply.status) {
            return Err(MarketApiError::HttpRequest {
                url: url.to_string(),
                message: format!("unexpected HTTP status {}", reply.status),
            });
        }

        serde_json::from_slice(&reply.body).map_err(|err| MarketApiError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn market_data(&self, filters: &FilterState) -> Result<MarketDataResponse, MarketApiError> {
        let url = self.market_data_url(filters)?;
        debug!(
            component = "market_source",
            event = "market.request",
            url = %url
        );
        let reply = self.get_with_retry(&url)?;

        // The backend answers 404/500 with a regular envelope; only an
        // undecodable body on a non-2xx status is a transport failure.
        match serde_json::from_slice::<MarketDataResponse>(&reply.body) {
            Ok(envelope) => Ok(envelope),
            Err(err) if (200..300).contains(&reply.status) => Err(MarketApiError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }),
            Err(_) => Err(MarketApiError::HttpRequest {
                url: url.to_string(),
                message: format!("unexpected HTTP status {}", reply.status),
            }),
        }
    }
}

fn retry<T>(
    cfg: &MarketApiConfig,
    mut f: impl FnMut() -> Result<T, MarketApiError>,
) -> Result<T, MarketApiError> {
    let mut attempt: u32 = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= cfg.max_retries => return Err(err),
            Err(err) => {
                attempt = attempt.saturating_add(1);
                let shift = attempt.saturating_sub(1).min(10);
                let sleep_ms = cfg.retry_backoff_ms.saturating_mul(1u64 << shift);
                warn!(
                    component = "market_source",
                    event = "market.request.retry",
                    attempt,
                    sleep_ms,
                    error = %err
                );
                std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }
        }
    }
}

/// Serves a fixed dataset with the backend's filter rules: each non-empty
/// filter is a case-insensitive substring match, state and district keys
/// match with `-` read as a space, and an empty result is a failure.
#[derive(Debug, Clone)]
pub struct InMemoryMarketSource {
    regions: RegionMap,
    records: Vec<MarketRecord>,
}

impl InMemoryMarketSource {
    pub fn new(regions: RegionMap, records: Vec<MarketRecord>) -> Self {
        Self { regions, records }
    }

    pub fn demo() -> Self {
        Self::new(demo_regions(), demo_records())
    }
}

impl MarketDataSource for InMemoryMarketSource {
    fn region_map(&self) -> Result<RegionMap, MarketApiError> {
        Ok(self.regions.clone())
    }

    fn market_data(&self, filters: &FilterState) -> Result<MarketDataResponse, MarketApiError> {
        let matched: Vec<MarketRecord> = self
            .records
            .iter()
            .filter(|record| record_matches(record, filters))
            .cloned()
            .collect();

        info!(
            component = "market_source",
            event = "market.in_memory.query",
            matched = matched.len(),
            total = self.records.len()
        );

        if matched.is_empty() {
            Ok(MarketDataResponse::failure(NO_DATA_FOUND_ERROR))
        } else {
            Ok(MarketDataResponse::ok(matched))
        }
    }
}

fn record_matches(record: &MarketRecord, filters: &FilterState) -> bool {
    contains_filter(&record.commodity, &filters.crop, false)
        && contains_filter(&record.state, &filters.state, true)
        && contains_filter(&record.district, &filters.district, true)
        && contains_filter(&record.market, &filters.market, false)
}

fn contains_filter(value: &str, filter: &str, region_key: bool) -> bool {
    let needle = filter.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let needle = if region_key {
        needle.replace('-', " ")
    } else {
        needle
    };
    value.to_lowercase().contains(&needle)
}

pub fn demo_regions() -> RegionMap {
    let entries = [
        ("Maharashtra", &["Nashik", "Pune", "Nagpur"][..]),
        ("Karnataka", &["Kolar", "Bangalore Rural", "Mysore"][..]),
        ("Uttar Pradesh", &["Agra", "Lucknow"][..]),
        ("Punjab", &["Ludhiana", "Amritsar"][..]),
    ];

    RegionMap::new(
        entries
            .into_iter()
            .map(|(state, districts)| {
                (
                    state.to_string(),
                    districts.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect(),
    )
}

pub fn demo_records() -> Vec<MarketRecord> {
    let rows: [(&str, &str, &str, &str, &str, i64, f64); 14] = [
        ("Lasalgaon", "Maharashtra", "Nashik", "Onion", "Red", 182_000, 1_250.0),
        ("Pimpalgaon", "Maharashtra", "Nashik", "Onion", "Red", 176_500, 980.0),
        ("Pune", "Maharashtra", "Pune", "Tomato", "Hybrid", 95_000, 410.0),
        ("Nagpur", "Maharashtra", "Nagpur", "Orange", "Nagpuri", 320_000, 260.5),
        ("Kolar", "Karnataka", "Kolar", "Tomato", "Local", 88_000, 730.0),
        ("Binny Mill", "Karnataka", "Bangalore Rural", "Potato", "Jyoti", 145_000, 520.0),
        ("Mysore", "Karnataka", "Mysore", "Banana", "Yelakki", 210_000, 140.0),
        ("Agra", "Uttar Pradesh", "Agra", "Potato", "Chipsona", 112_500, 1_480.0),
        ("Lucknow", "Uttar Pradesh", "Lucknow", "Wheat", "Dara", 227_500, 860.0),
        ("Lucknow", "Uttar Pradesh", "Lucknow", "Mango", "Dasheri", 450_000, 95.0),
        ("Khanna", "Punjab", "Ludhiana", "Wheat", "PBW 343", 242_500, 2_100.0),
        ("Ludhiana", "Punjab", "Ludhiana", "Maize", "Hybrid", 198_000, 640.0),
        ("Amritsar", "Punjab", "Amritsar", "Paddy", "Basmati 1121", 380_000, 1_150.0),
        ("Amritsar", "Punjab", "Amritsar", "Wheat", "Sharbati", 251_000, 700.0),
    ];

    rows.into_iter()
        .map(
            |(market, state, district, commodity, variety, price, volume)| MarketRecord {
                market: market.to_string(),
                state: state.to_string(),
                district: district.to_string(),
                commodity: commodity.to_string(),
                variety: variety.to_string(),
                price,
                total_volume: volume,
                date: "2025-01-15T00:00:00".to_string(),
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockFetcher {
        responses: HashMap<String, (u16, Vec<u8>)>,
        failures_before_success: usize,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn with(mut self, url: &str, status: u16, body: &str) -> Self {
            self.responses
                .insert(url.to_string(), (status, body.as_bytes().to_vec()));
            self
        }
    }

    impl HttpFetcher for MockFetcher {
        fn get(&self, url: &Url) -> Result<HttpReply, MarketApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(MarketApiError::HttpRequest {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                });
            }

            self.responses
                .get(url.as_str())
                .map(|(status, body)| HttpReply {
                    status: *status,
                    body: body.clone(),
                })
                .ok_or_else(|| MarketApiError::HttpRequest {
                    url: url.to_string(),
                    message: "missing mock response".to_string(),
                })
        }
    }

    fn test_config() -> MarketApiConfig {
        MarketApiConfig {
            base_url: "http://backend.test".to_string(),
            retry_backoff_ms: 1,
            ..MarketApiConfig::default()
        }
    }

    const ALL_EMPTY_URL: &str = "http://backend.test/api/market-data?state=&district=&crop=&market=";

    #[test]
    fn query_url_carries_all_four_filter_fields() {
        let source =
            HttpMarketDataSource::with_fetcher(test_config(), Box::<MockFetcher>::default())
                .unwrap();
        let filters = FilterState {
            state: "tamil-nadu".to_string(),
            crop: "green chilli".to_string(),
            ..FilterState::default()
        };

        let url = source.market_data_url(&filters).unwrap();
        assert_eq!(
            url.as_str(),
            "http://backend.test/api/market-data?state=tamil-nadu&district=&crop=green+chilli&market="
        );
        assert_eq!(
            source.market_data_url(&FilterState::default()).unwrap().as_str(),
            ALL_EMPTY_URL
        );
    }

    #[test]
    fn non_success_status_with_envelope_is_application_failure() {
        let fetcher = MockFetcher::default().with(
            ALL_EMPTY_URL,
            404,
            r#"{"success":false,"error":"Market data not ready"}"#,
        );
        let source = HttpMarketDataSource::with_fetcher(test_config(), Box::new(fetcher)).unwrap();

        let response = source.market_data(&FilterState::default()).unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Market data not ready"));
    }

    #[test]
    fn non_success_status_without_envelope_is_transport_failure() {
        let fetcher = MockFetcher::default().with(ALL_EMPTY_URL, 502, "<html>bad gateway</html>");
        let source = HttpMarketDataSource::with_fetcher(test_config(), Box::new(fetcher)).unwrap();

        let err = source.market_data(&FilterState::default()).unwrap_err();
        assert!(matches!(err, MarketApiError::HttpRequest { .. }));
    }

    #[test]
    fn transport_errors_are_retried_up_to_limit() {
        let fetcher = MockFetcher {
            failures_before_success: 2,
            ..MockFetcher::default()
        }
        .with(
            ALL_EMPTY_URL,
            200,
            r#"{"success":true,"data":{"markets":[{"market":"A","price":1000}]}}"#,
        );
        let source = HttpMarketDataSource::with_fetcher(test_config(), Box::new(fetcher)).unwrap();

        let response = source.market_data(&FilterState::default()).unwrap();
        assert!(response.success);
        assert_eq!(response.data.unwrap().markets[0].price, 1_000);
    }

    #[test]
    fn region_map_decodes_state_mapping() {
        let fetcher = MockFetcher::default().with(
            "http://backend.test/data/indian-states-districts.json",
            200,
            r#"{"Goa":["North Goa","South Goa"],"Assam":["Kamrup"]}"#,
        );
        let source = HttpMarketDataSource::with_fetcher(test_config(), Box::new(fetcher)).unwrap();

        let regions = source.region_map().unwrap();
        assert_eq!(regions.state_count(), 2);
        assert_eq!(regions.state_options()[1].label, "Assam");
    }

    #[test]
    fn base_url_path_prefix_is_kept() {
        for base_url in ["http://backend.test/agri", "http://backend.test/agri/"] {
            let cfg = MarketApiConfig {
                base_url: base_url.to_string(),
                ..test_config()
            };
            let source =
                HttpMarketDataSource::with_fetcher(cfg, Box::<MockFetcher>::default()).unwrap();

            assert_eq!(
                source.endpoint(REGION_DATA_PATH).unwrap().as_str(),
                "http://backend.test/agri/data/indian-states-districts.json"
            );
            assert_eq!(
                source.market_data_url(&FilterState::default()).unwrap().as_str(),
                "http://backend.test/agri/api/market-data?state=&district=&crop=&market="
            );
        }
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let cfg = MarketApiConfig {
            base_url: "not a url".to_string(),
            ..MarketApiConfig::default()
        };
        let err = HttpMarketDataSource::with_fetcher(cfg, Box::<MockFetcher>::default())
            .err()
            .expect("invalid base URL should fail");
        assert!(matches!(err, MarketApiError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn in_memory_source_applies_backend_filter_rules() {
        let source = InMemoryMarketSource::demo();

        let by_state = source
            .market_data(&FilterState {
                state: "uttar-pradesh".to_string(),
                ..FilterState::default()
            })
            .unwrap();
        let markets = by_state.data.unwrap().markets;
        assert_eq!(markets.len(), 3);
        assert!(markets.iter().all(|m| m.state == "Uttar Pradesh"));

        let by_crop = source
            .market_data(&FilterState {
                crop: "WHEAT".to_string(),
                market: "amrit".to_string(),
                ..FilterState::default()
            })
            .unwrap();
        assert_eq!(by_crop.data.unwrap().markets.len(), 1);

        let none = source
            .market_data(&FilterState {
                crop: "saffron".to_string(),
                ..FilterState::default()
            })
            .unwrap();
        assert!(!none.success);
        assert_eq!(none.error.as_deref(), Some(NO_DATA_FOUND_ERROR));
    }
}
