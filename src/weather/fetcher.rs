//! Fetches point-in-time weather for row identities from the forecast API.

use crate::types::row_key::RowKey;
use crate::types::weather_record::{ForecastResponse, WeatherRecord};
use crate::weather::error::FetchError;
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_FORECAST_URL: &str = "https://api.darksky.net/forecast";
pub const DEFAULT_UNITS: &str = "auto";
pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Observations are requested for local solar noon of the row's date, which keeps
/// the timestamp free of any timezone.
const LOCAL_NOON_HOUR: i64 = 12;

/// Everything needed to address the forecast API.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub api_key: String,
    /// Base URL without trailing slash, e.g. `https://api.darksky.net/forecast`.
    pub base_url: String,
    pub units: String,
    pub lang: String,
    /// Upper bound on requests in flight at once. Values below 1 are treated as 1.
    pub max_concurrent_requests: usize,
    /// Per-request timeout; an expired request fails its row like any other error.
    pub request_timeout: Duration,
}

impl ForecastConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_FORECAST_URL.to_string(),
            units: DEFAULT_UNITS.to_string(),
            lang: DEFAULT_LANG.to_string(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// The local timestamp a forecast is requested for: the key's date at noon.
pub fn request_time(key: &RowKey) -> NaiveDateTime {
    key.date.and_time(NaiveTime::MIN) + TimeDelta::hours(LOCAL_NOON_HOUR)
}

/// Issues forecast requests over one shared HTTP client.
#[derive(Debug, Clone)]
pub struct WeatherFetcher {
    client: Client,
    config: ForecastConfig,
}

impl WeatherFetcher {
    pub fn new(client: Client, config: ForecastConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, key: &RowKey, api_key: &str) -> String {
        format!(
            "{}/{}/{},{},{}?units={}&lang={}",
            self.config.base_url.trim_end_matches('/'),
            api_key,
            key.latitude(),
            key.longitude(),
            request_time(key).format("%Y-%m-%dT%H:%M:%S"),
            self.config.units,
            self.config.lang,
        )
    }

    /// The request URL for `key`.
    pub fn forecast_url(&self, key: &RowKey) -> String {
        self.url(key, &self.config.api_key)
    }

    /// Fetches the current conditions for a single identity.
    pub async fn fetch_one(&self, key: &RowKey) -> Result<WeatherRecord, FetchError> {
        let url = self.forecast_url(key);
        // Errors and logs never carry the api key.
        let shown_url = self.url(key, "<key>");
        debug!("Fetching weather for {} from {}", key, shown_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(shown_url.clone(), e.without_url()))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", shown_url, e.status());
                let e = e.without_url();
                return Err(if let Some(status) = e.status() {
                    FetchError::HttpStatus {
                        url: shown_url,
                        status,
                        source: e,
                    }
                } else {
                    FetchError::NetworkRequest(shown_url, e)
                });
            }
        };

        let forecast = response
            .json::<ForecastResponse>()
            .await
            .map_err(|e| FetchError::ResponseDecode {
                url: shown_url,
                source: e.without_url(),
            })?;

        Ok(WeatherRecord::new(*key, forecast.currently))
    }

    /// Fetches every key, at most `max_concurrent_requests` at a time.
    ///
    /// All requests run to completion before this returns. If any of them failed,
    /// the error of the earliest key (in `keys` order) is returned and no records
    /// are, so a caller never sees a partial batch.
    pub async fn fetch_all(&self, keys: Vec<RowKey>) -> Result<Vec<WeatherRecord>, FetchError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let limit = self.config.max_concurrent_requests.max(1);
        info!(
            "Executing {} weather fetches, {} at a time",
            keys.len(),
            limit
        );

        let results: Vec<Result<WeatherRecord, FetchError>> = stream::iter(keys.iter())
            .map(|key| self.fetch_one(key))
            .buffered(limit)
            .collect()
            .await;

        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            warn!(
                "{} of {} weather fetches failed, discarding the batch",
                failures,
                results.len()
            );
        }
        results.into_iter().collect()
    }
}
