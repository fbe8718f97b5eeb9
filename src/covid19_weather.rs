//! The main entry point: fetches the COVID-19 time series and enriches it with
//! weather observations, fetching only what the local cache does not hold yet.

use crate::cache::enriched_store::EnrichedStore;
use crate::cache::weather_cache::WeatherCache;
use crate::diff::{plan_fetch, FetchPlan};
use crate::error::Covid19WeatherError;
use crate::reconcile::join_enriched;
use crate::source::csv_source::{CsvSource, DEFAULT_SOURCE_URL};
use crate::types::data_report::{DataReport, EnrichmentStatus};
use crate::types::row_key::row_keys;
use crate::utils::get_cache_dir;
use crate::weather::fetcher::{
    ForecastConfig, WeatherFetcher, DEFAULT_FORECAST_URL, DEFAULT_LANG,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_REQUEST_TIMEOUT, DEFAULT_UNITS,
};
use bon::bon;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use polars::prelude::DataFrame;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the forecast API key.
pub const API_KEY_VAR: &str = "DARKSKY_KEY";

/// Client producing the weather-enriched COVID-19 table.
///
/// Weather enrichment is optional: without an api key every call returns the raw
/// source table and no file in the cache folder is created or touched.
///
/// # Examples
///
/// ```no_run
/// # use covid19_weather::{Covid19Weather, Covid19WeatherError};
/// # #[tokio::main]
/// # async fn main() -> Result<(), Covid19WeatherError> {
/// // Api key from $DARKSKY_KEY, cache in the system cache directory.
/// let client = Covid19Weather::builder().build()?;
/// let report = client.get_report().await?;
/// println!(
///     "{} rows ({}), data as of {}",
///     report.frame.height(),
///     report.status,
///     report.freshness_or_now()
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Covid19Weather {
    cache_folder: PathBuf,
    source: CsvSource,
    fetcher: Option<WeatherFetcher>,
    enriched: EnrichedStore,
}

#[bon]
impl Covid19Weather {
    /// Creates a client. Every setting is optional:
    ///
    /// * `.cache_folder(PathBuf)`: where `weather.bin` and the enriched table live.
    ///   Defaults to `covid19_weather_cache` in the system cache directory. It is only
    ///   created once something has to be written.
    /// * `.api_key(String)`: forecast API key. Defaults to the value of the
    ///   environment variable named by `.api_key_var(String)` (default
    ///   [`API_KEY_VAR`]). An absent or blank key disables enrichment.
    /// * `.source_url(String)`: the time-series CSV.
    /// * `.forecast_url(String)`: forecast API base URL.
    /// * `.units(String)` / `.lang(String)`: forecast query parameters (`auto`, `en`).
    /// * `.max_concurrent_requests(usize)`: forecast requests in flight (16).
    /// * `.request_timeout(Duration)`: per forecast request (30 s).
    ///
    /// # Errors
    ///
    /// [`Covid19WeatherError::CacheDirResolution`] when no cache folder is given and
    /// the system cache directory is unknown, [`Covid19WeatherError::HttpClient`] if
    /// the HTTP client cannot be set up.
    #[builder]
    pub fn new(
        cache_folder: Option<PathBuf>,
        api_key: Option<String>,
        api_key_var: Option<String>,
        source_url: Option<String>,
        forecast_url: Option<String>,
        units: Option<String>,
        lang: Option<String>,
        max_concurrent_requests: Option<usize>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, Covid19WeatherError> {
        let cache_folder = match cache_folder {
            Some(folder) => folder,
            None => get_cache_dir().map_err(Covid19WeatherError::CacheDirResolution)?,
        };

        let api_key_var = api_key_var.unwrap_or_else(|| API_KEY_VAR.to_string());
        let api_key = api_key
            .or_else(|| std::env::var(&api_key_var).ok())
            .filter(|key| !key.trim().is_empty());
        debug!(
            "Forecast api key {}",
            if api_key.is_some() { "configured" } else { "absent" }
        );

        let client = Client::builder()
            .build()
            .map_err(Covid19WeatherError::HttpClient)?;

        let fetcher = api_key.map(|api_key| {
            let config = ForecastConfig {
                api_key,
                base_url: forecast_url.unwrap_or_else(|| DEFAULT_FORECAST_URL.to_string()),
                units: units.unwrap_or_else(|| DEFAULT_UNITS.to_string()),
                lang: lang.unwrap_or_else(|| DEFAULT_LANG.to_string()),
                max_concurrent_requests: max_concurrent_requests
                    .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
                request_timeout: request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            };
            WeatherFetcher::new(client.clone(), config)
        });

        Ok(Self {
            source: CsvSource::new(
                client,
                source_url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            ),
            fetcher,
            enriched: EnrichedStore::new(&cache_folder),
            cache_folder,
        })
    }

    /// Creates a client with default settings and the given cache folder.
    pub fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, Covid19WeatherError> {
        Self::builder().cache_folder(cache_folder).build()
    }

    pub fn cache_folder(&self) -> &Path {
        &self.cache_folder
    }

    /// Whether a forecast api key is configured.
    pub fn enrichment_available(&self) -> bool {
        self.fetcher.is_some()
    }

    /// Returns the enriched table, or the raw source table when enrichment is
    /// unavailable or produced no rows. See [`Covid19Weather::get_report`].
    pub async fn get_data(&self) -> Result<DataFrame, Covid19WeatherError> {
        Ok(self.get_report().await?.frame)
    }

    /// Runs the full pipeline: fetch the source table, fetch weather for the
    /// identities missing from the cache, persist the cache if it changed, and join.
    ///
    /// # Errors
    ///
    /// * [`Covid19WeatherError::Source`]: the source feed could not be fetched or
    ///   parsed. Nothing is persisted.
    /// * [`Covid19WeatherError::Cache`]: the cache file exists but cannot be read or
    ///   decoded, or a write failed. If only the enriched table failed to write, the
    ///   next run rewrites it from the cache.
    /// * [`Covid19WeatherError::Fetch`]: at least one forecast request failed. The
    ///   whole batch is discarded and the cache file is left exactly as it was.
    pub async fn get_report(&self) -> Result<DataReport, Covid19WeatherError> {
        let source = self.source.fetch().await?;

        let Some(fetcher) = &self.fetcher else {
            info!("No forecast api key configured, returning source data unenriched");
            let mut report = DataReport::unenriched(source, EnrichmentStatus::Unavailable);
            report.modified = self.enriched.modified().await?;
            return Ok(report);
        };

        let keys = row_keys(&source)?;
        let mut cache = WeatherCache::load(&self.cache_folder).await?;

        let fetched = match plan_fetch(keys.iter().flatten(), &cache) {
            FetchPlan::UpToDate => {
                debug!("Nothing new to fetch, all {} identities cached", cache.len());
                0
            }
            FetchPlan::Fetch(missing) => {
                debug!(
                    "{} of {} cached, fetching {} identities",
                    cache.len(),
                    keys.len(),
                    missing.len()
                );
                let records = fetcher.fetch_all(missing).await?;
                let count = records.len();
                cache.append(records);
                count
            }
        };
        let cache_changed = cache.persist().await?;

        let Some(enriched) = join_enriched(&source, &keys, &cache)? else {
            warn!("No weather data matches the source rows, returning source data unenriched");
            let mut report = DataReport::unenriched(source, EnrichmentStatus::Empty);
            report.fetched = fetched;
            report.cached = cache.len();
            report.modified = self.enriched.modified().await?;
            return Ok(report);
        };

        // The enriched table's mtime is the freshness signal, only rewrite it when
        // the weather data behind it changed. A table older than the weather cache
        // was left behind by a run that failed after persisting the cache.
        let enriched_stale = match self.enriched.modified().await? {
            None => true,
            Some(enriched) => cache
                .modified()
                .await?
                .is_some_and(|weather| enriched < weather),
        };
        if cache_changed || enriched_stale {
            self.enriched.write(enriched.clone()).await?;
        }

        Ok(DataReport {
            frame: enriched,
            status: EnrichmentStatus::Enriched,
            fetched,
            cached: cache.len(),
            modified: self.enriched.modified().await?,
        })
    }

    /// Last modification time of the persisted enriched table, if any.
    pub async fn enriched_modified(&self) -> Result<Option<DateTime<Local>>, Covid19WeatherError> {
        Ok(self.enriched.modified().await?)
    }

    /// The enriched table persisted by the last run that changed it, if any.
    pub async fn last_enriched(&self) -> Result<Option<DataFrame>, Covid19WeatherError> {
        Ok(self.enriched.load().await?)
    }

    /// Loads the weather cache without running the pipeline.
    pub async fn weather_cache(&self) -> Result<WeatherCache, Covid19WeatherError> {
        Ok(WeatherCache::load(&self.cache_folder).await?)
    }
}
