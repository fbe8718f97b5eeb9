use crate::cache::error::CacheError;
use crate::source::error::SourceError;
use crate::weather::error::FetchError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Covid19WeatherError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}
