use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error processing CSV data from {url}")]
    CsvReadIo {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parsing error processing CSV data from {url}")]
    CsvReadPolars {
        url: String,
        #[source]
        source: PolarsError,
    },

    #[error("Source data from {url} lacks usable Date/Lat/Long columns")]
    IdentityColumns {
        url: String,
        #[source]
        source: PolarsError,
    },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
