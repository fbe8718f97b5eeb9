use crate::source::error::SourceError;
use crate::types::row_key::normalize_identity_columns;
use log::{info, warn};
use polars::prelude::*;
use reqwest::Client;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::task;

/// The combined COVID-19 time series: one row per region and date.
pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/datasets/covid-19/master/data/time-series-19-covid-combined.csv";

/// The upstream time-series feed, a CSV document with at least `Date`, `Lat` and
/// `Long` columns besides the case metrics.
#[derive(Debug, Clone)]
pub struct CsvSource {
    client: Client,
    url: String,
}

impl CsvSource {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Downloads and parses the feed. `Date` comes back as a date column and
    /// `Lat`/`Long` as `Float64`, other columns as inferred.
    pub async fn fetch(&self) -> Result<DataFrame, SourceError> {
        let bytes = self.download().await?;
        let mut frame = Self::csv_to_dataframe(bytes, &self.url).await?;
        normalize_identity_columns(&mut frame).map_err(|e| SourceError::IdentityColumns {
            url: self.url.clone(),
            source: e,
        })?;
        info!(
            "Fetched {} source rows with {} columns from {}",
            frame.height(),
            frame.width(),
            self.url
        );
        Ok(frame)
    }

    async fn download(&self) -> Result<Vec<u8>, SourceError> {
        info!("Downloading source data from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::NetworkRequest(self.url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", self.url, e);
                return Err(if let Some(status) = e.status() {
                    SourceError::HttpStatus {
                        url: self.url.clone(),
                        status,
                        source: e,
                    }
                } else {
                    SourceError::NetworkRequest(self.url.clone(), e)
                });
            }
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::NetworkRequest(self.url.clone(), e))?;
        Ok(bytes.to_vec())
    }

    /// Parses CSV bytes (with header) into a DataFrame on a blocking thread.
    async fn csv_to_dataframe(bytes: Vec<u8>, url: &str) -> Result<DataFrame, SourceError> {
        let url = url.to_string();

        task::spawn_blocking(move || {
            let io_err = |source| SourceError::CsvReadIo {
                url: url.clone(),
                source,
            };
            let mut temp_file = NamedTempFile::new().map_err(io_err)?;
            temp_file.write_all(&bytes).map_err(io_err)?;
            temp_file.flush().map_err(io_err)?;

            let polars_err = |source| SourceError::CsvReadPolars {
                url: url.clone(),
                source,
            };
            CsvReadOptions::default()
                .with_has_header(true)
                .map_parse_options(|options| options.with_try_parse_dates(true))
                .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
                .map_err(polars_err)?
                .finish()
                .map_err(polars_err)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_csv_to_dataframe() -> Result<(), SourceError> {
        let csv = "Date,Country/Region,Province/State,Lat,Long,Confirmed,Recovered,Deaths\n\
                   2020-01-22,Afghanistan,,33,65,0,0,0\n\
                   2020-01-22,Australia,Victoria,-37.8136,144.9631,1,0,0\n";

        let mut frame = CsvSource::csv_to_dataframe(csv.as_bytes().to_vec(), "test").await?;
        normalize_identity_columns(&mut frame).expect("Identity columns should normalize");

        assert_eq!(frame.shape(), (2, 8));
        assert_eq!(frame.column("Date").unwrap().dtype(), &DataType::Date);
        assert_eq!(frame.column("Lat").unwrap().f64().unwrap().get(0), Some(33.0));
        assert_eq!(
            frame.column("Province/State").unwrap().str().unwrap().get(1),
            Some("Victoria")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_csv_without_identity_columns() -> Result<(), SourceError> {
        let csv = "Country,Deaths\nAfghanistan,0\n";
        let mut frame = CsvSource::csv_to_dataframe(csv.as_bytes().to_vec(), "test").await?;
        assert!(normalize_identity_columns(&mut frame).is_err());
        Ok(())
    }
}
