//! The result of a data run, as handed to presentation code.

use chrono::{DateTime, Local};
use polars::prelude::*;
use std::fmt;

/// How (and whether) the source table was enriched with weather data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentStatus {
    /// No forecast API key is configured; the source table is returned as-is.
    Unavailable,
    /// Enrichment ran but no source row has matching weather data; the source
    /// table is returned as-is.
    Empty,
    /// The table is the inner join of source rows and weather records.
    Enriched,
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EnrichmentStatus::Unavailable => "unavailable",
            EnrichmentStatus::Empty => "empty",
            EnrichmentStatus::Enriched => "enriched",
        };
        write!(f, "{label}")
    }
}

/// The table produced by [`crate::Covid19Weather::get_report`] plus what it took to
/// produce it.
#[derive(Debug, Clone)]
pub struct DataReport {
    /// The enriched table, or the raw source table when enrichment degraded.
    pub frame: DataFrame,
    pub status: EnrichmentStatus,
    /// Number of weather records fetched from the forecast API during this run.
    pub fetched: usize,
    /// Number of weather records held by the cache after this run.
    pub cached: usize,
    /// Last modification time of the persisted enriched table, if it exists.
    pub modified: Option<DateTime<Local>>,
}

impl DataReport {
    pub(crate) fn unenriched(frame: DataFrame, status: EnrichmentStatus) -> Self {
        Self {
            frame,
            status,
            fetched: 0,
            cached: 0,
            modified: None,
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.status == EnrichmentStatus::Enriched
    }

    /// Freshness to display next to the table: when the enriched table was last
    /// written, or the current time when nothing has been persisted.
    pub fn freshness_or_now(&self) -> DateTime<Local> {
        self.modified.unwrap_or_else(Local::now)
    }

    /// Renders the table as CSV with a header row.
    pub fn to_csv(&self) -> PolarsResult<String> {
        let mut frame = self.frame.clone();
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut frame)?;
        String::from_utf8(buffer).map_err(|e| PolarsError::ComputeError(e.to_string().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_csv() -> PolarsResult<()> {
        let frame = df!(
            "Country/Region" => ["Afghanistan", "Albania"],
            "Deaths" => [0i64, 2],
        )?;
        let report = DataReport::unenriched(frame, EnrichmentStatus::Unavailable);

        assert_eq!(
            report.to_csv()?,
            "Country/Region,Deaths\nAfghanistan,0\nAlbania,2\n"
        );
        assert!(!report.is_enriched());
        Ok(())
    }

    #[test]
    fn test_freshness_falls_back_to_now() -> PolarsResult<()> {
        let before = Local::now();
        let report = DataReport::unenriched(DataFrame::empty(), EnrichmentStatus::Empty);
        assert!(report.freshness_or_now() >= before);
        Ok(())
    }
}
