mod cache;
mod covid19_weather;
mod diff;
mod error;
mod reconcile;
mod source;
mod types;
mod utils;
mod weather;

pub use covid19_weather::*;
pub use error::Covid19WeatherError;

pub use cache::enriched_store::{EnrichedStore, ENRICHED_FILE_NAME};
pub use cache::error::CacheError;
pub use cache::weather_cache::{WeatherCache, WEATHER_CACHE_FILE_NAME};

pub use diff::{plan_fetch, FetchPlan};
pub use reconcile::join_enriched;

pub use source::csv_source::{CsvSource, DEFAULT_SOURCE_URL};
pub use source::error::SourceError;

pub use types::data_report::{DataReport, EnrichmentStatus};
pub use types::row_key::{row_keys, RowKey};
pub use types::weather_record::{records_to_frame, CurrentConditions, WeatherRecord};

pub use weather::error::FetchError;
pub use weather::fetcher::{request_time, ForecastConfig, WeatherFetcher};
