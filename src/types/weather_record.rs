//! Weather observations as returned by the forecast API and as stored in the cache.

use crate::types::row_key::{date_to_days, RowKey, DATE_COLUMN, LAT_COLUMN, LONG_COLUMN};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// The `currently` block of a forecast response.
///
/// Every attribute is optional: the API omits fields it has no observation for,
/// and unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    /// Unix timestamp (seconds) the observation refers to.
    pub time: Option<i64>,
    pub summary: Option<String>,
    pub icon: Option<String>,
    pub precip_intensity: Option<f64>,
    pub precip_probability: Option<f64>,
    pub precip_type: Option<String>,
    pub temperature: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub dew_point: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_bearing: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub uv_index: Option<f64>,
    pub visibility: Option<f64>,
    pub ozone: Option<f64>,
}

/// Envelope of a forecast API response; only `currently` is used.
#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    pub currently: CurrentConditions,
}

/// Weather observed at one [`RowKey`].
///
/// The API response does not carry the date or coordinates it was requested for,
/// so the fetcher re-attaches them to make the record addressable again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub lat: f64,
    pub lon: f64,
    pub conditions: CurrentConditions,
}

impl WeatherRecord {
    pub fn new(key: RowKey, conditions: CurrentConditions) -> Self {
        Self {
            date: key.date,
            lat: key.latitude(),
            lon: key.longitude(),
            conditions,
        }
    }

    pub fn key(&self) -> RowKey {
        RowKey::new(self.date, self.lat, self.lon)
    }
}

/// Builds one column per weather attribute, rows in the order of `conditions`.
/// Column names follow the API payload (`temperature`, `dewPoint`, ...).
pub(crate) fn condition_columns(conditions: &[&CurrentConditions]) -> Vec<Column> {
    macro_rules! attribute {
        ($name:expr, $field:ident) => {
            Column::new(
                $name.into(),
                conditions
                    .iter()
                    .map(|c| c.$field.clone())
                    .collect::<Vec<_>>(),
            )
        };
    }

    vec![
        attribute!("time", time),
        attribute!("summary", summary),
        attribute!("icon", icon),
        attribute!("precipIntensity", precip_intensity),
        attribute!("precipProbability", precip_probability),
        attribute!("precipType", precip_type),
        attribute!("temperature", temperature),
        attribute!("apparentTemperature", apparent_temperature),
        attribute!("dewPoint", dew_point),
        attribute!("humidity", humidity),
        attribute!("pressure", pressure),
        attribute!("windSpeed", wind_speed),
        attribute!("windGust", wind_gust),
        attribute!("windBearing", wind_bearing),
        attribute!("cloudCover", cloud_cover),
        attribute!("uvIndex", uv_index),
        attribute!("visibility", visibility),
        attribute!("ozone", ozone),
    ]
}

/// Converts weather records into a frame with `Date`, `Lat`, `Long` followed by
/// every weather attribute.
pub fn records_to_frame(records: &[WeatherRecord]) -> PolarsResult<DataFrame> {
    let days: Vec<i32> = records.iter().map(|r| date_to_days(r.date)).collect();
    let lat: Vec<f64> = records.iter().map(|r| r.lat).collect();
    let lon: Vec<f64> = records.iter().map(|r| r.lon).collect();
    let conditions: Vec<&CurrentConditions> = records.iter().map(|r| &r.conditions).collect();

    let mut columns = vec![
        Column::new(DATE_COLUMN.into(), days).cast(&DataType::Date)?,
        Column::new(LAT_COLUMN.into(), lat),
        Column::new(LONG_COLUMN.into(), lon),
    ];
    columns.extend(condition_columns(&conditions));
    DataFrame::new(columns)
}
