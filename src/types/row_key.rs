//! The `(Date, Lat, Long)` identity shared by source rows, cached weather records
//! and the enriched join.
//!
//! Dates are compared as calendar dates, never as formatted strings. Coordinates
//! are compared exactly: no rounding or tolerance is applied, so `33.0` and
//! `33.000001` are different locations.

use chrono::{Datelike, NaiveDate};
use ordered_float::OrderedFloat;
use polars::prelude::*;
use std::fmt;

pub const DATE_COLUMN: &str = "Date";
pub const LAT_COLUMN: &str = "Lat";
pub const LONG_COLUMN: &str = "Long";

/// `NaiveDate::num_days_from_ce` of 1970-01-01, the epoch of polars' `Date` dtype.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Identity of a row: the calendar date and the exact coordinates it refers to.
///
/// Ordering is by date, then latitude, then longitude. The persisted weather cache
/// is written in this order so identical contents always encode to identical bytes.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use covid19_weather::RowKey;
///
/// let date = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
/// let a = RowKey::new(date, 52.1326, 5.2913);
/// let b = RowKey::new(date, 52.1326, 5.2913);
/// assert_eq!(a, b);
/// assert_ne!(a, RowKey::new(date, 52.1327, 5.2913));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub date: NaiveDate,
    pub lat: OrderedFloat<f64>,
    pub lon: OrderedFloat<f64>,
}

impl RowKey {
    pub fn new(date: NaiveDate, lat: f64, lon: f64) -> Self {
        Self {
            date,
            lat: OrderedFloat(lat),
            lon: OrderedFloat(lon),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.lat.into_inner()
    }

    pub fn longitude(&self) -> f64 {
        self.lon.into_inner()
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.date, self.lat, self.lon)
    }
}

pub(crate) fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Reads a date column as calendar dates. Accepts the `Date` dtype as well as
/// `%Y-%m-%d` strings; unparseable strings become `None`.
fn date_values(column: &Column) -> PolarsResult<Vec<Option<NaiveDate>>> {
    match column.dtype() {
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(days_to_date))
                .collect())
        }
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|s| s.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
            .collect()),
        other => Err(PolarsError::SchemaMismatch(
            format!("column '{}' has type {other}, expected a date", column.name()).into(),
        )),
    }
}

/// Computes the identity of every row of `frame`, aligned with its row order.
///
/// A row with a null (or unparseable) `Date`, `Lat` or `Long` has no identity and
/// yields `None`: it can never be fetched, cached or joined.
pub fn row_keys(frame: &DataFrame) -> PolarsResult<Vec<Option<RowKey>>> {
    let dates = date_values(frame.column(DATE_COLUMN)?)?;
    let lat = frame.column(LAT_COLUMN)?.cast(&DataType::Float64)?;
    let lon = frame.column(LONG_COLUMN)?.cast(&DataType::Float64)?;

    Ok(dates
        .into_iter()
        .zip(lat.f64()?.into_iter())
        .zip(lon.f64()?.into_iter())
        .map(|((date, lat), lon)| match (date, lat, lon) {
            (Some(date), Some(lat), Some(lon)) => Some(RowKey::new(date, lat, lon)),
            _ => None,
        })
        .collect())
}

/// Brings the identity columns of a freshly parsed frame to their canonical types:
/// `Date` as the polars `Date` dtype and `Lat`/`Long` as `Float64`.
pub(crate) fn normalize_identity_columns(frame: &mut DataFrame) -> PolarsResult<()> {
    let days: Vec<Option<i32>> = date_values(frame.column(DATE_COLUMN)?)?
        .into_iter()
        .map(|d| d.map(date_to_days))
        .collect();
    let date = Column::new(DATE_COLUMN.into(), days).cast(&DataType::Date)?;
    let lat = frame.column(LAT_COLUMN)?.cast(&DataType::Float64)?;
    let lon = frame.column(LONG_COLUMN)?.cast(&DataType::Float64)?;

    frame.with_column(date)?;
    frame.with_column(lat)?;
    frame.with_column(lon)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_epoch_day_conversion() {
        assert_eq!(date_to_days(date(1970, 1, 1)), 0);
        assert_eq!(date_to_days(date(2020, 1, 22)), 18_283);
        assert_eq!(days_to_date(18_283), Some(date(2020, 1, 22)));
        assert_eq!(days_to_date(-1), Some(date(1969, 12, 31)));
    }

    #[test]
    fn test_row_keys_from_string_dates() -> PolarsResult<()> {
        let frame = df!(
            "Date" => ["2020-01-22", "2020-01-23"],
            "Lat" => [33.0, 41.1533],
            "Long" => [65.0, 20.1683],
            "Deaths" => [0i64, 1],
        )?;

        let keys = row_keys(&frame)?;
        assert_eq!(
            keys,
            vec![
                Some(RowKey::new(date(2020, 1, 22), 33.0, 65.0)),
                Some(RowKey::new(date(2020, 1, 23), 41.1533, 20.1683)),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_row_keys_skip_incomplete_rows() -> PolarsResult<()> {
        let frame = df!(
            "Date" => [Some("2020-01-22"), None, Some("not a date")],
            "Lat" => [Some(1.0), Some(2.0), Some(3.0)],
            "Long" => [None, Some(2.0), Some(3.0)],
        )?;

        assert_eq!(row_keys(&frame)?, vec![None, None, None]);
        Ok(())
    }

    #[test]
    fn test_integer_coordinates_match_float_coordinates() -> PolarsResult<()> {
        let frame = df!(
            "Date" => ["2020-02-01"],
            "Lat" => [10i64],
            "Long" => [-20i64],
        )?;

        let keys = row_keys(&frame)?;
        assert_eq!(keys, vec![Some(RowKey::new(date(2020, 2, 1), 10.0, -20.0))]);
        Ok(())
    }

    #[test]
    fn test_normalize_identity_columns() -> PolarsResult<()> {
        let mut frame = df!(
            "Date" => ["2020-01-22", "2020-01-23"],
            "Lat" => [33i64, 34],
            "Long" => [65.0, 66.0],
        )?;

        normalize_identity_columns(&mut frame)?;

        assert_eq!(frame.column("Date")?.dtype(), &DataType::Date);
        assert_eq!(frame.column("Lat")?.dtype(), &DataType::Float64);
        assert_eq!(
            row_keys(&frame)?,
            vec![
                Some(RowKey::new(date(2020, 1, 22), 33.0, 65.0)),
                Some(RowKey::new(date(2020, 1, 23), 34.0, 66.0)),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_row_keys_reject_non_date_column() -> PolarsResult<()> {
        let frame = df!(
            "Date" => [1.5f64],
            "Lat" => [1.0],
            "Long" => [1.0],
        )?;

        assert!(row_keys(&frame).is_err());
        Ok(())
    }
}
