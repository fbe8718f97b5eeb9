//! Joins source rows with cached weather records.

use crate::cache::weather_cache::WeatherCache;
use crate::types::row_key::RowKey;
use crate::types::weather_record::{condition_columns, CurrentConditions};
use polars::prelude::*;

/// Inner-joins `source` with the weather records in `cache` on identity.
///
/// `keys` must be the identities of `source` as returned by
/// [`crate::row_keys`]. The result keeps the source row order and holds every
/// source column followed by every weather attribute. Source rows without a
/// cached record are dropped. Returns `None` when no row matched at all.
pub fn join_enriched(
    source: &DataFrame,
    keys: &[Option<RowKey>],
    cache: &WeatherCache,
) -> PolarsResult<Option<DataFrame>> {
    if keys.len() != source.height() {
        return Err(PolarsError::ShapeMismatch(
            format!(
                "{} identities for a source table of {} rows",
                keys.len(),
                source.height()
            )
            .into(),
        ));
    }

    let mut rows: Vec<IdxSize> = Vec::new();
    let mut conditions: Vec<&CurrentConditions> = Vec::new();
    for (idx, key) in keys.iter().enumerate() {
        if let Some(record) = key.as_ref().and_then(|k| cache.get(k)) {
            rows.push(idx as IdxSize);
            conditions.push(&record.conditions);
        }
    }

    if rows.is_empty() {
        return Ok(None);
    }

    let matched = source.take(&IdxCa::from_vec("rows".into(), rows))?;
    let enriched = matched.hstack(&condition_columns(&conditions))?;
    Ok(Some(enriched))
}
