//! Decides which source identities need a weather fetch.

use crate::cache::weather_cache::WeatherCache;
use crate::types::row_key::RowKey;

/// What the fetch stage has to do for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Every source identity already has a cached record.
    UpToDate,
    /// Distinct identities without a cached record, in source order.
    Fetch(Vec<RowKey>),
}

impl FetchPlan {
    pub fn len(&self) -> usize {
        match self {
            FetchPlan::UpToDate => 0,
            FetchPlan::Fetch(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compares the source identities against the cache.
///
/// With an empty cache every distinct source identity is planned; when nothing is
/// missing the plan is [`FetchPlan::UpToDate`] and the fetch stage is skipped.
pub fn plan_fetch<'a>(
    source_keys: impl IntoIterator<Item = &'a RowKey>,
    cache: &WeatherCache,
) -> FetchPlan {
    let missing = cache.diff_against(source_keys);
    if missing.is_empty() {
        FetchPlan::UpToDate
    } else {
        FetchPlan::Fetch(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::weather_record::{CurrentConditions, WeatherRecord};
    use chrono::NaiveDate;
    use std::path::Path;

    fn key(day: u32, lat: f64) -> RowKey {
        RowKey::new(NaiveDate::from_ymd_opt(2020, 2, day).unwrap(), lat, 10.0)
    }

    fn cache_with(keys: &[RowKey]) -> WeatherCache {
        let mut cache = WeatherCache::empty(Path::new("unused"));
        cache.append(
            keys.iter()
                .map(|k| WeatherRecord::new(*k, CurrentConditions::default()))
                .collect(),
        );
        cache
    }

    #[test]
    fn test_empty_cache_plans_every_distinct_key() {
        let source = vec![key(1, 1.0), key(2, 1.0), key(1, 1.0)];
        let plan = plan_fetch(&source, &cache_with(&[]));
        assert_eq!(plan, FetchPlan::Fetch(vec![key(1, 1.0), key(2, 1.0)]));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_fully_cached_source_is_up_to_date() {
        let source = vec![key(1, 1.0), key(2, 1.0)];
        let plan = plan_fetch(&source, &cache_with(&source));
        assert_eq!(plan, FetchPlan::UpToDate);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_partial_cache_plans_only_missing() {
        let source = vec![key(1, 1.0), key(2, 1.0), key(3, 1.0)];
        let cache = cache_with(&[key(2, 1.0), key(9, 9.0)]);
        assert_eq!(
            plan_fetch(&source, &cache),
            FetchPlan::Fetch(vec![key(1, 1.0), key(3, 1.0)])
        );
    }

    #[test]
    fn test_diff_matches_set_difference() {
        // Exhaustive over a small grid: the plan is exactly {s in S : s not in C}.
        let universe: Vec<RowKey> = (1..=4)
            .flat_map(|d| [0.5, 1.5].into_iter().map(move |lat| key(d, lat)))
            .collect();
        for mask in 0u32..(1 << universe.len()) {
            let cached: Vec<RowKey> = universe
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| *k)
                .collect();
            let expected: Vec<RowKey> = universe
                .iter()
                .filter(|k| !cached.contains(*k))
                .copied()
                .collect();

            let plan = plan_fetch(&universe, &cache_with(&cached));
            match plan {
                FetchPlan::UpToDate => assert!(expected.is_empty()),
                FetchPlan::Fetch(keys) => assert_eq!(keys, expected),
            }
        }
    }
}
