use chrono::NaiveDate;
use covid19_weather::{
    join_enriched, plan_fetch, row_keys, CurrentConditions, RowKey, WeatherCache, WeatherRecord,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polars::prelude::*;
use std::path::Path;

const DAYS: i64 = 120;
const REGIONS: usize = 250;

fn source_frame() -> DataFrame {
    let start = NaiveDate::from_ymd_opt(2020, 1, 22).unwrap();
    let mut dates = Vec::new();
    let mut lats = Vec::new();
    let mut lons = Vec::new();
    let mut deaths = Vec::new();
    for day in 0..DAYS {
        let date = start + chrono::TimeDelta::days(day);
        for region in 0..REGIONS {
            dates.push(date.format("%Y-%m-%d").to_string());
            lats.push(region as f64 * 0.37 - 45.0);
            lons.push(region as f64 * 1.13 - 140.0);
            deaths.push(day * region as i64);
        }
    }
    df!("Date" => dates, "Lat" => lats, "Long" => lons, "Deaths" => deaths).unwrap()
}

/// A cache holding every identity of the first `cached_days` days.
fn cache_for(keys: &[Option<RowKey>], cached_days: i64) -> WeatherCache {
    let cutoff = NaiveDate::from_ymd_opt(2020, 1, 22).unwrap() + chrono::TimeDelta::days(cached_days);
    let mut cache = WeatherCache::empty(Path::new("unused"));
    cache.append(
        keys.iter()
            .flatten()
            .filter(|k| k.date < cutoff)
            .map(|k| {
                WeatherRecord::new(
                    *k,
                    CurrentConditions {
                        temperature: Some(12.5),
                        humidity: Some(0.6),
                        summary: Some("Partly Cloudy".to_string()),
                        ..Default::default()
                    },
                )
            })
            .collect(),
    );
    cache
}

fn bench_enrichment(c: &mut Criterion) {
    let source = source_frame();
    let keys = row_keys(&source).unwrap();
    let mostly_cached = cache_for(&keys, DAYS - 1);
    let fully_cached = cache_for(&keys, DAYS);

    c.bench_function("row_keys", |b| b.iter(|| row_keys(black_box(&source))));
    c.bench_function("plan_fetch_one_new_day", |b| {
        b.iter(|| plan_fetch(black_box(keys.iter().flatten()), &mostly_cached))
    });
    c.bench_function("join_enriched", |b| {
        b.iter(|| join_enriched(black_box(&source), &keys, &fully_cached))
    });
}

criterion_group!(benches, bench_enrichment);
criterion_main!(benches);
