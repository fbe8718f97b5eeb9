//! The incremental store of fetched weather records.

use crate::cache::error::CacheError;
use crate::cache::replace_file;
use crate::types::row_key::RowKey;
use crate::types::weather_record::{records_to_frame, WeatherRecord};
use crate::utils::{ensure_cache_dir_exists, file_modified};
use bincode::config::{Configuration, Fixint, LittleEndian};
use bincode::error::DecodeError;
use chrono::{DateTime, Local};
use log::{debug, info};
use polars::prelude::{DataFrame, PolarsResult};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const WEATHER_CACHE_FILE_NAME: &str = "weather.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Weather records keyed by identity, loaded once per run and persisted at most once.
///
/// The store is the only owner of cached records. It is mutated through
/// [`WeatherCache::append`] and written back through [`WeatherCache::persist`];
/// a dirty flag makes `persist` a no-op (no file system access at all) when nothing
/// was appended since the last load or write.
#[derive(Debug, Clone)]
pub struct WeatherCache {
    cache_dir: PathBuf,
    path: PathBuf,
    records: BTreeMap<RowKey, WeatherRecord>,
    existed: bool,
    dirty: bool,
}

impl WeatherCache {
    /// An empty, clean store backed by `cache_dir`. Nothing is read or created.
    pub fn empty(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            path: cache_dir.join(WEATHER_CACHE_FILE_NAME),
            records: BTreeMap::new(),
            existed: false,
            dirty: false,
        }
    }

    /// Loads the store persisted in `cache_dir`.
    ///
    /// A missing cache file yields an empty store. Any other read failure, and any
    /// file that fails to decode, is an error: a corrupt cache is never silently
    /// replaced.
    pub async fn load(cache_dir: &Path) -> Result<Self, CacheError> {
        let mut cache = Self::empty(cache_dir);

        let bytes = match tokio::fs::read(&cache.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No weather cache at {}, starting empty", cache.path.display());
                return Ok(cache);
            }
            Err(e) => return Err(CacheError::CacheRead(cache.path.clone(), e)),
        };

        let path = cache.path.clone();
        let records = tokio::task::spawn_blocking(move || Self::decode(&bytes, &path)).await??;
        debug!(
            "Read {} weather records from {}",
            records.len(),
            cache.path.display()
        );

        cache.records = records.into_iter().map(|r| (r.key(), r)).collect();
        cache.existed = true;
        Ok(cache)
    }

    fn decode(bytes: &[u8], path: &Path) -> Result<Vec<WeatherRecord>, CacheError> {
        let corrupt = |e: DecodeError| CacheError::CacheDecode(path.to_path_buf(), Box::new(e));
        let (records, read) =
            bincode::serde::decode_from_slice::<Vec<WeatherRecord>, _>(bytes, BINCODE_CONFIG)
                .map_err(corrupt)?;
        if read != bytes.len() {
            return Err(corrupt(DecodeError::Other("trailing bytes after cache records")));
        }
        Ok(records)
    }

    /// Returns the identities in `keys` that have no cached record, in their first
    /// order of appearance and without repeats.
    pub fn diff_against<'a>(&self, keys: impl IntoIterator<Item = &'a RowKey>) -> Vec<RowKey> {
        let mut seen = HashSet::new();
        keys.into_iter()
            .filter(|key| !self.records.contains_key(*key))
            .filter(|key| seen.insert(**key))
            .copied()
            .collect()
    }

    /// Adds `records`, replacing any cached record with the same identity.
    /// Marks the store dirty when at least one record was given.
    pub fn append(&mut self, records: Vec<WeatherRecord>) {
        if records.is_empty() {
            return;
        }
        for record in records {
            self.records.insert(record.key(), record);
        }
        self.dirty = true;
    }

    /// Writes every record back to the cache file if the store is dirty.
    ///
    /// Returns whether a write happened. The file is replaced atomically, so a
    /// failure leaves the previously persisted records in place.
    pub async fn persist(&mut self) -> Result<bool, CacheError> {
        if !self.dirty {
            debug!("Weather cache unchanged, skipping write");
            return Ok(false);
        }

        ensure_cache_dir_exists(&self.cache_dir)
            .await
            .map_err(|e| CacheError::CacheDirCreation(self.cache_dir.clone(), e))?;

        let records: Vec<WeatherRecord> = self.records.values().cloned().collect();
        let count = records.len();
        let cache_dir = self.cache_dir.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = bincode::serde::encode_to_vec(&records, BINCODE_CONFIG)
                .map_err(|e| CacheError::CacheEncode(Box::new(e)))?;
            replace_file(&cache_dir, &path, |file| {
                file.write_all(&bytes)
                    .map_err(|e| CacheError::CacheWrite(path.clone(), e))
            })
        })
        .await??;

        info!("Wrote {} weather records to {}", count, self.path.display());
        self.dirty = false;
        self.existed = true;
        Ok(true)
    }

    pub fn get(&self, key: &RowKey) -> Option<&WeatherRecord> {
        self.records.get(key)
    }

    /// Cached records, ordered by identity.
    pub fn records(&self) -> impl Iterator<Item = &WeatherRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a cache file backed this store when it was loaded (or has been
    /// written since).
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn modified(&self) -> Result<Option<DateTime<Local>>, CacheError> {
        file_modified(&self.path)
            .await
            .map_err(|e| CacheError::CacheMetadataRead(self.path.clone(), e))
    }

    /// All cached records as a table (see [`records_to_frame`]).
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let records: Vec<WeatherRecord> = self.records.values().cloned().collect();
        records_to_frame(&records)
    }
}
