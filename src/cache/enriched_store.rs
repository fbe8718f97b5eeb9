use crate::cache::error::CacheError;
use crate::cache::replace_file;
use crate::utils::{ensure_cache_dir_exists, file_modified};
use chrono::{DateTime, Local};
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};

pub const ENRICHED_FILE_NAME: &str = "covid_weather_data.parquet";

/// The most recent enriched table, persisted as parquet.
///
/// Its modification time is the freshness signal shown next to the table, so it is
/// only rewritten when the underlying weather data changed.
#[derive(Debug, Clone)]
pub struct EnrichedStore {
    cache_dir: PathBuf,
    path: PathBuf,
}

impl EnrichedStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            path: cache_dir.join(ENRICHED_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.path).await.is_ok()
    }

    /// Atomically replaces the persisted table with `frame`.
    pub async fn write(&self, mut frame: DataFrame) -> Result<(), CacheError> {
        ensure_cache_dir_exists(&self.cache_dir)
            .await
            .map_err(|e| CacheError::CacheDirCreation(self.cache_dir.clone(), e))?;

        let cache_dir = self.cache_dir.clone();
        let path = self.path.clone();
        let rows = frame.height();
        tokio::task::spawn_blocking(move || {
            replace_file(&cache_dir, &path, |file| {
                ParquetWriter::new(file)
                    .with_compression(ParquetCompression::Snappy)
                    .finish(&mut frame)
                    .map_err(|e| CacheError::ParquetWrite(path.clone(), e))?;
                Ok(())
            })
        })
        .await??;

        info!("Wrote {} enriched rows to {}", rows, self.path.display());
        Ok(())
    }

    /// Reads the persisted table back, or `None` if it was never written.
    pub async fn load(&self) -> Result<Option<DataFrame>, CacheError> {
        if !self.exists().await {
            return Ok(None);
        }
        let path = self.path.clone();
        let frame = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path)
                .map_err(|e| CacheError::CacheRead(path.clone(), e))?;
            ParquetReader::new(file)
                .finish()
                .map_err(|e| CacheError::ParquetRead(path, e))
        })
        .await??;
        Ok(Some(frame))
    }

    pub async fn modified(&self) -> Result<Option<DateTime<Local>>, CacheError> {
        file_modified(&self.path)
            .await
            .map_err(|e| CacheError::CacheMetadataRead(self.path.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_load() -> Result<(), CacheError> {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let store = EnrichedStore::new(&temp.path().join("nested"));
        assert!(store.load().await?.is_none());
        assert!(store.modified().await?.is_none());

        let frame = df!(
            "Country/Region" => ["Afghanistan", "Albania"],
            "Deaths" => [0i64, 2],
            "temperature" => [Some(41.2), None],
        )
        .expect("Failed to build frame");
        store.write(frame.clone()).await?;

        assert!(store.exists().await);
        assert!(store.modified().await?.is_some());
        let loaded = store.load().await?.expect("Enriched table should exist");
        assert!(loaded.equals_missing(&frame));
        Ok(())
    }
}
