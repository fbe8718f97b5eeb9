//! Durable artifacts of a run: the weather record cache and the last enriched table.
//!
//! Both are single blobs in the cache folder, read and replaced wholesale. Writes go
//! to a temporary file in the same folder which is then renamed over the target, so
//! a failed write leaves the previous blob untouched.

pub mod enriched_store;
pub mod error;
pub mod weather_cache;

use crate::cache::error::CacheError;
use std::fs::File;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces `path` with whatever `write` puts into a fresh file in `dir`.
fn replace_file(
    dir: &Path,
    path: &Path,
    write: impl FnOnce(&mut File) -> Result<(), CacheError>,
) -> Result<(), CacheError> {
    let io_err = |e| CacheError::CacheWrite(path.to_path_buf(), e);

    let mut temp = NamedTempFile::new_in(dir).map_err(io_err)?;
    write(temp.as_file_mut())?;
    temp.as_file_mut().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
