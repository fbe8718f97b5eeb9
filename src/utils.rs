use chrono::{DateTime, Local};
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "covid19_weather_cache";

pub fn get_cache_dir() -> io::Result<PathBuf> {
    dirs::cache_dir()
        .map(|p| p.join(CACHE_DIR_NAME))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system cache directory",
            )
        })
}

pub async fn ensure_cache_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Cache path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating cache directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

/// Last modification time of `path`, or `None` if it does not exist.
pub async fn file_modified(path: &Path) -> io::Result<Option<DateTime<Local>>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(Some(DateTime::<Local>::from(metadata.modified()?))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_cache_dir_creates_nested() -> io::Result<()> {
        let temp = TempDir::new()?;
        let nested = temp.path().join("a").join("b");

        ensure_cache_dir_exists(&nested).await?;
        assert!(nested.is_dir());
        // Second call is a no-op.
        ensure_cache_dir_exists(&nested).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_cache_dir_rejects_file() -> io::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("not_a_dir");
        std::fs::write(&file, b"x")?;

        assert!(ensure_cache_dir_exists(&file).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_modified() -> io::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("blob.bin");
        assert!(file_modified(&file).await?.is_none());

        std::fs::write(&file, b"x")?;
        assert!(file_modified(&file).await?.is_some());
        Ok(())
    }
}
