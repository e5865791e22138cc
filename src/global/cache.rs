use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::{debug, info};

/// Returns the cached copy of `file_name` if one exists in `cache_dir`.
pub fn get_cached_archive(cache_dir: &Path, file_name: &str) -> Option<PathBuf> {
    let archive_path = cache_dir.join(file_name);
    if archive_path.is_file() {
        debug!("found cached archive {}", archive_path.display());
        Some(archive_path)
    }
    else {
        None
    }
}

/// Copies a downloaded archive into `cache_dir` so later runs on this machine
/// can skip the download.
pub fn cache_archive(cache_dir: &Path, archive: &Path) -> Result<PathBuf> {
    if !cache_dir.exists() {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Could not create cache dir {:?}", cache_dir))?;
        info!("Cache directory created: {}", cache_dir.display());
    }
    let file_name = archive.file_name()
        .with_context(|| format!("Could not determine archive name of {:?}", archive))?;
    let path = cache_dir.join(file_name);
    // Copied under a temporary name so a half written file is never found.
    let mut partial = tempfile::NamedTempFile::new_in(cache_dir)?;
    std::io::copy(&mut std::fs::File::open(archive)?, partial.as_file_mut())
        .with_context(|| format!("Could not create cache file {:?}", path))?;
    partial.persist(&path)
        .with_context(|| format!("Could not create cache file {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cache_round_trip() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("graal.tar.gz");
        std::fs::write(&archive, b"archive").unwrap();
        let cache_dir = dir.path().join("cache");

        assert!(get_cached_archive(&cache_dir, "graal.tar.gz").is_none());
        let cached = cache_archive(&cache_dir, &archive).unwrap();
        assert_eq!(get_cached_archive(&cache_dir, "graal.tar.gz"), Some(cached));
    }
}
