use std::path::{Path, PathBuf};
use tracing::info;
use crate::error::{ConfigurationError, StageError};
use crate::manifest::ReleaseManifest;
use crate::platform::Platform;
use crate::pool::run_bounded;

/// One built artifact and every package directory it belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEntry {
    pub source: PathBuf,
    pub destinations: Vec<PathBuf>,
}

/// Copies `compiler.jar` into the java package and the host platform package.
pub fn default_plan(manifest: &ReleaseManifest, platform: &Platform, repo_root: &Path) -> Result<Vec<StageEntry>, ConfigurationError> {
    let mut destinations = Vec::new();
    if let Some(java) = manifest.java_package() {
        destinations.push(repo_root.join(&java.dir));
    }
    destinations.push(repo_root.join(&manifest.platform_package(platform)?.dir));
    Ok(vec![StageEntry {
        source: repo_root.join(&manifest.build.intermediate),
        destinations,
    }])
}

/// Copies each entry's source into each of its destination directories.
///
/// Every source is checked before anything is copied. Copies then run on at
/// most `concurrency` threads. Returns the written paths in plan order.
///
/// # Errors
/// [`StageError::MissingSource`] or [`StageError::Copy`], naming the path,
/// and [`StageError::Pool`] when the worker threads can't be started.
pub fn stage_artifacts(plan: &[StageEntry], concurrency: usize) -> Result<Vec<PathBuf>, StageError> {
    if let Some(missing) = plan.iter().find(|entry| !entry.source.is_file()) {
        return Err(StageError::MissingSource(missing.source.clone()));
    }

    let copies: Vec<(&Path, PathBuf)> = plan
        .iter()
        .flat_map(|entry| {
            let file_name = entry.source.file_name().unwrap_or_default();
            entry.destinations.iter().map(move |dir| (entry.source.as_path(), dir.join(file_name)))
        })
        .collect();

    run_bounded(copies, concurrency, |(from, to)| {
        std::fs::copy(from, &to).map_err(|source| StageError::Copy {
            from: from.to_path_buf(),
            to: to.clone(),
            source,
        })?;
        info!("Copied {} to {}", from.display(), to.display());
        Ok(to)
    })?
    .into_iter()
    .collect()
}
