//! Local GraalVM installation management.
//!
//! The toolchain is several hundred megabytes per platform, so it is
//! downloaded once into the work directory and reused by every later run.
//! A partially extracted tree is never repaired automatically: delete the
//! directory and run again.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};
use crate::archive::{extract_archive, verify_digest, Downloader};
use crate::config::ReleaseConfig;
use crate::error::ToolchainError;
use crate::global::cache::{cache_archive, get_cached_archive};
use crate::manifest::ToolchainSpec;
use crate::platform::Platform;

/// How far an installation has progressed on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Absent,
    /// The archive is being fetched. Only seen while `ensure_toolchain` runs;
    /// an interrupted download leaves nothing behind.
    Downloading,
    /// The archive was unpacked but `native-image` was never installed.
    Extracted,
    ToolInstalled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainInstallation {
    pub version: String,
    pub root: PathBuf,
    pub state: InstallState,
}

impl ToolchainInstallation {
    pub fn bin_dir(&self, platform: &Platform) -> PathBuf {
        self.root.join(platform.toolchain_bin_dir())
    }

    /// Path of a launcher script in the toolchain's `bin` directory.
    pub fn tool(&self, platform: &Platform, name: &str) -> PathBuf {
        self.bin_dir(platform).join(platform.script(name))
    }

    /// Path of a native executable in the toolchain's `bin` directory.
    pub fn executable(&self, platform: &Platform, name: &str) -> PathBuf {
        self.bin_dir(platform).join(platform.executable(name))
    }
}

pub struct ToolchainFetcher<'a, D: Downloader> {
    platform: Platform,
    config: &'a ReleaseConfig,
    distribution: String,
    downloader: D,
}

impl<'a, D: Downloader> ToolchainFetcher<'a, D> {
    pub fn new(platform: Platform, config: &'a ReleaseConfig, spec: &ToolchainSpec, downloader: D) -> Self {
        Self {
            platform,
            config,
            distribution: spec.distribution.clone(),
            downloader,
        }
    }

    /// Directory the archive for `version` unpacks to.
    pub fn root_dir(&self, version: &str) -> PathBuf {
        self.config.work_dir.join(format!("{}-{}", self.distribution, version))
    }

    pub fn archive_name(&self, version: &str) -> String {
        format!(
            "{}-{}-amd64-{}.{}",
            self.distribution, self.platform.toolchain_os, version, self.platform.archive_suffix
        )
    }

    /// The download address, unless the configuration overrides it.
    pub fn download_url(&self, version: &str) -> String {
        match &self.config.toolchain_url {
            Some(url) => url.clone(),
            None => format!(
                "https://github.com/graalvm/graalvm-ce-builds/releases/download/vm-{}/{}",
                version,
                self.archive_name(version)
            ),
        }
    }

    /// Looks at the disk without changing anything.
    pub fn inspect(&self, version: &str) -> ToolchainInstallation {
        let root = self.root_dir(version);
        let mut installation = ToolchainInstallation {
            version: version.to_string(),
            root,
            state: InstallState::Absent,
        };
        installation.state = if installation.root.is_dir() {
            if installation.tool(&self.platform, "native-image").exists() {
                InstallState::ToolInstalled
            } else {
                InstallState::Extracted
            }
        } else {
            InstallState::Absent
        };
        installation
    }

    /// Makes sure the toolchain `version` is installed in the work directory.
    ///
    /// Returns immediately, without touching the network, when its root
    /// directory already exists.
    ///
    /// # Errors
    /// Any download, digest, extraction or `gu install` failure. Partial
    /// state is left on disk.
    pub fn ensure_toolchain(&self, version: &str) -> Result<ToolchainInstallation, ToolchainError> {
        let mut installation = self.inspect(version);
        match installation.state {
            InstallState::ToolInstalled => {
                info!("Toolchain {} already present at {}", version, installation.root.display());
                return Ok(installation);
            }
            InstallState::Extracted => {
                warn!(
                    "{} exists but native-image is missing; remove the directory to reinstall",
                    installation.root.display()
                );
                return Ok(installation);
            }
            InstallState::Absent | InstallState::Downloading => {}
        }

        if !self.config.work_dir.exists() {
            std::fs::create_dir_all(&self.config.work_dir)?;
            info!("Created directory at {}", self.config.work_dir.display());
        }

        installation.state = InstallState::Downloading;
        let archive = self.fetch_archive(version)?;

        extract_archive(&archive, &self.config.work_dir)?;
        if !installation.root.is_dir() {
            return Err(ToolchainError::Extract {
                archive,
                message: format!("archive did not contain {}", installation.root.display()),
            });
        }
        installation.state = InstallState::Extracted;

        let gu = installation.tool(&self.platform, "gu");
        run_install(&gu, &["install", "native-image"])?;
        installation.state = InstallState::ToolInstalled;
        info!("Toolchain {} installed at {}", version, installation.root.display());
        Ok(installation)
    }

    fn archive_path(&self, version: &str) -> PathBuf {
        self.config.work_dir.join(self.archive_name(version))
    }

    fn check_digest(&self, archive: &Path) -> Result<(), ToolchainError> {
        match &self.config.toolchain_sha256 {
            Some(expected) => verify_digest(archive, expected),
            None => Ok(()),
        }
    }

    /// Reuses an archive from the work directory or the shared cache before
    /// downloading.
    ///
    /// Whatever the source, the archive is checked against the configured
    /// digest before it is returned, and only a checked download enters the
    /// shared cache.
    fn fetch_archive(&self, version: &str) -> Result<PathBuf, ToolchainError> {
        let archive = self.archive_path(version);
        if archive.is_file() {
            info!("Reusing {}", archive.display());
            self.check_digest(&archive)?;
            return Ok(archive);
        }
        let file_name = self.archive_name(version);
        if let Some(cached) = self.config.archive_cache.as_deref().and_then(|dir| get_cached_archive(dir, &file_name)) {
            info!("Copying cached archive {}", cached.display());
            let mut partial = tempfile::NamedTempFile::new_in(&self.config.work_dir)?;
            std::io::copy(&mut std::fs::File::open(&cached)?, partial.as_file_mut())?;
            partial.persist(&archive).map_err(|e| e.error)?;
            self.check_digest(&archive)?;
            return Ok(archive);
        }

        self.downloader.download(&self.download_url(version), &archive)?;
        self.check_digest(&archive)?;
        if let Some(cache_dir) = &self.config.archive_cache {
            if let Err(e) = cache_archive(cache_dir, &archive) {
                warn!("Could not cache {}: {e:#}", archive.display());
            }
        }
        Ok(archive)
    }
}

fn run_install(program: &Path, args: &[&str]) -> Result<(), ToolchainError> {
    let command = format!("{} {}", program.display(), args.join(" "));
    info!("Running {command}");
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| ToolchainError::Install {
            command: command.clone(),
            status: e.to_string(),
        })?;
    if !status.success() {
        return Err(ToolchainError::Install {
            command,
            status: status.to_string(),
        });
    }
    Ok(())
}
