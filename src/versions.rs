//! Keeping the version of every package in the release in step.
//!
//! All packages follow the major version of the upstream compiler. When the
//! upstream moves to a new major, every package resets to `{major}.0.0`.
//! Otherwise a package that still carries the last released version gets a
//! patch bump, and one that is already past it is left as is. Running the
//! synchronizer again therefore changes nothing.

use std::path::{Path, PathBuf};
use semver::{Version, VersionReq};
use tracing::{debug, info};
use crate::descriptor::PackageDescriptor;
use crate::error::{ConfigurationError, Result};
use crate::manifest::{PinStyle, Reference};

/// The outcome of a synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The version every package now carries.
    pub version: Version,
    /// Descriptors whose contents were rewritten.
    pub written: Vec<PathBuf>,
}

impl SyncOutcome {
    /// The release tag for [`Self::version`].
    pub fn tag(&self) -> String {
        release_tag(&self.version)
    }
}

pub fn release_tag(version: &Version) -> String {
    format!("v{version}")
}

/// Reads the major version of the reference dependency.
///
/// The dependency is declared with a range such as `^20200517.0.0`; its first
/// comparator decides the major.
pub fn reference_major(repo_root: &Path, reference: &Reference) -> Result<u64> {
    let path = repo_root.join(&reference.descriptor);
    let descriptor = PackageDescriptor::load(&path)?;
    let range = descriptor.dependency(&reference.dependency).ok_or_else(|| {
        ConfigurationError::MissingReference {
            descriptor: path.clone(),
            dependency: reference.dependency.clone(),
        }
    })?;
    let req = VersionReq::parse(range).map_err(|source| ConfigurationError::MalformedVersion {
        path: path.clone(),
        version: range.to_string(),
        source,
    })?;
    let major = req.comparators.first().map(|c| c.major).ok_or_else(|| {
        ConfigurationError::MissingReference {
            descriptor: path,
            dependency: reference.dependency.clone(),
        }
    })?;
    Ok(major)
}

/// The version a package should move to.
///
/// `released` is the version of the last published release, if any.
pub fn next_version(current: &Version, reference_major: u64, released: Option<&Version>) -> Version {
    if current.major < reference_major {
        return Version::new(reference_major, 0, 0);
    }
    if current.major == reference_major && released.is_some_and(|r| r == current) {
        return Version::new(current.major, current.minor, current.patch + 1);
    }
    current.clone()
}

/// How a dependency on `version` is written.
pub fn format_range(version: &Version, pin: PinStyle) -> String {
    match pin {
        PinStyle::Exact => version.to_string(),
        PinStyle::Caret => format!("^{version}"),
    }
}

pub struct VersionSynchronizer {
    descriptors: Vec<PathBuf>,
    pin: PinStyle,
}

impl VersionSynchronizer {
    pub fn new(descriptors: Vec<PathBuf>, pin: PinStyle) -> Self {
        Self { descriptors, pin }
    }

    /// Brings every descriptor to one agreed version and pins the packages'
    /// references to each other to it.
    ///
    /// All descriptors are loaded and validated before any of them is
    /// written, so a malformed one leaves every file untouched.
    pub fn synchronize_versions(&self, reference_major: u64, released: Option<&Version>) -> Result<SyncOutcome> {
        let mut packages = self
            .descriptors
            .iter()
            .map(PackageDescriptor::load)
            .collect::<Result<Vec<_>, _>>()?;

        let version = packages
            .iter()
            .map(|p| next_version(&p.version, reference_major, released))
            .max()
            .unwrap_or_else(|| Version::new(reference_major, 0, 0));
        info!("Synchronizing {} packages to {}", packages.len(), version);

        let names: Vec<String> = packages.iter().map(|p| p.name.clone()).collect();
        let range = format_range(&version, self.pin);
        for package in &mut packages {
            if package.version != version {
                debug!("{}: {} -> {}", package.name, package.version, version);
                package.set_version(&version);
            }
            for name in &names {
                package.update_dependency(name, &range);
            }
        }

        let mut written = Vec::new();
        for package in &mut packages {
            if package.save()? {
                info!("Updated {}", package.path.display());
                written.push(package.path.clone());
            }
        }
        if written.is_empty() {
            info!("All versions are up to date.");
        }
        Ok(SyncOutcome { version, written })
    }
}
