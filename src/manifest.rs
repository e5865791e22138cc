use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::ConfigurationError;
use crate::platform::{Platform, PlatformId};

pub const MANIFEST_FILE: &str = "release.toml";

/// Represents the contents of a `release.toml` file.
///
/// Lists the packages that are released together, where the reference
/// compiler version comes from and which toolchain builds the native images.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReleaseManifest {
    pub project: Project,
    pub reference: Reference,
    pub toolchain: ToolchainSpec,
    #[serde(default)]
    pub build: BuildPaths,
    #[serde(default)]
    pub versions: VersionSettings,
    /// Tracked packages, in the order their descriptors are processed.
    #[serde(rename = "package", default)]
    pub packages: Vec<PackageEntry>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
}

/// The dependency whose major version every package follows.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Reference {
    /// Descriptor declaring the dependency, relative to the repository root.
    pub descriptor: PathBuf,
    pub dependency: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ToolchainSpec {
    /// Distribution prefix of the archive, e.g. `graalvm-ce-java8`.
    pub distribution: String,
    pub version: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct BuildPaths {
    /// The prebuilt jar the native image is generated from.
    pub intermediate: PathBuf,
    pub reflection_config: PathBuf,
}

impl Default for BuildPaths {
    fn default() -> Self {
        Self {
            intermediate: PathBuf::from("dist").join("compiler.jar"),
            reflection_config: PathBuf::from("build").join("reflection-config.json"),
        }
    }
}

/// How a synchronized version is written into dependency maps.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PinStyle {
    /// `"5.0.0"`
    #[default]
    Exact,
    /// `"^5.0.0"`
    Caret,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct VersionSettings {
    #[serde(default)]
    pub pin: PinStyle,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// The package users install; depends on the others.
    Main,
    /// Carries `compiler.jar`.
    Java,
    /// Carries the native binary for one platform.
    Native,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PackageEntry {
    /// Package directory relative to the repository root.
    pub dir: PathBuf,
    pub kind: PackageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformId>,
}

impl PackageEntry {
    pub fn descriptor_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.dir).join("package.json")
    }
}

impl ReleaseManifest {
    /// The package layout used by the closure compiler npm distribution.
    pub fn default(name: &str) -> ReleaseManifest {
        let package = |suffix: &str, kind: PackageKind, platform: Option<PlatformId>| PackageEntry {
            dir: PathBuf::from("packages").join(format!("{name}{suffix}")),
            kind,
            platform,
        };
        ReleaseManifest {
            project: Project { name: name.to_string() },
            reference: Reference {
                descriptor: PathBuf::from("package.json"),
                dependency: format!("{name}-java"),
            },
            toolchain: ToolchainSpec {
                distribution: String::from("graalvm-ce-java8"),
                version: String::from("20.1.0"),
            },
            build: BuildPaths::default(),
            versions: VersionSettings::default(),
            packages: vec![
                package("", PackageKind::Main, None),
                package("-java", PackageKind::Java, None),
                package("-linux", PackageKind::Native, Some(PlatformId::Linux)),
                package("-osx", PackageKind::Native, Some(PlatformId::Darwin)),
                package("-windows", PackageKind::Native, Some(PlatformId::Windows)),
            ],
        }
    }

    /// Loads a `ReleaseManifest` from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidFile`] if the file can't be read or deserialized.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ReleaseManifest, ConfigurationError> {
        let path = path.as_ref();
        let invalid = |message: String| ConfigurationError::InvalidFile {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        toml::from_str(&content).map_err(|e| invalid(e.to_string()))
    }

    /// Saves the manifest to the given file path in pretty TOML format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// The package carrying the native binary for `platform`.
    pub fn platform_package(&self, platform: &Platform) -> Result<&PackageEntry, ConfigurationError> {
        self.packages
            .iter()
            .find(|p| p.kind == PackageKind::Native && p.platform == Some(platform.id))
            .ok_or_else(|| ConfigurationError::NoPlatformPackage(platform.to_string()))
    }

    pub fn java_package(&self) -> Option<&PackageEntry> {
        self.packages.iter().find(|p| p.kind == PackageKind::Java)
    }

    /// Descriptor paths of every tracked package, in manifest order.
    pub fn descriptor_paths(&self, repo_root: &Path) -> Vec<PathBuf> {
        self.packages.iter().map(|p| p.descriptor_path(repo_root)).collect()
    }
}
