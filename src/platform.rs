use std::fmt;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::error::ConfigurationError;

/// Operating systems a binary package is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Linux,
    Darwin,
    Windows,
}

/// Everything OS-specific the pipeline needs to know.
///
/// Built once by [`resolve_platform`]; the rest of the crate asks the
/// `Platform` instead of looking at the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub id: PlatformId,
    /// Extension of the toolchain download (`tar.gz` or `zip`).
    pub archive_suffix: &'static str,
    /// Suffix of this platform's binary package, as in `google-closure-compiler-<suffix>`.
    pub binary_suffix: &'static str,
    /// Extension of native executables, empty on unix.
    pub exe_extension: &'static str,
    /// Extension of the toolchain's launcher scripts (`gu`, `native-image`).
    pub script_extension: &'static str,
    pub path_separator: &'static str,
    /// OS name used in toolchain archive names.
    pub toolchain_os: &'static str,
}

const LINUX: Platform = Platform {
    id: PlatformId::Linux,
    archive_suffix: "tar.gz",
    binary_suffix: "linux",
    exe_extension: "",
    script_extension: "",
    path_separator: "/",
    toolchain_os: "linux",
};

const DARWIN: Platform = Platform {
    id: PlatformId::Darwin,
    archive_suffix: "tar.gz",
    binary_suffix: "osx",
    exe_extension: "",
    script_extension: "",
    path_separator: "/",
    toolchain_os: "darwin",
};

const WINDOWS: Platform = Platform {
    id: PlatformId::Windows,
    archive_suffix: "zip",
    binary_suffix: "windows",
    exe_extension: "exe",
    script_extension: "cmd",
    path_separator: "\\",
    toolchain_os: "windows",
};

/// Maps an OS identifier to its [`Platform`].
///
/// Accepts Rust's `std::env::consts::OS` names as well as the names other
/// tooling reports (`darwin`, `win32`).
///
/// # Errors
/// Returns [`ConfigurationError::UnsupportedPlatform`] for anything else.
pub fn resolve_platform(os: &str) -> Result<Platform, ConfigurationError> {
    match os {
        "linux" => Ok(LINUX),
        "macos" | "darwin" | "osx" => Ok(DARWIN),
        "windows" | "win32" => Ok(WINDOWS),
        _ => Err(ConfigurationError::UnsupportedPlatform(os.to_string())),
    }
}

/// Resolves the platform of the running host.
pub fn host_platform() -> Result<Platform, ConfigurationError> {
    resolve_platform(std::env::consts::OS)
}

impl Platform {
    /// File name of the compiler binary on this platform.
    pub fn compiler_binary(&self) -> String {
        self.executable("compiler")
    }

    /// Appends the executable extension to `stem`, if the platform has one.
    pub fn executable(&self, stem: &str) -> String {
        with_extension(stem, self.exe_extension)
    }

    /// Appends the launcher script extension to `stem`, if the platform has one.
    pub fn script(&self, stem: &str) -> String {
        with_extension(stem, self.script_extension)
    }

    /// Location of the toolchain's `bin` directory relative to its root.
    pub fn toolchain_bin_dir(&self) -> PathBuf {
        match self.id {
            PlatformId::Darwin => ["Contents", "Home", "bin"].iter().collect(),
            PlatformId::Linux | PlatformId::Windows => PathBuf::from("bin"),
        }
    }

    pub fn is_windows(&self) -> bool {
        self.id == PlatformId::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_suffix)
    }
}

fn with_extension(stem: &str, ext: &str) -> String {
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}
