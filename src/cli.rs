use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: ReleaseCommand,
}

/// Each step is driven by `release.toml` in the current directory and by the
/// CI environment (`GRAAL_URL`, `GITHUB_ACTOR`, `GITHUB_EVENT_NAME`, `GITHUB_SHA`).
#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum ReleaseCommand {
    /// Writes a default `release.toml` into the current directory
    Init {
        /// Base name of the npm packages
        #[arg(long, default_value = "google-closure-compiler")]
        name: String,
    },
    /// Downloads and installs the GraalVM toolchain into `temp/` unless it is already there
    FetchToolchain,
    /// Builds the native compiler for this platform into its package directory
    BuildNative,
    /// Copies `compiler.jar` into the java package and this platform's package
    Stage,
    /// Aligns every package version with the reference compiler and prints it
    SyncVersions,
    /// Syncs versions, then commits, tags and pushes the changed descriptors
    UpdateVersions,
    /// Commits and pushes the binaries built on this platform
    PushBinary,
    /// Checks the staged jar and native binary and runs the binary
    Verify,
}
