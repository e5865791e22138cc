//! Error taxonomy for the release pipeline.
//!
//! Each pipeline component has its own error enum. They all convert into
//! [`ReleaseError`], which is what the CLI turns into a process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid input discovered before any side effect happens.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("malformed version `{version}` in {path}: {source}")]
    MalformedVersion {
        path: PathBuf,
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("could not read {path}: {message}")]
    InvalidFile { path: PathBuf, message: String },

    #[error("{descriptor} has no dependency named `{dependency}`")]
    MissingReference { descriptor: PathBuf, dependency: String },

    #[error("environment variable {0} is required here")]
    MissingEnv(&'static str),

    #[error("no package in release.toml targets platform {0}")]
    NoPlatformPackage(String),
}

/// Download, extraction or installation of the toolchain failed.
#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("archive digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("could not extract {archive}: {message}")]
    Extract { archive: PathBuf, message: String },

    #[error("`{command}` exited with {status}")]
    Install { command: String, status: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Native image generation failed.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("toolchain smoke test failed at {step}: {message}")]
    SmokeTest { step: &'static str, message: String },

    #[error("native-image exited with {0}")]
    NativeImage(String),

    #[error("native-image succeeded but {0} was not produced")]
    MissingOutput(PathBuf),

    #[error("could not launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copying an artifact into a package directory failed.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("artifact not found: {0}")]
    MissingSource(PathBuf),

    #[error("could not copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start copy workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A git operation failed.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("`git {args}` failed: {stderr}")]
    Git { args: String, stderr: String },

    #[error("could not run git: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A staged artifact is missing or does not run.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("{0} does not exist")]
    Missing(PathBuf),

    #[error("`{binary} {args}` exited with {status}")]
    Execution {
        binary: PathBuf,
        args: String,
        status: String,
    },

    #[error("could not launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ReleaseError> = std::result::Result<T, E>;
