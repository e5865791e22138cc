//! # compiler-release Core Library
//!
//! This crate holds the release pipeline of the Closure Compiler npm packages: a main package,
//! a java package carrying `compiler.jar`, and one native package per operating system.
//!
//! A CI job runs the `compiler-release` binary step by step. It fetches a GraalVM toolchain,
//! compiles the jar into a native executable, stages the artifacts into their packages,
//! keeps every package version in step with the upstream compiler and publishes the result
//! through git.
//!
//! ## Modules Overview
//! - [`platform`] – OS-specific names and suffixes, resolved once
//! - [`config`] – Run configuration read from the CI environment
//! - [`manifest`] – The `release.toml` describing the package set
//! - [`archive`] – Downloading, digest checks and archive extraction
//! - [`toolchain`] – Idempotent GraalVM installation
//! - [`native_image`] – Smoke test and native-image invocation
//! - [`stage`] / [`pool`] – Copying artifacts with bounded concurrency
//! - [`descriptor`] / [`versions`] – `package.json` editing and version synchronization
//! - [`git`] / [`publish`] – Commit, tag and push with retry
//! - [`verify`] – Checks on the staged artifacts
//! - [`global`] – Per-user cache of downloaded archives

pub mod archive;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod git;
pub mod global;
pub mod manifest;
pub mod native_image;
pub mod platform;
pub mod pool;
pub mod publish;
pub mod stage;
pub mod toolchain;
pub mod verify;
pub mod versions;

pub use error::{ReleaseError, Result};
pub use manifest::ReleaseManifest;
pub use platform::{host_platform, resolve_platform, Platform};
pub use versions::{SyncOutcome, VersionSynchronizer};
