use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use compiler_release::archive::HttpDownloader;
use compiler_release::config::{CiEvent, ReleaseConfig};
use compiler_release::descriptor::PackageDescriptor;
use compiler_release::error::ConfigurationError;
use compiler_release::git::GitCli;
use compiler_release::manifest::{ReleaseManifest, MANIFEST_FILE};
use compiler_release::native_image::{default_directives, NativeImageBuilder};
use compiler_release::platform::{host_platform, Platform};
use compiler_release::publish::{binaries_request, release_request, Coordinator, PublishReport};
use compiler_release::stage::{default_plan, stage_artifacts};
use compiler_release::toolchain::{ToolchainFetcher, ToolchainInstallation};
use compiler_release::verify::{jar_path, verify_release};
use compiler_release::versions::{reference_major, SyncOutcome, VersionSynchronizer};
use tracing::info;
use crate::cli::{ReleaseCommand, CLI};

/// Everything a step needs, resolved once before it runs.
struct Session {
    config: ReleaseConfig,
    manifest: ReleaseManifest,
    platform: Platform,
}

impl Session {
    fn load() -> Result<Session> {
        let cwd = std::env::current_dir()?;
        let manifest = ReleaseManifest::load(cwd.join(MANIFEST_FILE))
            .context("release.toml not found or invalid. Run `compiler-release init` to create one.")?;
        let platform = host_platform()?;
        let config = ReleaseConfig::from_env(cwd);
        Ok(Session { config, manifest, platform })
    }

    fn root(&self) -> &PathBuf {
        &self.config.repo_root
    }

    fn native_binary(&self) -> Result<PathBuf> {
        let package = self.manifest.platform_package(&self.platform)?;
        Ok(self.root().join(&package.dir).join(self.platform.compiler_binary()))
    }

    fn java_jar(&self) -> Option<PathBuf> {
        self.manifest.java_package().map(|java| jar_path(&self.root().join(&java.dir)))
    }

    /// Fails before any file is touched when a pull request run lacks its base commit.
    fn require_publish_context(&self) -> Result<()> {
        if self.config.event == CiEvent::PullRequest && self.config.base_sha.is_none() {
            return Err(ConfigurationError::MissingEnv("GITHUB_SHA").into());
        }
        Ok(())
    }
}

pub fn execute(cli: CLI) -> Result<ExitCode> {
    match cli.command {
        ReleaseCommand::Init { name } => {
            execute_init(&name)?;
            Ok(ExitCode::SUCCESS)
        }
        ReleaseCommand::FetchToolchain => {
            execute_fetch_toolchain(&Session::load()?)?;
            Ok(ExitCode::SUCCESS)
        }
        ReleaseCommand::BuildNative => {
            execute_build_native(&Session::load()?)
        }
        ReleaseCommand::Stage => {
            execute_stage(&Session::load()?)
        }
        ReleaseCommand::SyncVersions => {
            let outcome = execute_sync(&Session::load()?)?;
            println!("{}", outcome.version);
            Ok(ExitCode::SUCCESS)
        }
        ReleaseCommand::UpdateVersions => {
            execute_update_versions(&Session::load()?)
        }
        ReleaseCommand::PushBinary => {
            execute_push_binary(&Session::load()?)
        }
        ReleaseCommand::Verify => {
            execute_verify(&Session::load()?)
        }
    }
}

fn execute_init(name: &str) -> Result<()> {
    let path = std::env::current_dir()?.join(MANIFEST_FILE);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    ReleaseManifest::default(name).save(&path)?;
    success(&format!("Created {}", path.display()));
    Ok(())
}

fn success(message: &str) {
    println!("{} {}", "SUCCESS:".green(), message);
}

fn exit_code(report: &PublishReport) -> ExitCode {
    info!("Publish finished in state {:?}", report.state);
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn execute_fetch_toolchain(session: &Session) -> Result<ToolchainInstallation> {
    let toolchain = &session.manifest.toolchain;
    let fetcher = ToolchainFetcher::new(session.platform, &session.config, toolchain, HttpDownloader::new());
    let installation = fetcher.ensure_toolchain(&toolchain.version)?;
    success(&format!("Toolchain ready at {}", installation.root.display().to_string().cyan()));
    Ok(installation)
}

fn execute_build_native(session: &Session) -> Result<ExitCode> {
    let installation = execute_fetch_toolchain(session)?;
    let root = session.root();
    let package = session.manifest.platform_package(&session.platform)?;
    let directives = default_directives(&root.join(&session.manifest.build.reflection_config));
    let builder = NativeImageBuilder::new(session.platform, &installation);
    let binary = builder.build_native_image(
        &root.join(&session.manifest.build.intermediate),
        &directives,
        &root.join(&package.dir),
    )?;
    success(&format!("Generated native compiler {}", binary.display().to_string().cyan()));
    Ok(ExitCode::SUCCESS)
}

fn execute_stage(session: &Session) -> Result<ExitCode> {
    let plan = default_plan(&session.manifest, &session.platform, session.root())?;
    let written = stage_artifacts(&plan, session.config.copy_concurrency)?;
    success(&format!("Copied compiler to {} package(s)", written.len()));
    Ok(ExitCode::SUCCESS)
}

fn execute_sync(session: &Session) -> Result<SyncOutcome> {
    let root = session.root();
    let major = reference_major(root, &session.manifest.reference)?;
    let released = GitCli::new(root).latest_release()?;
    info!("Reference major {major}, last release {:?}", released.as_ref().map(ToString::to_string));
    let synchronizer = VersionSynchronizer::new(
        session.manifest.descriptor_paths(root),
        session.manifest.versions.pin,
    );
    Ok(synchronizer.synchronize_versions(major, released.as_ref())?)
}

fn execute_update_versions(session: &Session) -> Result<ExitCode> {
    session.require_publish_context()?;
    let outcome = execute_sync(session)?;
    let request = release_request(session.manifest.descriptor_paths(session.root()), &outcome.version);
    let coordinator = Coordinator::new(GitCli::new(session.root()), &session.config);
    let report = coordinator.publish(&request)?;
    Ok(exit_code(&report))
}

fn execute_push_binary(session: &Session) -> Result<ExitCode> {
    session.require_publish_context()?;
    let package = session.manifest.platform_package(&session.platform)?;
    let descriptor = PackageDescriptor::load(package.descriptor_path(session.root()))?;
    let native = session.native_binary()?;
    // It's sufficient to publish the jar from one platform.
    let jar = session.java_jar().filter(|_| session.platform.binary_suffix == "linux");
    let request = binaries_request(
        session.platform.binary_suffix,
        &descriptor.version,
        &native,
        jar.as_deref(),
    );
    let coordinator = Coordinator::new(GitCli::new(session.root()), &session.config);
    let report = coordinator.publish(&request)?;
    Ok(exit_code(&report))
}

fn execute_verify(session: &Session) -> Result<ExitCode> {
    let jar = session.java_jar();
    verify_release(jar.as_deref(), &session.native_binary()?)?;
    success("Release artifacts verified");
    Ok(ExitCode::SUCCESS)
}
