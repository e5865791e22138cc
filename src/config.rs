use std::path::PathBuf;
use std::time::Duration;
use crate::global::utils::get_global_cache_dir;

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_PUSH_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_COPY_CONCURRENCY: usize = 4;

/// The CI event that triggered the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiEvent {
    /// Pull request validation: commits are made locally and only diffed.
    PullRequest,
    /// A merge into the release branch: commits and tags are pushed.
    Push,
    /// Not running in CI, nothing is pushed.
    Local,
}

impl CiEvent {
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("pull_request") => CiEvent::PullRequest,
            Some("push") => CiEvent::Push,
            _ => CiEvent::Local,
        }
    }
}

/// Settings for one release run.
///
/// Populated once at process start and handed to each component, so no
/// component reads the environment on its own.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// Root of the repository being released.
    pub repo_root: PathBuf,
    /// Directory the toolchain is downloaded and extracted into.
    pub work_dir: PathBuf,
    /// Shared cache for downloaded archives. `None` disables it.
    pub archive_cache: Option<PathBuf>,
    /// Replaces the computed toolchain download URL.
    pub toolchain_url: Option<String>,
    /// Expected sha256 of the toolchain archive, hex encoded.
    pub toolchain_sha256: Option<String>,
    /// CI user the release commits are authored by.
    pub actor: Option<String>,
    pub event: CiEvent,
    /// Base commit of the change under validation.
    pub base_sha: Option<String>,
    pub remote: String,
    pub push_attempts: u32,
    pub retry_delay: Duration,
    pub copy_concurrency: usize,
}

impl ReleaseConfig {
    /// Defaults for a repository at `repo_root`, ignoring the environment.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            work_dir: repo_root.join("temp"),
            repo_root,
            archive_cache: None,
            toolchain_url: None,
            toolchain_sha256: None,
            actor: None,
            event: CiEvent::Local,
            base_sha: None,
            remote: DEFAULT_REMOTE.to_string(),
            push_attempts: DEFAULT_PUSH_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            copy_concurrency: DEFAULT_COPY_CONCURRENCY,
        }
    }

    /// Reads the process environment for a repository at `repo_root`.
    pub fn from_env(repo_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::from_lookup(repo_root, |key| std::env::var(key).ok());
        config.archive_cache = get_global_cache_dir().ok();
        config
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(repo_root: impl Into<PathBuf>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::new(repo_root);
        config.toolchain_url = non_empty("GRAAL_URL");
        config.toolchain_sha256 = non_empty("GRAAL_SHA256");
        config.actor = non_empty("GITHUB_ACTOR");
        config.event = CiEvent::from_name(non_empty("GITHUB_EVENT_NAME").as_deref());
        config.base_sha = non_empty("GITHUB_SHA");
        if let Some(remote) = non_empty("RELEASE_REMOTE") {
            config.remote = remote;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup_reads_ci_variables() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GRAAL_URL", "https://mirror.example/graal.tar.gz"),
            ("GITHUB_ACTOR", "release-bot"),
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_SHA", "abc123"),
        ]);
        let config = ReleaseConfig::from_lookup("/repo", |key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.toolchain_url.as_deref(), Some("https://mirror.example/graal.tar.gz"));
        assert_eq!(config.actor.as_deref(), Some("release-bot"));
        assert_eq!(config.event, CiEvent::PullRequest);
        assert_eq!(config.base_sha.as_deref(), Some("abc123"));
        assert_eq!(config.remote, "origin");
        assert_eq!(config.work_dir, PathBuf::from("/repo/temp"));
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config = ReleaseConfig::from_lookup("/repo", |key| match key {
            "GRAAL_URL" => Some("  ".to_string()),
            "GITHUB_EVENT_NAME" => Some("workflow_dispatch".to_string()),
            _ => None,
        });
        assert!(config.toolchain_url.is_none());
        assert_eq!(config.event, CiEvent::Local);
        assert_eq!(config.push_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(10));
    }
}
