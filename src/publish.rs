//! Committing, tagging and pushing release results.
//!
//! A publish run moves through `Idle → Staged → Committed`, pushes the
//! commit, then tags the pushed `HEAD` (`Tagged`) and pushes the tag
//! (`Pushed`). The tag is only created once the branch push went through, so
//! it always names a commit that is on the remote branch.
//!
//! It stops early in `NothingToDo` when git sees no change in the candidate
//! files, in `Verified` for pull request builds, which only show the diff,
//! and in `Tagged` for local runs, which never push.

use std::path::{Path, PathBuf};
use semver::Version;
use tracing::{error, info, warn};
use crate::config::{CiEvent, ReleaseConfig};
use crate::error::{ConfigurationError, PublishError, Result};
use crate::git::Git;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Success,
    /// Every attempt failed.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    Staged,
    Committed,
    Tagged,
    Pushed(PushOutcome),
    /// None of the candidate files changed.
    NothingToDo,
    /// Pull request build: the commit was made and diffed, not pushed.
    Verified,
}

/// What the commit is about. The final message depends on which candidate
/// files actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitMessage {
    /// Version bump of the package descriptors.
    Release { version: Version },
    /// Freshly built binaries for one platform.
    Binaries {
        platform: String,
        version: Version,
        /// The java package's jar, when it is among the candidates.
        jar: Option<PathBuf>,
    },
}

impl CommitMessage {
    pub fn render(&self, changed: &[PathBuf]) -> String {
        match self {
            CommitMessage::Release { version } => format!("v{version}"),
            CommitMessage::Binaries { platform, version, jar } => {
                let jar_changed = jar.as_ref().is_some_and(|jar| changed.contains(jar));
                let native_changed = changed.iter().any(|path| Some(path) != jar.as_ref());
                match (jar_changed, native_changed) {
                    (true, true) => format!("Updated java and {platform} compiler binaries (v{version})"),
                    (true, false) => format!("Updated java compiler binary (v{version})"),
                    _ => format!("Updated {platform} compiler binary (v{version})"),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Files the run may have modified.
    pub candidates: Vec<PathBuf>,
    pub message: CommitMessage,
    /// Annotated tag to create, once, on the published commit.
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub state: PublishState,
    /// The files that went into the commit.
    pub committed: Vec<PathBuf>,
    /// Branch push attempts.
    pub pushes: u32,
    pub rebases: u32,
    pub tag_pushes: u32,
}

impl PublishReport {
    fn new(state: PublishState) -> Self {
        Self { state, committed: Vec::new(), pushes: 0, rebases: 0, tag_pushes: 0 }
    }

    /// Anything but an exhausted push counts as success.
    pub fn is_success(&self) -> bool {
        self.state != PublishState::Pushed(PushOutcome::Failed)
    }
}

pub struct Coordinator<'a, G: Git> {
    git: G,
    config: &'a ReleaseConfig,
}

impl<'a, G: Git> Coordinator<'a, G> {
    pub fn new(git: G, config: &'a ReleaseConfig) -> Self {
        Self { git, config }
    }

    /// Runs one publish cycle.
    ///
    /// # Errors
    /// Any failing git step other than `push` is fatal. Push failures are
    /// retried and, once exhausted, reported as
    /// `PublishState::Pushed(PushOutcome::Failed)` instead of an error.
    pub fn publish(&self, request: &PublishRequest) -> Result<PublishReport> {
        if self.config.event == CiEvent::PullRequest && self.config.base_sha.is_none() {
            return Err(ConfigurationError::MissingEnv("GITHUB_SHA").into());
        }

        let mut report = PublishReport::new(PublishState::Idle);
        let changed = self.git.changed_files(&request.candidates)?;
        if changed.is_empty() {
            info!("No candidate file changed, nothing to publish");
            report.state = PublishState::NothingToDo;
            return Ok(report);
        }

        if let Some(actor) = &self.config.actor {
            self.git.configure_identity(actor, &format!("{actor}@users.noreply.github.com"))?;
        }
        self.git.add(&changed)?;
        report.state = PublishState::Staged;

        let message = request.message.render(&changed);
        self.git.commit(&message)?;
        info!("Committed {} file(s): {}", changed.len(), message);
        report.committed = changed;
        report.state = PublishState::Committed;
        // Build leftovers would otherwise block the rebase. Never on a developer machine.
        if self.config.event != CiEvent::Local {
            self.git.clean_worktree()?;
        }

        if self.config.event == CiEvent::PullRequest {
            if let Some(sha) = &self.config.base_sha {
                info!("Verifying files in new commit(s)...");
                self.git.diff_stat(&format!("{sha}..HEAD"))?;
            }
            report.state = PublishState::Verified;
            return Ok(report);
        }

        if self.config.event == CiEvent::Local {
            if let Some(tag) = &request.tag {
                self.create_tag(tag)?;
                report.state = PublishState::Tagged;
            }
            info!("Not running in CI, leaving the push to you");
            return Ok(report);
        }

        if !self.push_commits(&mut report) {
            report.state = PublishState::Pushed(PushOutcome::Failed);
            return Ok(report);
        }
        if let Some(tag) = &request.tag {
            self.create_tag(tag)?;
            report.state = PublishState::Tagged;
            if !self.push_tag(tag, &mut report) {
                report.state = PublishState::Pushed(PushOutcome::Failed);
                return Ok(report);
            }
        }
        report.state = PublishState::Pushed(PushOutcome::Success);
        Ok(report)
    }

    /// Tags `HEAD` unless the tag already exists.
    fn create_tag(&self, tag: &str) -> Result<(), PublishError> {
        if self.git.tag_exists(tag)? {
            warn!("Tag {tag} already exists");
        } else {
            self.git.tag(tag, tag)?;
            info!("Tagged {tag}");
        }
        Ok(())
    }

    /// Pushes the branch, rebasing onto the remote before every retry.
    /// A failed rebase counts as a failed attempt.
    fn push_commits(&self, report: &mut PublishReport) -> bool {
        let remote = self.config.remote.as_str();
        info!("Syncing to {remote} and pushing commit(s)...");
        self.with_retries("push commit(s)", |attempt| {
            if attempt > 1 {
                report.rebases += 1;
                self.git.pull_rebase(remote)?;
            }
            report.pushes += 1;
            self.git.push(remote)
        })
    }

    fn push_tag(&self, tag: &str, report: &mut PublishReport) -> bool {
        let remote = self.config.remote.as_str();
        self.with_retries(&format!("push tag {tag}"), |_| {
            report.tag_pushes += 1;
            self.git.push_tag(remote, tag)
        })
    }

    /// Runs `attempt` up to `push_attempts` times with `retry_delay` in
    /// between. Returns whether one attempt succeeded.
    fn with_retries<F>(&self, what: &str, mut attempt: F) -> bool
    where
        F: FnMut(u32) -> Result<(), PublishError>,
    {
        let attempts = self.config.push_attempts.max(1);
        for n in 1..=attempts {
            if n > 1 {
                info!("Retrying in {} seconds...", self.config.retry_delay.as_secs());
                std::thread::sleep(self.config.retry_delay);
            }
            match attempt(n) {
                Ok(()) => {
                    info!("Pushed to {}", self.config.remote);
                    return true;
                }
                Err(e) => warn!("Attempt {n} of {attempts} to {what} failed: {e}"),
            }
        }
        error!("Could not {what} to {}.", self.config.remote);
        false
    }
}

/// Candidate files for a version release: every tracked descriptor.
pub fn release_request(descriptors: Vec<PathBuf>, version: &Version) -> PublishRequest {
    PublishRequest {
        candidates: descriptors,
        message: CommitMessage::Release { version: version.clone() },
        tag: Some(crate::versions::release_tag(version)),
    }
}

/// Candidate files for a binary push: the platform binary, plus the jar on
/// the one platform that publishes it.
pub fn binaries_request(platform: &str, version: &Version, native: &Path, jar: Option<&Path>) -> PublishRequest {
    let mut candidates = Vec::new();
    if let Some(jar) = jar {
        candidates.push(jar.to_path_buf());
    }
    candidates.push(native.to_path_buf());
    PublishRequest {
        candidates,
        message: CommitMessage::Binaries {
            platform: platform.to_string(),
            version: version.clone(),
            jar: jar.map(Path::to_path_buf),
        },
        tag: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Records every call. Pushes follow `push_results` and fail once it
    /// runs out. Rebases follow `rebase_results` and succeed once it runs out.
    #[derive(Default)]
    struct FakeGit {
        changed: Vec<PathBuf>,
        push_results: RefCell<VecDeque<bool>>,
        rebase_results: RefCell<VecDeque<bool>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeGit {
        fn with_changes(changed: &[&str]) -> Self {
            Self {
                changed: changed.iter().map(PathBuf::from).collect(),
                ..Default::default()
            }
        }

        fn pushes(self, results: &[bool]) -> Self {
            *self.push_results.borrow_mut() = results.iter().copied().collect();
            self
        }

        fn rebases(self, results: &[bool]) -> Self {
            *self.rebase_results.borrow_mut() = results.iter().copied().collect();
            self
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.borrow_mut().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn count(&self, name: &str) -> usize {
            self.calls.borrow().iter().filter(|c| c.starts_with(name)).count()
        }
    }

    fn fail(args: &str) -> PublishError {
        PublishError::Git { args: args.to_string(), stderr: "rejected".to_string() }
    }

    impl Git for &FakeGit {
        fn changed_files(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, PublishError> {
            self.record("status");
            Ok(paths.iter().filter(|p| self.changed.contains(p)).cloned().collect())
        }
        fn configure_identity(&self, name: &str, _email: &str) -> Result<(), PublishError> {
            self.record(format!("config {name}"));
            Ok(())
        }
        fn add(&self, paths: &[PathBuf]) -> Result<(), PublishError> {
            self.record(format!("add {}", paths.len()));
            Ok(())
        }
        fn commit(&self, message: &str) -> Result<(), PublishError> {
            self.record(format!("commit {message}"));
            Ok(())
        }
        fn clean_worktree(&self) -> Result<(), PublishError> {
            self.record("clean");
            Ok(())
        }
        fn tag_exists(&self, _tag: &str) -> Result<bool, PublishError> {
            Ok(false)
        }
        fn tag(&self, tag: &str, _message: &str) -> Result<(), PublishError> {
            self.record(format!("tag {tag}"));
            Ok(())
        }
        fn pull_rebase(&self, _remote: &str) -> Result<(), PublishError> {
            self.record("rebase");
            match self.rebase_results.borrow_mut().pop_front() {
                Some(false) => Err(fail("pull --rebase")),
                _ => Ok(()),
            }
        }
        fn push(&self, _remote: &str) -> Result<(), PublishError> {
            self.record("push");
            match self.push_results.borrow_mut().pop_front() {
                Some(true) => Ok(()),
                _ => Err(fail("push")),
            }
        }
        fn push_tag(&self, _remote: &str, tag: &str) -> Result<(), PublishError> {
            self.record(format!("tag-push {tag}"));
            Ok(())
        }
        fn diff_stat(&self, range: &str) -> Result<(), PublishError> {
            self.record(format!("diff {range}"));
            Ok(())
        }
    }

    fn ci_config(event: CiEvent) -> ReleaseConfig {
        let mut config = ReleaseConfig::new("/repo");
        config.event = event;
        config.actor = Some("release-bot".to_string());
        config.base_sha = Some("abc123".to_string());
        config.retry_delay = Duration::ZERO;
        config
    }

    fn request() -> PublishRequest {
        release_request(
            vec![PathBuf::from("packages/a/package.json"), PathBuf::from("packages/b/package.json")],
            &Version::new(5, 0, 0),
        )
    }

    #[test]
    fn test_nothing_to_do_without_changes() {
        let git = FakeGit::with_changes(&[]);
        let config = ci_config(CiEvent::Push);
        let report = Coordinator::new(&git, &config).publish(&request()).unwrap();
        assert_eq!(report.state, PublishState::NothingToDo);
        assert!(report.is_success());
        assert_eq!(git.calls(), vec!["status"]);
    }

    #[test]
    fn test_push_succeeds_after_two_failures() {
        let git = FakeGit::with_changes(&["packages/a/package.json"]).pushes(&[false, false, true]);
        let config = ci_config(CiEvent::Push);
        let report = Coordinator::new(&git, &config).publish(&request()).unwrap();
        assert_eq!(report.state, PublishState::Pushed(PushOutcome::Success));
        assert_eq!((report.pushes, report.rebases), (3, 2));
        assert_eq!(git.count("push"), 3);
        assert_eq!(git.count("rebase"), 2);
        assert_eq!(report.committed, vec![PathBuf::from("packages/a/package.json")]);
    }

    #[test]
    fn test_push_exhaustion_is_reported_not_raised() {
        let git = FakeGit::with_changes(&["packages/a/package.json"]).pushes(&[false, false, false]);
        let config = ci_config(CiEvent::Push);
        let report = Coordinator::new(&git, &config).publish(&request()).unwrap();
        assert_eq!(report.state, PublishState::Pushed(PushOutcome::Failed));
        assert!(!report.is_success());
        assert_eq!((report.pushes, report.rebases), (3, 2));
        assert_eq!(git.count("tag"), 0);
    }

    #[test]
    fn test_failed_rebase_skips_that_push() {
        let git = FakeGit::with_changes(&["packages/a/package.json"])
            .pushes(&[false, true])
            .rebases(&[false, true]);
        let config = ci_config(CiEvent::Push);
        let report = Coordinator::new(&git, &config).publish(&request()).unwrap();
        assert_eq!(report.state, PublishState::Pushed(PushOutcome::Success));
        assert_eq!((report.pushes, report.rebases), (2, 2));
        assert_eq!(
            git.calls()[5..],
            ["push", "rebase", "rebase", "push", "tag v5.0.0", "tag-push v5.0.0"]
        );
    }

    #[test]
    fn test_failed_rebases_exhaust_attempts() {
        let git = FakeGit::with_changes(&["packages/a/package.json"])
            .pushes(&[false, true, true])
            .rebases(&[false, false]);
        let config = ci_config(CiEvent::Push);
        let report = Coordinator::new(&git, &config).publish(&request()).unwrap();
        assert_eq!(report.state, PublishState::Pushed(PushOutcome::Failed));
        assert_eq!((report.pushes, report.rebases), (1, 2));
    }

    #[test]
    fn test_commit_and_tag_sequence() {
        let git = FakeGit::with_changes(&["packages/a/package.json", "packages/b/package.json"]).pushes(&[true]);
        let config = ci_config(CiEvent::Push);
        Coordinator::new(&git, &config).publish(&request()).unwrap();
        assert_eq!(
            git.calls(),
            vec![
                "status",
                "config release-bot",
                "add 2",
                "commit v5.0.0",
                "clean",
                "push",
                "tag v5.0.0",
                "tag-push v5.0.0",
            ]
        );
    }

    #[test]
    fn test_pull_request_only_verifies() {
        let git = FakeGit::with_changes(&["packages/a/package.json"]);
        let config = ci_config(CiEvent::PullRequest);
        let report = Coordinator::new(&git, &config).publish(&request()).unwrap();
        assert_eq!(report.state, PublishState::Verified);
        assert_eq!(git.count("diff abc123..HEAD"), 1);
        assert_eq!(git.count("push"), 0);
        assert_eq!(git.count("tag"), 0);
    }

    #[test]
    fn test_pull_request_requires_sha() {
        let git = FakeGit::with_changes(&["packages/a/package.json"]);
        let mut config = ci_config(CiEvent::PullRequest);
        config.base_sha = None;
        assert!(Coordinator::new(&git, &config).publish(&request()).is_err());
        assert!(git.calls().is_empty());
    }

    #[test]
    fn test_local_run_does_not_push() {
        let git = FakeGit::with_changes(&["packages/a/package.json"]);
        let config = ci_config(CiEvent::Local);
        let report = Coordinator::new(&git, &config).publish(&request()).unwrap();
        assert_eq!(report.state, PublishState::Tagged);
        assert_eq!(git.count("tag v5.0.0"), 1);
        assert_eq!(git.count("push"), 0);
        assert_eq!(git.count("tag-push"), 0);
        assert_eq!(git.count("clean"), 0);
    }

    fn git_in(dir: &Path, args: &[&str]) -> String {
        let output = std::process::Command::new("git").args(args).current_dir(dir).output().unwrap();
        assert!(output.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&output.stderr));
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn commit_file(repo: &Path, file: &str, content: &str) {
        std::fs::write(repo.join(file), content).unwrap();
        git_in(repo, &["add", file]);
        git_in(repo, &["commit", "-m", file]);
    }

    #[test]
    fn test_tag_names_published_commit_after_rebase() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        git_in(&seed, &["init"]);
        git_in(&seed, &["config", "user.name", "test-user"]);
        git_in(&seed, &["config", "user.email", "test@example.com"]);
        commit_file(&seed, "package.json", "{\"version\": \"1.0.0\"}\n");
        git_in(dir.path(), &["clone", "--bare", "seed", "remote.git"]);
        git_in(dir.path(), &["clone", "remote.git", "release"]);
        git_in(dir.path(), &["clone", "remote.git", "other"]);

        // Someone else lands a commit first, so the release push is rejected once.
        let other = dir.path().join("other");
        git_in(&other, &["config", "user.name", "someone"]);
        git_in(&other, &["config", "user.email", "someone@example.com"]);
        commit_file(&other, "NOTES.md", "notes\n");
        git_in(&other, &["push", "origin", "HEAD"]);

        let release = dir.path().join("release");
        let descriptor = release.join("package.json");
        std::fs::write(&descriptor, "{\"version\": \"1.0.1\"}\n").unwrap();
        let mut config = ReleaseConfig::new(&release);
        config.event = CiEvent::Push;
        config.actor = Some("release-bot".to_string());
        config.retry_delay = Duration::ZERO;
        let request = release_request(vec![descriptor], &Version::new(1, 0, 1));

        let report = Coordinator::new(crate::git::GitCli::new(&release), &config).publish(&request).unwrap();
        assert_eq!(report.state, PublishState::Pushed(PushOutcome::Success));
        assert_eq!((report.pushes, report.rebases, report.tag_pushes), (2, 1, 1));

        let remote = dir.path().join("remote.git");
        let tagged = git_in(&remote, &["rev-parse", "v1.0.1^{commit}"]);
        assert_eq!(tagged, git_in(&remote, &["rev-parse", "HEAD"]));
        assert_eq!(git_in(&remote, &["log", "-1", "--format=%s", "v1.0.1"]), "v1.0.1");
    }

    #[test]
    fn test_binary_commit_messages() {
        let version = Version::new(5, 0, 1);
        let jar = PathBuf::from("packages/java/compiler.jar");
        let native = PathBuf::from("packages/linux/compiler");
        let request = binaries_request("linux", &version, &native, Some(&jar));
        assert_eq!(request.candidates, vec![jar.clone(), native.clone()]);
        assert_eq!(
            request.message.render(&[jar.clone(), native.clone()]),
            "Updated java and linux compiler binaries (v5.0.1)"
        );
        assert_eq!(request.message.render(&[native.clone()]), "Updated linux compiler binary (v5.0.1)");
        assert_eq!(request.message.render(&[jar]), "Updated java compiler binary (v5.0.1)");

        let windows = binaries_request("windows", &version, Path::new("compiler.exe"), None);
        assert_eq!(windows.message.render(&[PathBuf::from("compiler.exe")]), "Updated windows compiler binary (v5.0.1)");
    }
}
