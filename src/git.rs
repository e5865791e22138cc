//! The git commands the publisher relies on.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use semver::Version;
use tracing::debug;
use crate::error::PublishError;

/// Operations on the working copy being released.
///
/// [`GitCli`] runs the real `git`; tests substitute a recording fake.
pub trait Git {
    /// Which of `paths` differ from `HEAD`, untracked files included.
    fn changed_files(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, PublishError>;
    /// Sets the commit author for this repository only.
    fn configure_identity(&self, name: &str, email: &str) -> Result<(), PublishError>;
    fn add(&self, paths: &[PathBuf]) -> Result<(), PublishError>;
    fn commit(&self, message: &str) -> Result<(), PublishError>;
    /// Removes untracked files and reverts unstaged edits.
    fn clean_worktree(&self) -> Result<(), PublishError>;
    fn tag_exists(&self, tag: &str) -> Result<bool, PublishError>;
    /// Creates an annotated tag on `HEAD`.
    fn tag(&self, tag: &str, message: &str) -> Result<(), PublishError>;
    /// Rebases onto the remote branch, leaving no rebase in progress when it fails.
    fn pull_rebase(&self, remote: &str) -> Result<(), PublishError>;
    /// Pushes the current branch, without tags.
    fn push(&self, remote: &str) -> Result<(), PublishError>;
    fn push_tag(&self, remote: &str, tag: &str) -> Result<(), PublishError>;
    /// Prints `git diff --stat` for `range` to the terminal.
    fn diff_stat(&self, range: &str) -> Result<(), PublishError>;
}

/// Shells out to `git` in a working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    fn output(&self, args: &[&str]) -> Result<String, PublishError> {
        debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()?;
        if !output.status.success() {
            return Err(PublishError::Git {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Runs with the terminal attached so git's own output is visible.
    fn run(&self, args: &[&str]) -> Result<(), PublishError> {
        debug!("git {}", args.join(" "));
        let status = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .stdin(Stdio::null())
            .status()?;
        if !status.success() {
            return Err(PublishError::Git {
                args: args.join(" "),
                stderr: status.to_string(),
            });
        }
        Ok(())
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.repo).unwrap_or(path)
    }

    fn with_paths<'a>(&self, args: &[&'a str], paths: &'a [String]) -> Vec<&'a str> {
        let mut all = args.to_vec();
        all.push("--");
        all.extend(paths.iter().map(String::as_str));
        all
    }

    fn path_args(&self, paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| self.relative(p).to_string_lossy().replace('\\', "/")).collect()
    }

    /// The newest `v*` tag that parses as a version.
    pub fn latest_release(&self) -> Result<Option<Version>, PublishError> {
        let tags = self.output(&["tag", "--list", "v*", "--sort=-v:refname"])?;
        Ok(tags
            .lines()
            .filter_map(|tag| Version::parse(tag.trim().trim_start_matches('v')).ok())
            .max())
    }
}

impl Git for GitCli {
    fn changed_files(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, PublishError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let args = self.path_args(paths);
        let status = self.output(&self.with_paths(&["status", "--porcelain", "--untracked-files=all"], &args))?;
        let changed: Vec<String> = status
            .lines()
            .filter(|line| line.len() > 3)
            .map(|line| line[3..].trim_matches('"').to_string())
            .collect();
        Ok(paths
            .iter()
            .zip(args.iter())
            .filter(|(_, rel)| changed.iter().any(|c| c == *rel))
            .map(|(path, _)| path.clone())
            .collect())
    }

    fn configure_identity(&self, name: &str, email: &str) -> Result<(), PublishError> {
        self.output(&["config", "user.name", name])?;
        self.output(&["config", "user.email", email])?;
        Ok(())
    }

    fn add(&self, paths: &[PathBuf]) -> Result<(), PublishError> {
        let args = self.path_args(paths);
        self.output(&self.with_paths(&["add"], &args))?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), PublishError> {
        self.run(&["commit", "-m", message])
    }

    fn clean_worktree(&self) -> Result<(), PublishError> {
        self.output(&["clean", "-d", "-f", "."])?;
        self.output(&["checkout", "--", "."])?;
        Ok(())
    }

    fn tag_exists(&self, tag: &str) -> Result<bool, PublishError> {
        Ok(!self.output(&["tag", "--list", tag])?.trim().is_empty())
    }

    fn tag(&self, tag: &str, message: &str) -> Result<(), PublishError> {
        self.output(&["tag", "-a", tag, "-m", message])?;
        Ok(())
    }

    fn pull_rebase(&self, remote: &str) -> Result<(), PublishError> {
        let result = self.run(&["pull", "--rebase", remote]);
        let git_dir = self.repo.join(".git");
        if result.is_err() && (git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()) {
            if let Err(e) = self.output(&["rebase", "--abort"]) {
                debug!("rebase --abort failed: {e}");
            }
        }
        result
    }

    fn push(&self, remote: &str) -> Result<(), PublishError> {
        self.run(&["push", remote, "HEAD"])
    }

    fn push_tag(&self, remote: &str, tag: &str) -> Result<(), PublishError> {
        self.run(&["push", remote, &format!("refs/tags/{tag}")])
    }

    fn diff_stat(&self, range: &str) -> Result<(), PublishError> {
        self.run(&["diff", "--stat", range])
    }
}
