//! Git integration for fetching application sources.

use std::path::Path;
use std::process::Command;
use tracing::info;

use crate::domain::{Result, RoarError};

/// Fetches a repository at a revision into a directory.
pub trait SourceFetcher {
    fn fetch(&self, url: &str, revision: &str, target: &Path) -> Result<()>;
}

/// [`SourceFetcher`] backed by a shallow, single-branch `git clone`.
#[derive(Debug, Clone, Default)]
pub struct GitFetcher;

impl SourceFetcher for GitFetcher {
    /// Runs `git clone --branch <revision> --single-branch --depth=1`.
    ///
    /// Returns an error if git is not available or the clone fails; the
    /// combined output of git is attached to the error.
    fn fetch(&self, url: &str, revision: &str, target: &Path) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.arg("clone")
            .args(["--branch", revision])
            .arg("--single-branch")
            .arg("--depth=1")
            .arg(url)
            .arg(target);
        info!(cmd = ?cmd, "Executing command");

        let output = cmd
            .output()
            .map_err(|e| RoarError::FetchFailed(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RoarError::FetchFailed(format!(
                "git clone failed for {url} (revision {revision}): {}\nOutput:\n{stdout}{stderr}",
                output.status
            )));
        }

        Ok(())
    }
}

/// Check whether git is available on PATH.
pub fn is_git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        std::fs::create_dir_all(dir.path().join("svc/.helm")).unwrap();
        std::fs::write(dir.path().join("svc/.helm/Chart.yaml"), "name: svc\n").unwrap();
        run_git(dir.path(), &["add", "."]);
        run_git(dir.path(), &["commit", "-m", "initial"]);
        dir
    }

    #[test]
    fn fetch_clones_branch_into_target() {
        if !is_git_available() {
            return;
        }
        let origin = make_git_repo();
        let work = tempfile::tempdir().unwrap();
        let target = work.path().join("clone-1");
        let url = format!("file://{}", origin.path().display());

        GitFetcher.fetch(&url, "main", &target).unwrap();
        assert!(target.join("svc/.helm/Chart.yaml").exists());
    }

    #[test]
    fn fetch_fails_for_unknown_revision() {
        if !is_git_available() {
            return;
        }
        let origin = make_git_repo();
        let work = tempfile::tempdir().unwrap();
        let url = format!("file://{}", origin.path().display());

        let err = GitFetcher
            .fetch(&url, "no-such-branch", &work.path().join("clone"))
            .unwrap_err();
        assert!(matches!(err, RoarError::FetchFailed(_)));
        assert!(err.to_string().contains("no-such-branch"));
    }
}
