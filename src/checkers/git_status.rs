//! Working-tree cleanliness via `git status`

use crate::capability::{Checker, RepositoryContext};
use crate::core::{CheckError, CheckResult, HealthStatus, Issue, Repository, Severity};
use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Parsed `git status --porcelain --branch` output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub branch: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub modified: usize,
    pub untracked: usize,
}

impl GitStatus {
    pub fn parse(output: &str) -> Self {
        let mut status = GitStatus::default();

        for line in output.lines() {
            if let Some(header) = line.strip_prefix("## ") {
                let (branch_part, tracking) = match header.split_once(" [") {
                    Some((branch, rest)) => (branch, Some(rest.trim_end_matches(']'))),
                    None => (header, None),
                };
                let branch = branch_part.split("...").next().unwrap_or(branch_part);
                status.branch = Some(branch.to_string());

                for part in tracking.into_iter().flat_map(|t| t.split(", ")) {
                    if let Some(n) = part.strip_prefix("ahead ") {
                        status.ahead = n.parse().unwrap_or(0);
                    } else if let Some(n) = part.strip_prefix("behind ") {
                        status.behind = n.parse().unwrap_or(0);
                    }
                }
            } else if line.starts_with("??") {
                status.untracked += 1;
            } else if !line.trim().is_empty() {
                status.modified += 1;
            }
        }

        status
    }

    pub fn is_clean(&self) -> bool {
        self.modified == 0 && self.untracked == 0
    }
}

/// Checker that flags uncommitted or unpushed work
///
/// The git subprocess is spawned with `kill_on_drop`, so cancelling a run
/// terminates it rather than leaving it behind.
pub struct GitStatusChecker {
    git_path: String,
}

impl GitStatusChecker {
    pub fn new() -> Self {
        Self::with_git_path("git")
    }

    pub fn with_git_path(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    async fn run_git(&self, ctx: &RepositoryContext) -> Result<String, CheckError> {
        let path = &ctx.repository.path;
        debug!("Running git status in {}", path.display());

        let command = Command::new(&self.git_path)
            .arg("-C")
            .arg(path)
            .args(["status", "--porcelain", "--branch"])
            .kill_on_drop(true)
            .output();

        let limit = ctx.config.timeout();
        let output = tokio::select! {
            result = timeout(limit, command) => result.map_err(|_| CheckError::Timeout(limit))??,
            _ = ctx.cancel.cancelled() => return Err(CheckError::Cancelled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("git exited with code {}: {}", exit_code, stderr.trim());
            return Err(CheckError::Execution(format!(
                "git exited with code {}: {}",
                exit_code,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for GitStatusChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for GitStatusChecker {
    fn id(&self) -> &str {
        "git-status"
    }

    fn name(&self) -> &str {
        "Git Status"
    }

    fn category(&self) -> &str {
        "vcs"
    }

    fn supports_repository(&self, repository: &Repository) -> bool {
        repository.path.join(".git").exists()
    }

    async fn check(&self, ctx: &RepositoryContext) -> Result<CheckResult, CheckError> {
        let started = Instant::now();
        let status = GitStatus::parse(&self.run_git(ctx).await?);

        let mut result = CheckResult::new(self.id(), self.name(), self.category(), 100)
            .with_metric("modified", status.modified)
            .with_metric("untracked", status.untracked)
            .with_metric("ahead", status.ahead)
            .with_metric("behind", status.behind);
        if let Some(branch) = &status.branch {
            result = result.with_metric("branch", branch.clone());
        }

        if !status.is_clean() {
            let changes = status.modified + status.untracked;
            let penalty = (changes * 5).min(50) as u32;
            result = result
                .with_status(HealthStatus::Warning)
                .with_score(100 - penalty)
                .with_issue(Issue::new(
                    "uncommitted_changes",
                    Severity::Low,
                    format!(
                        "{} modified and {} untracked files",
                        status.modified, status.untracked
                    ),
                ));
        }
        if status.ahead > 0 {
            result = result.with_warning(format!("{} commits not pushed", status.ahead));
        }
        if status.behind > 0 {
            result = result.with_warning(format!("{} commits behind upstream", status.behind));
        }

        result.duration = started.elapsed();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_tracking_branch() {
        let status = GitStatus::parse("## main...origin/main\n");
        assert_eq!(status.branch.as_deref(), Some("main"));
        assert!(status.is_clean());
        assert_eq!(status.ahead, 0);
    }

    #[test]
    fn test_parse_dirty_branch_ahead_and_behind() {
        let output = "## feature...origin/feature [ahead 2, behind 1]\n M src/lib.rs\nA  new.rs\n?? scratch.txt\n";
        let status = GitStatus::parse(output);
        assert_eq!(status.branch.as_deref(), Some("feature"));
        assert_eq!(status.ahead, 2);
        assert_eq!(status.behind, 1);
        assert_eq!(status.modified, 2);
        assert_eq!(status.untracked, 1);
        assert!(!status.is_clean());
    }

    #[test]
    fn test_parse_branch_without_upstream() {
        let status = GitStatus::parse("## No commits yet on main\n");
        assert_eq!(status.branch.as_deref(), Some("No commits yet on main"));
    }

    #[test]
    fn test_only_supports_git_repositories() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new("r", dir.path());
        let checker = GitStatusChecker::new();
        assert!(!checker.supports_repository(&repo));

        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(checker.supports_repository(&repo));
    }

    #[tokio::test]
    async fn test_missing_git_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RepositoryContext {
            repository: Repository::new("r", dir.path()),
            config: Default::default(),
            cancel: tokio_util::sync::CancellationToken::new(),
        };
        let checker = GitStatusChecker::with_git_path("definitely-not-a-git-binary");
        assert!(checker.check(&ctx).await.is_err());
    }
}
