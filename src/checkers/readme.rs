//! README presence and substance

use crate::capability::{Checker, RepositoryContext};
use crate::checkers::{find_file, status_for};
use crate::core::{config::CheckerConfig, CheckError, CheckResult, HealthStatus, Issue, Severity};
use async_trait::async_trait;
use std::time::Instant;

const CANDIDATES: &[&str] = &["readme.md", "readme.rst", "readme.txt", "readme"];

/// READMEs shorter than this are flagged as stubs
const MIN_LENGTH: usize = 200;

pub struct ReadmeChecker;

impl ReadmeChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadmeChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for ReadmeChecker {
    fn id(&self) -> &str {
        "readme"
    }

    fn name(&self) -> &str {
        "README"
    }

    fn category(&self) -> &str {
        "documentation"
    }

    fn config(&self) -> CheckerConfig {
        CheckerConfig {
            categories: vec!["documentation".to_string()],
            ..CheckerConfig::default().with_severity(Severity::High)
        }
    }

    async fn check(&self, ctx: &RepositoryContext) -> Result<CheckResult, CheckError> {
        let started = Instant::now();
        let mut result = CheckResult::new(self.id(), self.name(), self.category(), 100);

        let root = ctx.repository.path.clone();
        let found = tokio::task::spawn_blocking(move || -> std::io::Result<_> {
            match find_file(&root, CANDIDATES)? {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    Ok(Some((path, content)))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| CheckError::Execution(e.to_string()))??;

        match found {
            None => {
                result = result
                    .with_status(status_for(ctx.config.severity))
                    .with_score(0)
                    .with_issue(Issue::new(
                        "missing_readme",
                        ctx.config.severity,
                        "Repository has no README",
                    ));
            }
            Some((path, content)) => {
                let file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let length = content.trim().chars().count();
                result = result
                    .with_metric("file", file.clone())
                    .with_metric("length", length);

                if length < MIN_LENGTH {
                    result = result
                        .with_status(HealthStatus::Warning)
                        .with_score(50)
                        .with_issue(
                            Issue::new(
                                "short_readme",
                                Severity::Low,
                                format!("README has only {} characters", length),
                            )
                            .in_file(file),
                        );
                }
                if !content.lines().any(|l| l.trim_start().starts_with('#') || l.starts_with('=')) {
                    result = result.with_warning("README has no headings");
                }
            }
        }

        result.duration = started.elapsed();
        Ok(result)
    }
}
