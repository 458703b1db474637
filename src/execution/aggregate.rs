//! Result aggregation - repository rollups and workflow summaries

use crate::core::{
    CheckResult, HealthStatus, RepositoryResult, SeverityCounts, StatusCounts, WorkflowSummary,
};

/// Overall status of a repository from its check results
///
/// Any critical check makes the repository critical, else any warning makes
/// it a warning. An empty result set is unknown.
pub fn rollup_status(checks: &[CheckResult]) -> HealthStatus {
    if checks.is_empty() {
        HealthStatus::Unknown
    } else if checks.iter().any(|c| c.status == HealthStatus::Critical) {
        HealthStatus::Critical
    } else if checks.iter().any(|c| c.status == HealthStatus::Warning) {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// Percentage of the attainable score, rounded down
pub fn rollup_score(checks: &[CheckResult]) -> u32 {
    let total: u64 = checks.iter().map(|c| u64::from(c.score)).sum();
    let max: u64 = checks.iter().map(|c| u64::from(c.max_score)).sum();
    if max == 0 {
        return 0;
    }
    (total * 100 / max) as u32
}

/// Summarize repository results into workflow totals
pub fn summarize(repositories: &[RepositoryResult]) -> WorkflowSummary {
    let mut status_counts = StatusCounts::default();
    let mut severity_counts = SeverityCounts::default();
    let mut total_issues = 0;
    let mut successful_repos = 0;

    for repo in repositories {
        if matches!(repo.status, HealthStatus::Healthy | HealthStatus::Warning) {
            successful_repos += 1;
        }
        for check in &repo.checks {
            status_counts.add(check.status);
            for issue in &check.issues {
                severity_counts.add(issue.severity);
                total_issues += 1;
            }
        }
    }

    let average_score = if repositories.is_empty() {
        0.0
    } else {
        repositories.iter().map(|r| f64::from(r.score)).sum::<f64>() / repositories.len() as f64
    };

    WorkflowSummary {
        total_repos: repositories.len(),
        successful_repos,
        failed_repos: repositories.len() - successful_repos,
        status_counts,
        severity_counts,
        total_issues,
        average_score,
    }
}
