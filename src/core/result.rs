//! Result models produced by checkers, analyzers and the dispatcher

use crate::core::repository::Repository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Health of a single check or of a whole repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Severity of an individual issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

/// A problem reported by a checker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Machine-readable issue type (e.g. "missing_readme")
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

impl Issue {
    pub fn new(kind: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Output of one checker invocation against one repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Checker identifier
    pub id: String,

    /// Checker display name
    pub name: String,

    pub category: String,

    pub status: HealthStatus,

    pub score: u32,

    pub max_score: u32,

    pub issues: Vec<Issue>,

    pub warnings: Vec<String>,

    /// Free-form checker metrics
    pub metrics: HashMap<String, serde_json::Value>,

    pub duration: Duration,

    pub timestamp: DateTime<Utc>,
}

impl CheckResult {
    /// Create an empty healthy result with a score out of `max_score`
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        max_score: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            status: HealthStatus::Healthy,
            score: max_score,
            max_score,
            issues: Vec::new(),
            warnings: Vec::new(),
            metrics: HashMap::new(),
            duration: Duration::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// Synthetic result standing in for a checker that failed to run
    pub fn execution_error(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        let mut result = Self::new(id, name, category, 100);
        result.status = HealthStatus::Critical;
        result.score = 0;
        result.issues.push(Issue::new(
            "execution_error",
            Severity::Critical,
            error.to_string(),
        ));
        result
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.score = score.min(self.max_score);
        self
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }
}

/// Per-file breakdown from an analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub path: String,
    pub lines: usize,
    pub code_lines: usize,
    pub functions: usize,
    pub complexity: u32,
}

/// Output of one analyzer invocation against one repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub language: String,
    pub files: Vec<FileAnalysis>,
    pub total_files: usize,
    pub total_lines: usize,
    pub total_functions: usize,
    pub total_complexity: u64,
    pub average_complexity: f64,
    pub max_complexity: u32,
    pub duration: Duration,
}

impl AnalysisResult {
    /// Aggregate per-file results into repository totals
    pub fn from_files(language: impl Into<String>, files: Vec<FileAnalysis>) -> Self {
        let total_lines = files.iter().map(|f| f.lines).sum();
        let total_functions = files.iter().map(|f| f.functions).sum();
        let total_complexity: u64 = files.iter().map(|f| u64::from(f.complexity)).sum();
        let max_complexity = files.iter().map(|f| f.complexity).max().unwrap_or(0);
        let average_complexity = if files.is_empty() {
            0.0
        } else {
            total_complexity as f64 / files.len() as f64
        };

        Self {
            language: language.into(),
            total_files: files.len(),
            total_lines,
            total_functions,
            total_complexity,
            average_complexity,
            max_complexity,
            files,
            duration: Duration::ZERO,
        }
    }
}

/// Everything learned about one input repository in one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryResult {
    pub repository: Repository,

    pub analysis: Option<AnalysisResult>,

    pub checks: Vec<CheckResult>,

    pub status: HealthStatus,

    pub score: u32,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Set only for validation, cancellation or task-level failures
    pub error: Option<String>,
}

impl RepositoryResult {
    /// A result for a repository that could not be evaluated
    pub fn failed(repository: Repository, error: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            repository,
            analysis: None,
            checks: Vec::new(),
            status: HealthStatus::Unknown,
            score: 0,
            started_at: now,
            completed_at: now,
            error: Some(error.into()),
        }
    }

    pub fn total_issues(&self) -> usize {
        self.checks.iter().map(|c| c.issues.len()).sum()
    }
}

/// Counts of check results by health status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub unknown: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: HealthStatus) {
        match status {
            HealthStatus::Healthy => self.healthy += 1,
            HealthStatus::Warning => self.warning += 1,
            HealthStatus::Critical => self.critical += 1,
            HealthStatus::Unknown => self.unknown += 1,
        }
    }

    pub fn get(&self, status: HealthStatus) -> usize {
        match status {
            HealthStatus::Healthy => self.healthy,
            HealthStatus::Warning => self.warning,
            HealthStatus::Critical => self.critical,
            HealthStatus::Unknown => self.unknown,
        }
    }
}

/// Counts of issues by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

/// Workflow-level rollup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub total_repos: usize,
    pub successful_repos: usize,
    pub failed_repos: usize,
    /// Check results by status, across every repository
    pub status_counts: StatusCounts,
    /// Issues by severity, across every repository
    pub severity_counts: SeverityCounts,
    pub total_issues: usize,
    pub average_score: f64,
}

/// Result of one dispatcher invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub execution_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// One entry per input repository, in input order
    pub repositories: Vec<RepositoryResult>,
    pub summary: WorkflowSummary,
}

impl WorkflowResult {
    pub fn has_failures(&self) -> bool {
        self.summary.failed_repos > 0
    }
}
