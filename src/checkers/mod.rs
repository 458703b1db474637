//! Built-in checkers

pub mod git_status;
pub mod license;
pub mod readme;

use crate::capability::Checker;
use crate::core::{HealthStatus, Severity};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use git_status::GitStatusChecker;
pub use license::LicenseChecker;
pub use readme::ReadmeChecker;

/// Every built-in checker, in the order they run
pub fn builtin() -> Vec<Arc<dyn Checker>> {
    vec![
        Arc::new(ReadmeChecker::new()),
        Arc::new(LicenseChecker::new()),
        Arc::new(GitStatusChecker::new()),
    ]
}

/// Status a checker reports for a problem of the given severity
pub(crate) fn status_for(severity: Severity) -> HealthStatus {
    match severity {
        Severity::Low | Severity::Medium => HealthStatus::Warning,
        Severity::High | Severity::Critical => HealthStatus::Critical,
    }
}

/// First file in `dir` whose name matches one of `candidates`, ignoring case
pub(crate) fn find_file(dir: &Path, candidates: &[&str]) -> std::io::Result<Option<PathBuf>> {
    let mut found: Option<(usize, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if let Some(rank) = candidates.iter().position(|c| c.eq_ignore_ascii_case(&name)) {
            if found.as_ref().map_or(true, |(best, _)| rank < *best) {
                found = Some((rank, entry.path()));
            }
        }
    }
    Ok(found.map(|(_, path)| path))
}
