//! CLI output formatting

use crate::{
    core::{
        ExecutionStatus, HealthStatus, PipelineResult, RepositoryResult, Severity, StepResult,
        StepStatus, WorkflowResult,
    },
    execution::EngineEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Advance a progress bar from dispatcher events
pub fn track_progress(progress: &ProgressBar, event: &EngineEvent) {
    match event {
        EngineEvent::RunStarted { total_repos, .. } => {
            progress.set_length(*total_repos as u64);
            progress.set_position(0);
        }
        EngineEvent::RepositoryStarted { name, .. } => progress.set_message(name.clone()),
        EngineEvent::RepositoryCompleted { name, status, .. } => {
            progress.inc(1);
            progress.println(format!("{} {}", status_icon(*status), name));
        }
        EngineEvent::RunCompleted { .. } => progress.set_message("done"),
    }
}

fn status_icon(status: HealthStatus) -> Emoji<'static, 'static> {
    match status {
        HealthStatus::Healthy => CHECK,
        HealthStatus::Warning => WARN,
        HealthStatus::Critical => CROSS,
        HealthStatus::Unknown => INFO,
    }
}

/// Format a health status for display
pub fn format_health(status: HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => style("HEALTHY").green().to_string(),
        HealthStatus::Warning => style("WARNING").yellow().to_string(),
        HealthStatus::Critical => style("CRITICAL").red().to_string(),
        HealthStatus::Unknown => style("UNKNOWN").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Pending => style("PENDING").dim().to_string(),
        StepStatus::Running => style("RUNNING").yellow().to_string(),
        StepStatus::Completed => style("COMPLETED").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
        StepStatus::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format one repository with its checks
pub fn format_repository(repo: &RepositoryResult) -> String {
    let mut lines = vec![format!(
        "{}{} {} {}",
        status_icon(repo.status),
        style(&repo.repository.name).bold(),
        format_health(repo.status),
        style(format!("{}/100", repo.score)).cyan()
    )];

    if let Some(error) = &repo.error {
        lines.push(format!("    {}", style(error).red()));
    }
    if let Some(analysis) = &repo.analysis {
        lines.push(format!(
            "    {} {} files, {} lines, avg complexity {:.1}",
            style(&analysis.language).dim(),
            analysis.total_files,
            analysis.total_lines,
            analysis.average_complexity
        ));
    }

    for check in &repo.checks {
        lines.push(format!(
            "    {:<16} {:<10} {}",
            check.name,
            format_health(check.status),
            style(format!("{}/{}", check.score, check.max_score)).dim()
        ));
        for issue in &check.issues {
            lines.push(format!(
                "      {} {}",
                format_severity(issue.severity),
                issue.message
            ));
        }
        for warning in &check.warnings {
            lines.push(format!("      {}{}", WARN, style(warning).dim()));
        }
    }

    lines.join("\n")
}

fn format_severity(severity: Severity) -> String {
    match severity {
        Severity::Low => style("low").dim().to_string(),
        Severity::Medium => style("medium").yellow().to_string(),
        Severity::High => style("high").red().to_string(),
        Severity::Critical => style("critical").red().bold().to_string(),
    }
}

/// Format a whole workflow for display
pub fn format_workflow(workflow: &WorkflowResult) -> String {
    let summary = &workflow.summary;
    let mut sections: Vec<String> = workflow.repositories.iter().map(format_repository).collect();

    sections.push(format!(
        "{} {} repositories: {} successful, {} failed, average score {}",
        INFO,
        summary.total_repos,
        style(summary.successful_repos).green(),
        style(summary.failed_repos).red(),
        style(format!("{:.1}", summary.average_score)).cyan()
    ));
    sections.push(format!(
        "  {} issues ({} critical, {} high, {} medium, {} low)",
        summary.total_issues,
        summary.severity_counts.critical,
        summary.severity_counts.high,
        summary.severity_counts.medium,
        summary.severity_counts.low
    ));

    sections.join("\n")
}

/// Format a step result for display
pub fn format_step(step: &StepResult) -> String {
    let icon = match step.status {
        StepStatus::Completed => CHECK,
        StepStatus::Failed => CROSS,
        StepStatus::Skipped => SKIP,
        StepStatus::Pending | StepStatus::Running => SPINNER,
    };
    let mut line = format!(
        "{}{} [{}] {} {}",
        icon,
        style(&step.name).bold(),
        style(&step.step_type).dim(),
        format_step_status(step.status),
        style(format_duration(step.duration)).dim()
    );
    if let Some(error) = &step.error {
        line.push_str(&format!("\n    {}", style(error).dim()));
    }
    line
}

/// Format a pipeline run for display
pub fn format_pipeline(result: &PipelineResult) -> String {
    let mut sections = vec![format!(
        "{} Pipeline {} ({}) {}",
        INFO,
        style(&result.pipeline_name).bold(),
        style(&result.execution_id.to_string()[..8]).dim(),
        format_status(result.status)
    )];
    sections.extend(result.steps.iter().map(format_step));
    if let Some(workflow) = &result.workflow_result {
        sections.push(String::new());
        sections.push(format_workflow(workflow));
    }
    sections.join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
