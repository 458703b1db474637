//! Step executors - one handler per step type

use crate::{
    core::{
        ExecutionContext, HealthStatus, PipelineStep, RepositoryResult, Severity, StepError,
        StepResult, StepType, WorkflowResult,
    },
    execution::{aggregate, engine::AnalysisOutcome, HealthCheckEngine},
};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trait for step executors - runs one pipeline step against the context
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Execute the step
    ///
    /// The context's cancellation token fires when the step's deadline or
    /// the pipeline's deadline passes; `context.deadline` holds that instant.
    /// An executor that returns promptly once cancelled has its partial
    /// result kept on the (failed) step.
    async fn execute(
        &self,
        step: &PipelineStep,
        context: &ExecutionContext,
    ) -> Result<StepResult, StepError>;

    fn supports_step_type(&self, step_type: &StepType) -> bool;
}

/// Checks that every repository path exists and is a directory
///
/// Config: `allow_invalid` (bool) keeps the step successful when some
/// repositories are rejected; they are still excluded from later steps.
///
/// Output: `valid` and `invalid` repository names, and `invalid_indices`,
/// the input positions later steps use to exclude repositories.
pub struct ValidationStepExecutor;

#[async_trait]
impl StepExecutor for ValidationStepExecutor {
    async fn execute(
        &self,
        step: &PipelineStep,
        context: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        let mut invalid_indices = Vec::new();

        for (index, repository) in context.repositories.iter().enumerate() {
            match tokio::fs::metadata(&repository.path).await {
                Ok(meta) if meta.is_dir() => {
                    valid.push(repository.name.clone());
                    continue;
                }
                Ok(_) => warn!("{} is not a directory", repository.path.display()),
                Err(e) => warn!("{} is not accessible: {}", repository.path.display(), e),
            }
            invalid.push(repository.name.clone());
            invalid_indices.push(index);
        }

        if !invalid.is_empty() && !step.config_bool("allow_invalid").unwrap_or(false) {
            return Err(StepError::Execution(format!(
                "{} repositories failed validation: {}",
                invalid.len(),
                invalid.join(", ")
            )));
        }

        let mut result = StepResult::new(&step.name, step.step_type.clone())
            .with_output("valid", valid)
            .with_output("invalid", invalid)
            .with_output("invalid_indices", invalid_indices);
        result.complete();
        Ok(result)
    }

    fn supports_step_type(&self, step_type: &StepType) -> bool {
        *step_type == StepType::Validation
    }
}

/// Runs the registered analyzers over the valid repositories
pub struct AnalysisStepExecutor {
    engine: Arc<HealthCheckEngine>,
}

impl AnalysisStepExecutor {
    pub fn new(engine: Arc<HealthCheckEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StepExecutor for AnalysisStepExecutor {
    async fn execute(
        &self,
        step: &PipelineStep,
        context: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let repositories = context.valid_repositories();
        let outcomes = self
            .engine
            .analyze_all(&context.cancel, &repositories, context.engine.max_concurrency)
            .await?;

        let (mut analyzed, mut skipped, mut failed) = (0usize, 0usize, 0usize);
        let (mut total_files, mut total_lines) = (0usize, 0usize);
        for (repository, outcome) in repositories.iter().zip(&outcomes) {
            match outcome {
                AnalysisOutcome::Analyzed(analysis) => {
                    analyzed += 1;
                    total_files += analysis.total_files;
                    total_lines += analysis.total_lines;
                }
                AnalysisOutcome::Skipped => skipped += 1,
                AnalysisOutcome::Failed(e) => {
                    debug!("Analysis of {} failed: {}", repository.name, e);
                    failed += 1;
                }
            }
        }

        info!(
            "Analyzed {} repositories ({} skipped, {} failed)",
            analyzed, skipped, failed
        );

        let mut result = StepResult::new(&step.name, step.step_type.clone())
            .with_output("analyzed", analyzed)
            .with_output("skipped", skipped)
            .with_output("failed", failed)
            .with_output("total_files", total_files)
            .with_output("total_lines", total_lines);
        result.complete();
        Ok(result)
    }

    fn supports_step_type(&self, step_type: &StepType) -> bool {
        *step_type == StepType::Analysis
    }
}

/// Runs the health-check dispatcher
///
/// The dispatcher's deadline is capped at the step deadline, so a step that
/// runs out of time still hands back the repositories that finished.
pub struct CheckersStepExecutor {
    engine: Arc<HealthCheckEngine>,
}

impl CheckersStepExecutor {
    pub fn new(engine: Arc<HealthCheckEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl StepExecutor for CheckersStepExecutor {
    async fn execute(
        &self,
        step: &PipelineStep,
        context: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let valid = context.valid_repositories();
        let timeout = match context.remaining() {
            Some(remaining) => remaining.min(context.engine.timeout()),
            None => context.engine.timeout(),
        };
        let mut workflow = self
            .engine
            .execute_health_check(&context.cancel, &valid, context.engine.max_concurrency, timeout)
            .await?;

        // Rejected repositories keep their slot in the report
        if valid.len() != context.repositories.len() {
            let mut evaluated = std::mem::take(&mut workflow.repositories).into_iter();
            workflow.repositories = context
                .repositories
                .iter()
                .enumerate()
                .filter_map(|(index, repository)| {
                    if context.is_invalid(index) {
                        Some(RepositoryResult::failed(
                            repository.clone(),
                            "Repository failed validation",
                        ))
                    } else {
                        evaluated.next()
                    }
                })
                .collect();
            workflow.summary = aggregate::summarize(&workflow.repositories);
        }

        let summary = &workflow.summary;
        let mut result = StepResult::new(&step.name, step.step_type.clone())
            .with_output("total_repos", summary.total_repos)
            .with_output("successful_repos", summary.successful_repos)
            .with_output("failed_repos", summary.failed_repos)
            .with_output("average_score", summary.average_score)
            .with_workflow(workflow);
        result.complete();
        Ok(result)
    }

    fn supports_step_type(&self, step_type: &StepType) -> bool {
        *step_type == StepType::Checkers
    }
}

/// Renders the workflow produced by an earlier checkers step
///
/// Config: `format` is `json` (default) or `text`; `output` is an optional
/// file path the report is written to.
pub struct ReportingStepExecutor;

#[async_trait]
impl StepExecutor for ReportingStepExecutor {
    async fn execute(
        &self,
        step: &PipelineStep,
        context: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        let workflow = context
            .workflow_result
            .as_ref()
            .ok_or_else(|| StepError::MissingInput {
                step: step.name.clone(),
                input: "a workflow result",
            })?;

        let format = step.config_str("format").unwrap_or("json");
        let report = match format {
            "json" => serde_json::to_string_pretty(workflow)
                .map_err(|e| StepError::Execution(format!("Failed to render report: {}", e)))?,
            "text" => render_text(workflow),
            other => {
                return Err(StepError::Execution(format!(
                    "Unknown report format: {}",
                    other
                )))
            }
        };

        let mut result = StepResult::new(&step.name, step.step_type.clone())
            .with_output("format", format);

        if let Some(path) = step.config_str("output") {
            tokio::fs::write(path, &report).await?;
            info!("Report written to {}", path);
            result = result.with_output("path", path);
        }

        result = result.with_output("report", report);
        result.complete();
        Ok(result)
    }

    fn supports_step_type(&self, step_type: &StepType) -> bool {
        *step_type == StepType::Reporting
    }
}

/// Plain-text rendering of a workflow
pub fn render_text(workflow: &WorkflowResult) -> String {
    let summary = &workflow.summary;
    let mut out = String::new();

    writeln!(out, "Health check {}", workflow.execution_id).ok();
    writeln!(
        out,
        "Repositories: {} total, {} successful, {} failed",
        summary.total_repos, summary.successful_repos, summary.failed_repos
    )
    .ok();
    writeln!(out, "Average score: {:.1}", summary.average_score).ok();
    writeln!(
        out,
        "Issues: {} (critical {}, high {}, medium {}, low {})",
        summary.total_issues,
        summary.severity_counts.get(Severity::Critical),
        summary.severity_counts.get(Severity::High),
        summary.severity_counts.get(Severity::Medium),
        summary.severity_counts.get(Severity::Low),
    )
    .ok();

    for repo in &workflow.repositories {
        writeln!(out).ok();
        writeln!(
            out,
            "{} [{}] score {}",
            repo.repository.name, repo.status, repo.score
        )
        .ok();
        if let Some(error) = &repo.error {
            writeln!(out, "  error: {}", error).ok();
        }
        for check in &repo.checks {
            writeln!(
                out,
                "  {:<20} {:<9} {}/{}",
                check.name, check.status, check.score, check.max_score
            )
            .ok();
            for issue in &check.issues {
                writeln!(out, "    - [{:?}] {}", issue.severity, issue.message).ok();
            }
            if check.status != HealthStatus::Healthy {
                for warning in &check.warnings {
                    writeln!(out, "    ! {}", warning).ok();
                }
            }
        }
    }

    out
}
