//! Pipeline executor - runs a pipeline's steps in dependency order

use crate::{
    core::{
        ExecutionContext, ExecutionStatus, Pipeline, PipelineError, PipelineResult, PipelineStep,
        Repository, StepError, StepResult, StepStatus, StepType,
    },
    execution::{
        executor::{
            AnalysisStepExecutor, CheckersStepExecutor, ReportingStepExecutor, StepExecutor,
            ValidationStepExecutor,
        },
        scheduler, HealthCheckEngine,
    },
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long a step may keep running after its deadline fires, to hand back
/// partial results
const STEP_GRACE: Duration = Duration::from_millis(500);

/// Sequences pipeline steps through their registered executors
pub struct PipelineExecutor {
    engine: Arc<HealthCheckEngine>,
    executors: HashMap<StepType, Arc<dyn StepExecutor>>,
}

impl PipelineExecutor {
    /// An executor with no step executors registered
    pub fn new(engine: Arc<HealthCheckEngine>) -> Self {
        Self {
            engine,
            executors: HashMap::new(),
        }
    }

    /// An executor with the built-in validation, analysis, checkers and
    /// reporting step executors
    pub fn with_defaults(engine: Arc<HealthCheckEngine>) -> Self {
        let mut executor = Self::new(engine.clone());
        executor.register_step_executor(StepType::Validation, Arc::new(ValidationStepExecutor));
        executor.register_step_executor(
            StepType::Analysis,
            Arc::new(AnalysisStepExecutor::new(engine.clone())),
        );
        executor.register_step_executor(
            StepType::Checkers,
            Arc::new(CheckersStepExecutor::new(engine)),
        );
        executor.register_step_executor(StepType::Reporting, Arc::new(ReportingStepExecutor));
        executor
    }

    pub fn engine(&self) -> &Arc<HealthCheckEngine> {
        &self.engine
    }

    /// Register the handler for a step type, replacing any previous one
    pub fn register_step_executor(&mut self, step_type: StepType, executor: Arc<dyn StepExecutor>) {
        if self.executors.insert(step_type.clone(), executor).is_some() {
            info!("Replaced step executor for '{}'", step_type);
        }
    }

    /// Step types with a registered executor
    pub fn step_types(&self) -> Vec<&StepType> {
        self.executors.keys().collect()
    }

    fn executor_for(&self, step_type: &StepType) -> Option<&Arc<dyn StepExecutor>> {
        self.executors
            .get(step_type)
            .filter(|executor| executor.supports_step_type(step_type))
    }

    /// Check a pipeline can run: structure plus an executor for every step
    pub fn validate_pipeline(&self, pipeline: &Pipeline) -> Result<(), PipelineError> {
        scheduler::validate_structure(pipeline)?;

        for step in &pipeline.steps {
            if self.executor_for(&step.step_type).is_none() {
                return Err(PipelineError::MissingExecutor {
                    step: step.name.clone(),
                    step_type: step.step_type.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Execute a pipeline against the given repositories
    ///
    /// Validation failures are returned as `Err` before any step runs. Step
    /// failures are recorded in the returned result.
    ///
    /// A step whose dependency failed (or was itself held back) is recorded
    /// as skipped with `blocked_by` set, and counts against
    /// [`PipelineResult::is_success`]; a disabled step does not. When a step
    /// deadline passes, the step's cancellation token fires and whatever the
    /// executor returns within a short grace period is kept on the failed
    /// step, including a partial workflow.
    pub async fn execute_pipeline(
        &self,
        cancel: &CancellationToken,
        pipeline: &Pipeline,
        repositories: &[Repository],
    ) -> Result<PipelineResult, PipelineError> {
        self.validate_pipeline(pipeline)?;
        let order = scheduler::execution_order(pipeline)?;
        let options = &pipeline.options;

        if options.retry_count > 0 || !options.retry_delay.is_zero() {
            warn!(
                "Pipeline '{}' configures retries ({} after {:?}); retries are not supported and will not be attempted",
                pipeline.name, options.retry_count, options.retry_delay
            );
        }

        let mut engine_config = self.engine.config().engine.clone();
        if let Some(max_concurrency) = options.max_concurrency {
            engine_config.max_concurrency = max_concurrency;
        }

        let scope = cancel.child_token();
        let deadline = options.timeout.map(|t| Instant::now() + t);
        let mut context = ExecutionContext::new(repositories.to_vec(), engine_config, scope.clone());

        let mut result = PipelineResult::new(&pipeline.name);
        result.start();
        info!(
            "Starting pipeline execution: {} ({})",
            pipeline.name, result.execution_id
        );

        // Steps that failed, or were skipped because a dependency failed
        let mut blocked: HashSet<String> = HashSet::new();
        let mut status = ExecutionStatus::Completed;

        for index in order {
            let step = &pipeline.steps[index];

            if cancel.is_cancelled() {
                status = ExecutionStatus::Cancelled;
                break;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        error!("Pipeline '{}' exceeded its deadline", pipeline.name);
                        status = ExecutionStatus::Failed;
                        break;
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            if !step.enabled {
                info!("Skipping disabled step: {}", step.name);
                result.steps.push(StepResult::skipped(
                    &step.name,
                    step.step_type.clone(),
                    "Step is disabled",
                ));
                continue;
            }

            if let Some(dependency) = step.dependencies.iter().find(|d| blocked.contains(*d)) {
                warn!(
                    "Skipping step {}: dependency '{}' did not complete",
                    step.name, dependency
                );
                blocked.insert(step.name.clone());
                result
                    .steps
                    .push(StepResult::blocked(&step.name, step.step_type.clone(), dependency));
                continue;
            }

            let Some(executor) = self.executor_for(&step.step_type) else {
                return Err(PipelineError::MissingExecutor {
                    step: step.name.clone(),
                    step_type: step.step_type.to_string(),
                });
            };

            let limit = match (step.timeout, remaining) {
                (Some(step_limit), Some(remaining)) => Some(step_limit.min(remaining)),
                (step_limit, remaining) => step_limit.or(remaining),
            };

            info!("Executing step: {}", step.name);
            let started_at = Utc::now();
            let step_scope = scope.child_token();
            let step_deadline = limit.map(|limit| Instant::now() + limit);
            let step_context = context.for_step(&step.name, step_scope.clone(), step_deadline);
            let outcome = run_step(executor.as_ref(), step, &step_context, limit, cancel).await;
            step_scope.cancel();

            match outcome {
                Ok(mut step_result) if step_result.status != StepStatus::Failed => {
                    if step_result.status != StepStatus::Completed {
                        step_result.complete();
                    }
                    info!("Step {} completed", step.name);
                    self.publish(&mut context, &mut result, step, &step_result);
                    result.steps.push(step_result);
                }
                outcome => {
                    let mut step_result = match outcome {
                        Ok(failed) => failed,
                        Err(e) => {
                            let mut failed = StepResult::new(&step.name, step.step_type.clone());
                            failed.started_at = started_at;
                            failed.fail(e.to_string());
                            failed
                        }
                    };
                    if step_result.error.is_none() {
                        step_result.error = Some("Step reported failure".to_string());
                    }
                    error!(
                        "Step {} failed: {}",
                        step.name,
                        step_result.error.as_deref().unwrap_or_default()
                    );
                    if let Some(workflow) = &step_result.workflow {
                        warn!("Keeping partial workflow from step {}", step.name);
                        context.workflow_result = Some(workflow.clone());
                        if step.step_type == StepType::Checkers {
                            result.workflow_result = Some(workflow.clone());
                        }
                    }
                    blocked.insert(step.name.clone());
                    result.steps.push(step_result);

                    if cancel.is_cancelled() {
                        status = ExecutionStatus::Cancelled;
                        break;
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        error!("Pipeline '{}' exceeded its deadline", pipeline.name);
                        status = ExecutionStatus::Failed;
                        break;
                    }
                    if options.fail_fast {
                        status = ExecutionStatus::Failed;
                        break;
                    }
                }
            }
        }

        scope.cancel();
        result.finish(status);
        info!(
            "Pipeline '{}' finished with status {:?}",
            pipeline.name, result.status
        );
        Ok(result)
    }

    /// Make a completed step's output visible to later steps
    fn publish(
        &self,
        context: &mut ExecutionContext,
        result: &mut PipelineResult,
        step: &PipelineStep,
        step_result: &StepResult,
    ) {
        context.set_step_output(&step.name, step_result.output.clone());

        if let Some(workflow) = &step_result.workflow {
            context.workflow_result = Some(workflow.clone());
            if step.step_type == StepType::Checkers {
                result.workflow_result = Some(workflow.clone());
            }
        }

        if step.step_type == StepType::Validation {
            if let Some(invalid) = step_result
                .output
                .get("invalid_indices")
                .and_then(|v| v.as_array())
            {
                context.invalid_repositories.extend(
                    invalid
                        .iter()
                        .filter_map(|v| v.as_u64())
                        .map(|index| index as usize),
                );
            }
        }
    }
}

/// Run one step, bounded by its deadline and the caller's cancellation
///
/// At the deadline the step's token is cancelled and the executor gets
/// [`STEP_GRACE`] to return. A result handed back at or after the deadline
/// is marked failed with the timeout, keeping its output and workflow.
async fn run_step(
    executor: &dyn StepExecutor,
    step: &PipelineStep,
    context: &ExecutionContext,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<StepResult, StepError> {
    let execution = executor.execute(step, context);
    tokio::pin!(execution);

    let expired = async {
        match context.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };

    let outcome = tokio::select! {
        outcome = &mut execution => outcome,
        _ = expired => {
            debug!("Step {} reached its deadline, cancelling", step.name);
            context.cancel.cancel();
            tokio::select! {
                outcome = timeout(STEP_GRACE, &mut execution) => {
                    outcome.unwrap_or(Err(StepError::Cancelled))
                }
                _ = cancel.cancelled() => Err(StepError::Cancelled),
            }
        }
        _ = cancel.cancelled() => return Err(StepError::Cancelled),
    };

    if cancel.is_cancelled() {
        return Err(StepError::Cancelled);
    }

    let Some(limit) = limit else {
        return outcome;
    };
    if context.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return match outcome {
            Ok(mut partial) => {
                partial.fail(StepError::Timeout(limit).to_string());
                Ok(partial)
            }
            Err(_) => Err(StepError::Timeout(limit)),
        };
    }
    outcome
}
