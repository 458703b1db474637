//! Execution state models

use crate::core::{pipeline::StepType, result::WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Pipeline ran to the end (individual steps may still have failed)
    Completed,
    /// A step failed under fail-fast, or the pipeline deadline passed
    Failed,
    /// The caller cancelled the run
    Cancelled,
}

/// State of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// Outcome of one executed or skipped step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,

    pub step_type: StepType,

    pub status: StepStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub duration: Duration,

    /// Arbitrary executor output
    pub output: HashMap<String, serde_json::Value>,

    /// Workflow produced by a checkers step
    pub workflow: Option<WorkflowResult>,

    /// Failure text, or the reason a step was skipped
    pub error: Option<String>,

    /// The failed dependency that kept this step from running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
}

impl StepResult {
    /// A fresh running result for the named step
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            name: name.into(),
            step_type,
            status: StepStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration: Duration::ZERO,
            output: HashMap::new(),
            workflow: None,
            error: None,
            blocked_by: None,
        }
    }

    /// A result for a step that was not run
    pub fn skipped(name: impl Into<String>, step_type: StepType, reason: impl Into<String>) -> Self {
        let mut result = Self::new(name, step_type);
        result.status = StepStatus::Skipped;
        result.completed_at = Some(result.started_at);
        result.error = Some(reason.into());
        result
    }

    /// A result for a step skipped because `dependency` did not complete
    pub fn blocked(name: impl Into<String>, step_type: StepType, dependency: &str) -> Self {
        let mut result = Self::skipped(
            name,
            step_type,
            format!("Dependency '{}' did not complete", dependency),
        );
        result.blocked_by = Some(dependency.to_string());
        result
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.output.insert(key.into(), value.into());
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowResult) -> Self {
        self.workflow = Some(workflow);
        self
    }

    /// Mark step as completed
    pub fn complete(&mut self) {
        self.status = StepStatus::Completed;
        self.finish();
    }

    /// Mark step as failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.finish();
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.duration = now
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default();
        self.completed_at = Some(now);
    }
}

/// Aggregated outcome of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique execution ID
    pub execution_id: Uuid,

    pub pipeline_name: String,

    pub status: ExecutionStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// One entry per executed or skipped step, in execution order
    pub steps: Vec<StepResult>,

    /// Workflow from the checkers step, if one ran successfully
    pub workflow_result: Option<WorkflowResult>,
}

impl PipelineResult {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
            workflow_result: None,
        }
    }

    /// Mark pipeline as started
    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.started_at = Utc::now();
    }

    /// Record the final status
    pub fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Get a step result by name
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn failed_steps(&self) -> Vec<&StepResult> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .collect()
    }

    /// Steps skipped because a dependency failed
    pub fn blocked_steps(&self) -> Vec<&StepResult> {
        self.steps.iter().filter(|s| s.blocked_by.is_some()).collect()
    }

    /// Completed with no failed steps and no steps held back by a failure.
    /// Disabled steps do not count against success.
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
            && self.failed_steps().is_empty()
            && self.blocked_steps().is_empty()
    }

    /// Fraction of steps that reached a terminal state (0.0 to 1.0)
    pub fn progress(&self, total_steps: usize) -> f64 {
        if total_steps == 0 {
            return 0.0;
        }
        let done = self.steps.iter().filter(|s| s.status.is_terminal()).count();
        done as f64 / total_steps as f64
    }
}
