//! Execution context - shared state handed to each step

use crate::core::{config::EngineConfig, repository::Repository, result::WorkflowResult};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Execution context for a pipeline run
///
/// Contains the repositories under evaluation, outputs from earlier steps,
/// and the cancellation scope bound to the pipeline's deadline.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Repositories under evaluation, in input order
    pub repositories: Vec<Repository>,

    /// Engine settings, with any pipeline overrides applied
    pub engine: EngineConfig,

    /// Outputs from completed steps (step name -> output bag)
    pub step_outputs: HashMap<String, HashMap<String, serde_json::Value>>,

    /// Latest workflow produced by a checkers step
    pub workflow_result: Option<WorkflowResult>,

    /// Input indices of repositories rejected by a validation step
    pub invalid_repositories: HashSet<usize>,

    /// The current step being executed (if any)
    pub current_step: Option<String>,

    /// Cancelled when the pipeline (or current step) deadline passes
    pub cancel: CancellationToken,

    /// When the current step must be finished, if it is bounded
    pub deadline: Option<Instant>,
}

impl ExecutionContext {
    /// Create a new context
    pub fn new(repositories: Vec<Repository>, engine: EngineConfig, cancel: CancellationToken) -> Self {
        Self {
            repositories,
            engine,
            step_outputs: HashMap::new(),
            workflow_result: None,
            invalid_repositories: HashSet::new(),
            current_step: None,
            cancel,
            deadline: None,
        }
    }

    /// Set the output of a step
    pub fn set_step_output(&mut self, step: &str, output: HashMap<String, serde_json::Value>) {
        self.step_outputs.insert(step.to_string(), output);
    }

    /// Get the output of a step
    pub fn get_step_output(&self, step: &str) -> Option<&HashMap<String, serde_json::Value>> {
        self.step_outputs.get(step)
    }

    /// Repositories that passed validation (all of them if none ran)
    pub fn valid_repositories(&self) -> Vec<Repository> {
        self.repositories
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.invalid_repositories.contains(index))
            .map(|(_, repository)| repository.clone())
            .collect()
    }

    pub fn is_invalid(&self, index: usize) -> bool {
        self.invalid_repositories.contains(&index)
    }

    /// Time left before the step deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// A copy of this context scoped to one step
    pub fn for_step(&self, step: &str, cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        let mut context = self.clone();
        context.current_step = Some(step.to_string());
        context.cancel = cancel;
        context.deadline = deadline;
        context
    }
}
