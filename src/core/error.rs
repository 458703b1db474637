//! Error types for the health-check core

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the capability registries
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
}

/// Error types for checker execution
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Check failed: {0}")]
    Execution(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Check cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error types for analyzer execution
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Analysis failed: {0}")]
    Execution(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level dispatcher misconfiguration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("max_concurrency must be at least 1")]
    InvalidConcurrency,
}

/// Errors raised by a step executor
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{0}")]
    Execution(String),

    #[error("Step '{step}' requires {input}, which no earlier step produced")]
    MissingInput { step: String, input: &'static str },

    #[error("Step timed out after {0:?}")]
    Timeout(Duration),

    #[error("Step cancelled")]
    Cancelled,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline validation failures, raised before any step runs
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Pipeline name must not be empty")]
    EmptyName,

    #[error("Pipeline '{0}' has no steps")]
    NoSteps(String),

    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Step '{step}' depends on non-existent step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("No executor registered for step type '{step_type}' (step '{step}')")]
    MissingExecutor { step: String, step_type: String },

    #[error("Cycle detected in dependency graph involving step '{0}'")]
    DependencyCycle(String),
}
