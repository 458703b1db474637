//! repo-health - concurrent health checks and analysis pipelines for many repositories

pub mod capability;
pub mod checkers;
pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use capability::{Analyzer, AnalyzerKind, Checker, Registry, RepositoryContext, SourceAnalyzer};
pub use core::{
    CheckResult, ExecutionStatus, HealthStatus, Pipeline, PipelineResult, PipelineStep, Repository,
    StepType, WorkflowResult,
};
pub use execution::{EngineEvent, HealthCheckEngine, PipelineExecutor, StepExecutor};
