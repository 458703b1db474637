//! Health check execution: dispatcher, aggregation and pipelines

pub mod aggregate;
pub mod cache;
pub mod engine;
pub mod executor;
pub mod pipeline_executor;
pub mod scheduler;

pub use cache::{CacheKey, ResultCache};
pub use engine::{AnalysisOutcome, EngineEvent, EventHandler, HealthCheckEngine};
pub use executor::{
    AnalysisStepExecutor, CheckersStepExecutor, ReportingStepExecutor, StepExecutor,
    ValidationStepExecutor,
};
pub use pipeline_executor::PipelineExecutor;
