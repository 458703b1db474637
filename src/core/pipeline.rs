//! Pipeline domain model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Type tag of a pipeline step, used to select its executor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StepType {
    Analysis,
    Checkers,
    Reporting,
    Validation,
    /// User-defined step type, written as `custom:<name>`
    Custom(String),
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepType::Analysis => f.write_str("analysis"),
            StepType::Checkers => f.write_str("checkers"),
            StepType::Reporting => f.write_str("reporting"),
            StepType::Validation => f.write_str("validation"),
            StepType::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(StepType::Analysis),
            "checkers" => Ok(StepType::Checkers),
            "reporting" => Ok(StepType::Reporting),
            "validation" => Ok(StepType::Validation),
            other => match other.strip_prefix("custom:") {
                Some(name) if !name.is_empty() => Ok(StepType::Custom(name.to_string())),
                _ => Err(format!("Unknown step type: {}", other)),
            },
        }
    }
}

impl TryFrom<String> for StepType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StepType> for String {
    fn from(value: StepType) -> Self {
        value.to_string()
    }
}

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStep {
    /// Unique step name within the pipeline
    pub name: String,

    pub step_type: StepType,

    /// Disabled steps are recorded as skipped and never executed
    pub enabled: bool,

    /// Per-step timeout, capped by the pipeline's remaining time
    pub timeout: Option<Duration>,

    /// Names of steps that must run before this one
    pub dependencies: Vec<String>,

    /// Executor-specific settings
    pub config: HashMap<String, serde_json::Value>,
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            name: name.into(),
            step_type,
            enabled: true,
            timeout: None,
            dependencies: Vec::new(),
            config: HashMap::new(),
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// String setting from the step config
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// Boolean setting from the step config
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(|v| v.as_bool())
    }
}

/// Pipeline-wide execution policy
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Stop at the first failed step and mark the pipeline failed
    pub fail_fast: bool,

    /// Overall deadline for the pipeline
    pub timeout: Option<Duration>,

    /// Accepted for compatibility; retries are not performed
    pub retry_count: usize,

    /// Accepted for compatibility; retries are not performed
    pub retry_delay: Duration,

    /// Overrides the engine's concurrency for steps that dispatch work
    pub max_concurrency: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fail_fast: true,
            timeout: None,
            retry_count: 0,
            retry_delay: Duration::ZERO,
            max_concurrency: None,
        }
    }
}

/// A named, ordered sequence of typed steps
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub name: String,

    pub description: Option<String>,

    pub steps: Vec<PipelineStep>,

    pub options: PipelineOptions,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps: Vec::new(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.options.fail_fast = fail_fast;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// The default health-check pipeline: validate, analyze, check, report
    pub fn standard(name: impl Into<String>) -> Self {
        Pipeline::new(name)
            .with_step(PipelineStep::new("validate", StepType::Validation))
            .with_step(PipelineStep::new("analyze", StepType::Analysis).depends_on("validate"))
            .with_step(PipelineStep::new("check", StepType::Checkers).depends_on("validate"))
            .with_step(
                PipelineStep::new("report", StepType::Reporting)
                    .depends_on("check")
                    .with_config("format", "text"),
            )
    }
}
