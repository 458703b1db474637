//! Test utility functions for repo-health

#![allow(dead_code)]

use async_trait::async_trait;
use repo_health::capability::{Checker, Registry, RepositoryContext, SourceAnalyzer};
use repo_health::core::config::{AnalyzerConfig, AppConfig};
use repo_health::core::{
    CheckError, CheckResult, ExecutionContext, FileAnalysis, HealthStatus, PipelineResult,
    PipelineStep, Repository, StepError, StepResult, StepStatus, StepType,
};
use repo_health::execution::{HealthCheckEngine, StepExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Checker that reports a fixed status and score after an optional delay
pub struct StubChecker {
    pub id: String,
    pub status: HealthStatus,
    pub score: u32,
    pub delay: Option<Duration>,
}

impl StubChecker {
    pub fn new(id: &str, status: HealthStatus, score: u32) -> Self {
        Self {
            id: id.to_string(),
            status,
            score,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Checker for StubChecker {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn category(&self) -> &str {
        "test"
    }

    async fn check(&self, _ctx: &RepositoryContext) -> Result<CheckResult, CheckError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(CheckResult::new(&self.id, &self.id, "test", 100)
            .with_status(self.status)
            .with_score(self.score))
    }
}

/// Checker that fails for repositories whose name is in `fail_for`
pub struct FailingChecker {
    pub fail_for: Vec<String>,
}

#[async_trait]
impl Checker for FailingChecker {
    fn id(&self) -> &str {
        "failing"
    }

    fn name(&self) -> &str {
        "Failing"
    }

    fn category(&self) -> &str {
        "test"
    }

    async fn check(&self, ctx: &RepositoryContext) -> Result<CheckResult, CheckError> {
        if self.fail_for.contains(&ctx.repository.name) {
            return Err(CheckError::Execution(format!("boom in {}", ctx.repository.name)));
        }
        Ok(CheckResult::new("failing", "Failing", "test", 100))
    }
}

/// Checker that panics for repositories whose name is in `panic_for`
pub struct PanickingChecker {
    pub panic_for: Vec<String>,
}

#[async_trait]
impl Checker for PanickingChecker {
    fn id(&self) -> &str {
        "panicking"
    }

    fn name(&self) -> &str {
        "Panicking"
    }

    fn category(&self) -> &str {
        "test"
    }

    async fn check(&self, ctx: &RepositoryContext) -> Result<CheckResult, CheckError> {
        if self.panic_for.contains(&ctx.repository.name) {
            panic!("checker exploded on {}", ctx.repository.name);
        }
        Ok(CheckResult::new("panicking", "Panicking", "test", 100))
    }
}

/// Checker that stalls for repositories whose name is in `stall_for`
pub struct StallingChecker {
    pub stall_for: Vec<String>,
}

#[async_trait]
impl Checker for StallingChecker {
    fn id(&self) -> &str {
        "stalling"
    }

    fn name(&self) -> &str {
        "Stalling"
    }

    fn category(&self) -> &str {
        "test"
    }

    async fn check(&self, ctx: &RepositoryContext) -> Result<CheckResult, CheckError> {
        if self.stall_for.contains(&ctx.repository.name) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(CheckResult::new("stalling", "Stalling", "test", 100))
    }
}

/// Checker that records how many checks run at the same time
#[derive(Default)]
pub struct ConcurrencyGauge {
    pub current: AtomicUsize,
    pub peak: AtomicUsize,
    pub delay: Duration,
}

impl ConcurrencyGauge {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Checker for ConcurrencyGauge {
    fn id(&self) -> &str {
        "gauge"
    }

    fn name(&self) -> &str {
        "Gauge"
    }

    fn category(&self) -> &str {
        "test"
    }

    async fn check(&self, _ctx: &RepositoryContext) -> Result<CheckResult, CheckError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(CheckResult::new("gauge", "Gauge", "test", 100))
    }
}

/// Basic analyzer counting lines and `fn` keywords in Rust sources
pub struct LineCounter;

impl SourceAnalyzer for LineCounter {
    fn language(&self) -> &str {
        "rust"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn analyze_source(&self, path: &str, source: &str, _config: &AnalyzerConfig) -> FileAnalysis {
        FileAnalysis {
            path: path.to_string(),
            lines: source.lines().count(),
            code_lines: source.lines().filter(|l| !l.trim().is_empty()).count(),
            functions: source.matches("fn ").count(),
            complexity: 1,
        }
    }
}

/// Step executor that records its calls and can be told to fail or stall
pub struct RecordingStep {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_on: Vec<String>,
    pub delay: Option<Duration>,
}

impl RecordingStep {
    pub fn new(calls: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            calls,
            fail_on: Vec::new(),
            delay: None,
        }
    }

    pub fn failing_on(mut self, step: &str) -> Self {
        self.fail_on.push(step.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl StepExecutor for RecordingStep {
    async fn execute(
        &self,
        step: &PipelineStep,
        _context: &ExecutionContext,
    ) -> Result<StepResult, StepError> {
        self.calls.lock().unwrap().push(step.name.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on.contains(&step.name) {
            return Err(StepError::Execution(format!("{} failed", step.name)));
        }
        let mut result = StepResult::new(&step.name, step.step_type.clone());
        result.complete();
        Ok(result)
    }

    fn supports_step_type(&self, step_type: &StepType) -> bool {
        matches!(step_type, StepType::Custom(_))
    }
}

/// The custom step type the recording executor is registered for
pub fn custom() -> StepType {
    StepType::Custom("test".to_string())
}

pub fn repos(names: &[&str]) -> Vec<Repository> {
    names
        .iter()
        .map(|name| Repository::new(*name, format!("/repos/{}", name)))
        .collect()
}

pub fn engine_with(checkers: Vec<Arc<dyn Checker>>) -> Arc<HealthCheckEngine> {
    let registry = Registry::new();
    for checker in checkers {
        registry.checkers.register(checker);
    }
    Arc::new(HealthCheckEngine::new(Arc::new(registry), Arc::new(AppConfig::default())))
}

pub fn step_names(result: &PipelineResult) -> Vec<&str> {
    result.steps.iter().map(|s| s.name.as_str()).collect()
}

pub fn assert_step_status(result: &PipelineResult, step: &str, status: StepStatus) {
    let found = result
        .step(step)
        .unwrap_or_else(|| panic!("step {} missing from result", step));
    assert_eq!(found.status, status, "unexpected status for step {}", step);
}
