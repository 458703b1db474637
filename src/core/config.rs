//! Configuration loaded from YAML

use crate::core::{
    pipeline::{Pipeline, PipelineOptions, PipelineStep, StepType},
    repository::Repository,
    result::Severity,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of repositories evaluated at once
    pub max_concurrency: usize,

    /// Deadline for one whole dispatcher run (in seconds)
    pub timeout_secs: u64,

    /// Reuse recent per-repository results within this process
    pub cache_enabled: bool,

    /// How long a cached repository result stays fresh (in seconds)
    pub cache_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            timeout_secs: 600,
            cache_enabled: false,
            cache_ttl_secs: 300,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Per-checker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub enabled: bool,

    /// Severity assigned to issues this checker reports
    pub severity: Severity,

    /// Timeout for one check of one repository (in seconds)
    pub timeout_secs: u64,

    pub categories: Vec<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::Medium,
            timeout_secs: 60,
            categories: Vec::new(),
        }
    }
}

impl CheckerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Per-analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub enabled: bool,

    /// Timeout for analyzing one repository (in seconds)
    pub timeout_secs: u64,

    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,

    /// Files larger than this are skipped (in bytes)
    pub max_file_size: u64,

    /// Per-function complexity above which a file is flagged
    pub complexity_threshold: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 120,
            exclude_dirs: ["target", "node_modules", "vendor", "dist", "build", "__pycache__"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 1024 * 1024,
            complexity_threshold: 10,
        }
    }
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Step type tag: analysis, checkers, reporting, validation or custom:<name>
    #[serde(rename = "type")]
    pub step_type: StepType,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Timeout for this step (in seconds)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Names of steps this step depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Executor-specific settings
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

/// Pipeline configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub fail_fast: bool,

    /// Overall pipeline deadline (in seconds)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Accepted but not acted on
    #[serde(default)]
    pub retry_count: usize,

    /// Accepted but not acted on (in seconds)
    #[serde(default)]
    pub retry_delay_secs: u64,

    /// Overrides the engine's max_concurrency for this pipeline
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Pipeline steps
    pub steps: Vec<StepConfig>,
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the structure of the pipeline (names, dependencies, cycles)
    ///
    /// Executor availability is checked later, by the executor that runs it.
    pub fn validate(&self) -> Result<()> {
        crate::execution::scheduler::validate_structure(&self.to_pipeline())?;
        Ok(())
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        let steps = self
            .steps
            .iter()
            .map(|s| PipelineStep {
                name: s.name.clone(),
                step_type: s.step_type.clone(),
                enabled: s.enabled,
                timeout: s.timeout_secs.map(Duration::from_secs),
                dependencies: s.depends_on.clone(),
                config: s.config.clone(),
            })
            .collect();

        Pipeline {
            name: self.name.clone(),
            description: self.description.clone(),
            steps,
            options: PipelineOptions {
                fail_fast: self.fail_fast,
                timeout: self.timeout_secs.map(Duration::from_secs),
                retry_count: self.retry_count,
                retry_delay: Duration::from_secs(self.retry_delay_secs),
                max_concurrency: self.max_concurrency,
            },
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,

    /// Overrides for checkers, keyed by checker ID
    pub checkers: HashMap<String, CheckerConfig>,

    /// Settings for analyzers, keyed by language tag
    pub analyzers: HashMap<String, AnalyzerConfig>,

    /// Repositories to evaluate when none are given on the command line
    pub repositories: Vec<Repository>,

    /// Named pipelines
    pub pipelines: Vec<PipelineConfig>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, else the default location if it exists, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/repo-health/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("repo-health").join("config.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.max_concurrency == 0 {
            anyhow::bail!("engine.max_concurrency must be at least 1");
        }

        let mut seen = std::collections::HashSet::new();
        for pipeline in &self.pipelines {
            if !seen.insert(&pipeline.name) {
                anyhow::bail!("Duplicate pipeline name: {}", pipeline.name);
            }
            pipeline
                .validate()
                .with_context(|| format!("Invalid pipeline '{}'", pipeline.name))?;
        }

        Ok(())
    }

    /// Override for a checker, if configured
    pub fn checker_config(&self, id: &str) -> Option<&CheckerConfig> {
        self.checkers.get(id)
    }

    /// Settings for an analyzer, falling back to defaults
    pub fn analyzer_config(&self, language: &str) -> AnalyzerConfig {
        self.analyzers.get(language).cloned().unwrap_or_default()
    }

    /// Find a configured pipeline by name
    pub fn pipeline(&self, name: &str) -> Option<&PipelineConfig> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
engine:
  max_concurrency: 8
  timeout_secs: 120
  cache_enabled: true
checkers:
  git-status:
    enabled: false
  readme:
    severity: high
    timeout_secs: 5
analyzers:
  rust:
    complexity_threshold: 15
repositories:
  - name: "core"
    path: "/srv/core"
    language: "rust"
pipelines:
  - name: "nightly"
    fail_fast: false
    timeout_secs: 900
    steps:
      - name: "validate"
        type: "validation"
      - name: "check"
        type: "checkers"
        depends_on: ["validate"]
        timeout_secs: 300
      - name: "report"
        type: "reporting"
        depends_on: ["check"]
        config:
          format: "json"
          output: "report.json"
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.engine.max_concurrency, 8);
        assert_eq!(config.engine.timeout(), Duration::from_secs(120));
        assert!(config.engine.cache_enabled);
        assert_eq!(config.engine.cache_ttl_secs, 300);

        assert!(!config.checker_config("git-status").unwrap().enabled);
        let readme = config.checker_config("readme").unwrap();
        assert_eq!(readme.severity, Severity::High);
        assert_eq!(readme.timeout(), Duration::from_secs(5));
        assert!(config.checker_config("license").is_none());

        assert_eq!(config.analyzer_config("rust").complexity_threshold, 15);
        assert_eq!(config.analyzer_config("go"), AnalyzerConfig::default());

        assert_eq!(config.repositories[0].language.as_deref(), Some("rust"));

        let pipeline = config.pipeline("nightly").unwrap().to_pipeline();
        assert!(!pipeline.options.fail_fast);
        assert_eq!(pipeline.options.timeout, Some(Duration::from_secs(900)));
        assert_eq!(pipeline.steps.len(), 3);
        assert_eq!(pipeline.steps[1].step_type, StepType::Checkers);
        assert_eq!(pipeline.steps[1].timeout, Some(Duration::from_secs(300)));
        assert_eq!(pipeline.steps[2].config_str("output"), Some("report.json"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.pipelines.is_empty());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let yaml = "engine:\n  max_concurrency: 0\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_dependency_fails() {
        let yaml = r#"
name: "Test Pipeline"
steps:
  - name: "check"
    type: "checkers"
    depends_on: ["nonexistent"]
"#;

        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_duplicate_step_name_fails() {
        let yaml = r#"
name: "Test Pipeline"
steps:
  - name: "check"
    type: "checkers"
  - name: "check"
    type: "reporting"
"#;

        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_unknown_step_type_fails() {
        let yaml = r#"
name: "Test Pipeline"
steps:
  - name: "ship"
    type: "deploy"
"#;

        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_custom_step_type_and_retry_fields_parse() {
        let yaml = r#"
name: "Test Pipeline"
retry_count: 3
retry_delay_secs: 10
steps:
  - name: "notify"
    type: "custom:notify"
    enabled: false
"#;

        let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline();
        assert_eq!(pipeline.options.retry_count, 3);
        assert_eq!(pipeline.options.retry_delay, Duration::from_secs(10));
        assert!(pipeline.options.fail_fast);
        assert_eq!(pipeline.steps[0].step_type, StepType::Custom("notify".into()));
        assert!(!pipeline.steps[0].enabled);
    }
}
