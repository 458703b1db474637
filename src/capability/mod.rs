//! Pluggable capabilities: checkers and language analyzers

pub mod registry;

use crate::core::{
    config::{AnalyzerConfig, CheckerConfig},
    AnalysisResult, AnalyzerError, CheckError, CheckResult, FileAnalysis, Repository,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

pub use registry::{AnalyzerRegistry, CheckerRegistry, Registry};

/// What a checker gets to see about the repository it evaluates
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    pub repository: Repository,

    /// Effective configuration (config-file overrides applied)
    pub config: CheckerConfig,

    /// Cancelled when the run's deadline passes
    pub cancel: CancellationToken,
}

/// Trait for checkers - one evaluation of one aspect of a repository
#[async_trait]
pub trait Checker: Send + Sync {
    /// Stable identifier, used as the registry key
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn category(&self) -> &str;

    /// Evaluate the repository
    async fn check(&self, ctx: &RepositoryContext) -> Result<CheckResult, CheckError>;

    fn supports_repository(&self, _repository: &Repository) -> bool {
        true
    }

    /// Built-in configuration, used when the config file has no override
    fn config(&self) -> CheckerConfig {
        CheckerConfig::default()
    }
}

/// Trait for analyzers that produce a whole repository analysis themselves
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Language tag, used as the registry key
    fn language(&self) -> &str;

    fn supported_extensions(&self) -> &[&str];

    fn can_analyze(&self, repository: &Repository) -> bool {
        repository.language.as_deref() == Some(self.language())
    }

    async fn analyze(
        &self,
        path: &Path,
        config: &AnalyzerConfig,
    ) -> Result<AnalysisResult, AnalyzerError>;
}

/// Trait for analyzers that only understand single source files
///
/// The repository-level result is assembled by walking the repository for
/// files with a supported extension.
pub trait SourceAnalyzer: Send + Sync {
    fn language(&self) -> &str;

    fn supported_extensions(&self) -> &[&str];

    fn analyze_source(&self, path: &str, source: &str, config: &AnalyzerConfig) -> FileAnalysis;
}

/// An analyzer as registered: basic analyzers get a synthesized repository
/// walk, full analyzers do the whole job
#[derive(Clone)]
pub enum AnalyzerKind {
    Basic(Arc<dyn SourceAnalyzer>),
    Full(Arc<dyn Analyzer>),
}

impl std::fmt::Debug for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerKind::Basic(a) => write!(f, "Basic({})", a.language()),
            AnalyzerKind::Full(a) => write!(f, "Full({})", a.language()),
        }
    }
}

#[async_trait]
impl Analyzer for AnalyzerKind {
    fn language(&self) -> &str {
        match self {
            AnalyzerKind::Basic(a) => a.language(),
            AnalyzerKind::Full(a) => a.language(),
        }
    }

    fn supported_extensions(&self) -> &[&str] {
        match self {
            AnalyzerKind::Basic(a) => a.supported_extensions(),
            AnalyzerKind::Full(a) => a.supported_extensions(),
        }
    }

    fn can_analyze(&self, repository: &Repository) -> bool {
        match self {
            AnalyzerKind::Basic(a) => repository.language.as_deref() == Some(a.language()),
            AnalyzerKind::Full(a) => a.can_analyze(repository),
        }
    }

    async fn analyze(
        &self,
        path: &Path,
        config: &AnalyzerConfig,
    ) -> Result<AnalysisResult, AnalyzerError> {
        match self {
            AnalyzerKind::Full(a) => a.analyze(path, config).await,
            AnalyzerKind::Basic(a) => {
                let analyzer = a.clone();
                let root = path.to_path_buf();
                let config = config.clone();
                tokio::task::spawn_blocking(move || walk_sources(&root, analyzer.as_ref(), &config))
                    .await
                    .map_err(|e| AnalyzerError::Execution(format!("analysis task failed: {}", e)))?
            }
        }
    }
}

/// Analyze every supported source file under `root`
pub fn walk_sources(
    root: &Path,
    analyzer: &dyn SourceAnalyzer,
    config: &AnalyzerConfig,
) -> Result<AnalysisResult, AnalyzerError> {
    let started = std::time::Instant::now();
    if !root.is_dir() {
        return Err(AnalyzerError::Execution(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let extensions = analyzer.supported_extensions();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, config));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|s| s.eq_ignore_ascii_case(ext)));
        if !supported {
            continue;
        }

        let too_large = entry
            .metadata()
            .map(|m| m.len() > config.max_file_size)
            .unwrap_or(true);
        if too_large {
            debug!("Skipping large file {}", path.display());
            continue;
        }

        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let relative = path.strip_prefix(root).unwrap_or(path).display().to_string();
        files.push(analyzer.analyze_source(&relative, &source, config));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    let mut result = AnalysisResult::from_files(analyzer.language(), files);
    result.duration = started.elapsed();
    Ok(result)
}

fn is_excluded(entry: &DirEntry, config: &AnalyzerConfig) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || config.exclude_dirs.iter().any(|d| d.as_str() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LineCounter;

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
                complexity: source.matches("if ").count() as u32 + 1,
            }
        }
    }

    #[test]
    fn test_walk_sources_filters_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("target/debug")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {\n    if x {}\n}\n").unwrap();
        std::fs::write(root.join("src/lib.rs"), "fn a() {}\n\nfn b() {}\n").unwrap();
        std::fs::write(root.join("target/debug/gen.rs"), "fn generated() {}\n").unwrap();
        std::fs::write(root.join(".git/hook.rs"), "fn hook() {}\n").unwrap();
        std::fs::write(root.join("README.md"), "# readme\n").unwrap();

        let result = walk_sources(root, &LineCounter, &AnalyzerConfig::default()).unwrap();

        assert_eq!(result.language, "rust");
        assert_eq!(result.total_files, 2);
        assert_eq!(result.files[0].path, "src/lib.rs".replace('/', std::path::MAIN_SEPARATOR_STR));
        assert_eq!(result.total_functions, 3);
        assert_eq!(result.max_complexity, 2);
    }

    #[test]
    fn test_walk_sources_missing_root() {
        let result = walk_sources(
            Path::new("/definitely/not/here"),
            &LineCounter,
            &AnalyzerConfig::default(),
        );
        assert!(matches!(result, Err(AnalyzerError::Execution(_))));
    }

    #[tokio::test]
    async fn test_basic_kind_matches_on_language() {
        let kind = AnalyzerKind::Basic(Arc::new(LineCounter));
        assert_eq!(kind.language(), "rust");
        assert!(kind.can_analyze(&Repository::new("a", "/a").with_language("rust")));
        assert!(!kind.can_analyze(&Repository::new("b", "/b").with_language("go")));
        assert!(!kind.can_analyze(&Repository::new("c", "/c")));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn a() {}\n").unwrap();
        let result = kind.analyze(dir.path(), &AnalyzerConfig::default()).await.unwrap();
        assert_eq!(result.total_files, 1);
    }
}
