//! Concurrent dispatcher - evaluates many repositories in parallel

use crate::{
    capability::{Analyzer, Checker, Registry, RepositoryContext},
    core::{
        config::{AppConfig, CheckerConfig},
        AnalysisResult, CheckError, CheckResult, EngineError, HealthStatus,
        Repository, RepositoryResult, WorkflowResult, WorkflowSummary,
    },
    execution::{
        aggregate,
        cache::{CacheKey, ResultCache},
    },
};
use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a dispatcher run
#[derive(Debug, Clone)]
pub enum EngineEvent {
    RunStarted {
        execution_id: Uuid,
        total_repos: usize,
    },
    RepositoryStarted {
        index: usize,
        name: String,
    },
    RepositoryCompleted {
        index: usize,
        name: String,
        status: HealthStatus,
        score: u32,
    },
    RunCompleted {
        execution_id: Uuid,
        summary: WorkflowSummary,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// What happened when a repository was offered to its analyzer
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// No language, no registered analyzer, or the analyzer declined
    Skipped,
    Analyzed(AnalysisResult),
    Failed(String),
}

/// Why a dispatcher run stopped waiting for its tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Finished,
    DeadlineExceeded,
    Cancelled,
}

/// Shared, cheaply cloned handles every repository task needs
#[derive(Clone)]
struct Shared {
    registry: Arc<Registry>,
    config: Arc<AppConfig>,
    handlers: Arc<RwLock<Vec<EventHandler>>>,
    cache: Option<Arc<ResultCache>>,
}

impl Shared {
    fn emit(&self, event: EngineEvent) {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }
}

/// Bounded-concurrency health check dispatcher
pub struct HealthCheckEngine {
    shared: Shared,
}

impl HealthCheckEngine {
    pub fn new(registry: Arc<Registry>, config: Arc<AppConfig>) -> Self {
        let cache = config
            .engine
            .cache_enabled
            .then(|| Arc::new(ResultCache::new(config.engine.cache_ttl())));

        Self {
            shared: Shared {
                registry,
                config,
                handlers: Arc::new(RwLock::new(Vec::new())),
                cache,
            },
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.shared.registry
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.shared.config
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Evaluate every repository with the configured concurrency and deadline
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        repositories: &[Repository],
    ) -> Result<WorkflowResult, EngineError> {
        let engine = &self.shared.config.engine;
        self.execute_health_check(cancel, repositories, engine.max_concurrency, engine.timeout())
            .await
    }

    /// Evaluate every repository, at most `max_concurrency` at a time
    ///
    /// The result holds one entry per input repository, in input order.
    /// Repositories still running when `timeout` passes or `cancel` fires are
    /// reported as `Unknown` with an error; finished ones are kept.
    pub async fn execute_health_check(
        &self,
        cancel: &CancellationToken,
        repositories: &[Repository],
        max_concurrency: usize,
        timeout: Duration,
    ) -> Result<WorkflowResult, EngineError> {
        if max_concurrency == 0 {
            return Err(EngineError::InvalidConcurrency);
        }

        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Starting health check {} for {} repositories (max concurrency {})",
            execution_id,
            repositories.len(),
            max_concurrency
        );
        self.shared.emit(EngineEvent::RunStarted {
            execution_id,
            total_repos: repositories.len(),
        });

        let scope = cancel.child_token();
        let slots: Arc<Mutex<Vec<Option<RepositoryResult>>>> =
            Arc::new(Mutex::new(vec![None; repositories.len()]));
        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, repository) in repositories.iter().enumerate() {
            let shared = self.shared.clone();
            let slots = slots.clone();
            let semaphore = semaphore.clone();
            let scope = scope.clone();
            let repository = repository.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                    _ = scope.cancelled() => return,
                };

                shared.emit(EngineEvent::RepositoryStarted {
                    index,
                    name: repository.name.clone(),
                });

                let checkers = active_checkers(&shared, &repository);
                let cache = shared.cache.as_ref().map(|cache| {
                    let ids = checkers.iter().map(|(c, _)| c.id().to_string()).collect();
                    (cache.clone(), CacheKey::new(&repository, ids))
                });
                let cached = match &cache {
                    Some((cache, key)) => cache.get(key, &repository).await,
                    None => None,
                };
                let result = match cached {
                    Some(result) => result,
                    None => {
                        let Some(result) = evaluate(&shared, repository, checkers, &scope).await
                        else {
                            return;
                        };
                        if let Some((cache, key)) = cache {
                            cache.insert(key, &result).await;
                        }
                        result
                    }
                };

                shared.emit(EngineEvent::RepositoryCompleted {
                    index,
                    name: result.repository.name.clone(),
                    status: result.status,
                    score: result.score,
                });
                slots.lock().await[index] = Some(result);
            });
        }

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut end = RunEnd::Finished;
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(e)) if e.is_panic() => error!("Repository task panicked: {}", e),
                    Some(Err(e)) => debug!("Repository task ended early: {}", e),
                },
                _ = &mut deadline => {
                    end = RunEnd::DeadlineExceeded;
                    break;
                }
                _ = cancel.cancelled() => {
                    end = RunEnd::Cancelled;
                    break;
                }
            }
        }

        // Tasks give up without a result once the caller cancels, so the
        // join loop can drain before it observes the cancellation itself.
        if end == RunEnd::Finished && cancel.is_cancelled() {
            end = RunEnd::Cancelled;
        }

        scope.cancel();
        if end != RunEnd::Finished {
            warn!(
                "Health check {} stopped early ({:?}), aborting {} outstanding tasks",
                execution_id,
                end,
                tasks.len()
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        let slots = std::mem::take(&mut *slots.lock().await);
        let results: Vec<RepositoryResult> = slots
            .into_iter()
            .zip(repositories)
            .map(|(slot, repository)| {
                slot.unwrap_or_else(|| {
                    let reason = match end {
                        RunEnd::DeadlineExceeded => {
                            format!("Health check deadline of {:?} exceeded", timeout)
                        }
                        RunEnd::Cancelled => "Health check cancelled".to_string(),
                        RunEnd::Finished => "Repository evaluation panicked".to_string(),
                    };
                    RepositoryResult::failed(repository.clone(), reason)
                })
            })
            .collect();

        let summary = aggregate::summarize(&results);
        info!(
            "Health check {} finished: {}/{} repositories successful",
            execution_id, summary.successful_repos, summary.total_repos
        );
        self.shared.emit(EngineEvent::RunCompleted {
            execution_id,
            summary: summary.clone(),
        });

        Ok(WorkflowResult {
            execution_id,
            started_at,
            completed_at: Utc::now(),
            repositories: results,
            summary,
        })
    }

    /// Run only the analyzer for one repository
    pub async fn analyze(&self, repository: &Repository, cancel: &CancellationToken) -> AnalysisOutcome {
        run_analyzer(&self.shared, repository, cancel).await
    }

    /// Run analyzers for every repository, at most `max_concurrency` at a time
    ///
    /// Outcomes are in input order. Repositories not reached before `cancel`
    /// fires are reported as failed.
    pub async fn analyze_all(
        &self,
        cancel: &CancellationToken,
        repositories: &[Repository],
        max_concurrency: usize,
    ) -> Result<Vec<AnalysisOutcome>, EngineError> {
        if max_concurrency == 0 {
            return Err(EngineError::InvalidConcurrency);
        }

        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, repository) in repositories.iter().enumerate() {
            let shared = self.shared.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let repository = repository.clone();

            tasks.spawn(async move {
                let outcome = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(_permit) => run_analyzer(&shared, &repository, &cancel).await,
                        Err(_) => AnalysisOutcome::Failed("analysis gate closed".to_string()),
                    },
                    _ = cancel.cancelled() => AnalysisOutcome::Failed("analysis cancelled".to_string()),
                };
                (index, outcome)
            });
        }

        let mut outcomes = vec![None; repositories.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => error!("Analysis task failed: {}", e),
            }
        }

        Ok(outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| AnalysisOutcome::Failed("analysis task panicked".to_string())))
            .collect())
    }
}

/// Registered checkers that apply to `repository` and are enabled, in
/// registration order, with their effective configuration
fn active_checkers(shared: &Shared, repository: &Repository) -> Vec<(Arc<dyn Checker>, CheckerConfig)> {
    shared
        .registry
        .checkers
        .get_all()
        .into_iter()
        .filter(|checker| {
            let applies = checker.supports_repository(repository);
            if !applies {
                debug!("Checker {} does not apply to {}", checker.id(), repository.name);
            }
            applies
        })
        .filter_map(|checker| {
            let config = shared
                .config
                .checker_config(checker.id())
                .cloned()
                .unwrap_or_else(|| checker.config());
            config.enabled.then_some((checker, config))
        })
        .collect()
}

/// Evaluate one repository; `None` if the scope was cancelled midway
async fn evaluate(
    shared: &Shared,
    repository: Repository,
    checkers: Vec<(Arc<dyn Checker>, CheckerConfig)>,
    cancel: &CancellationToken,
) -> Option<RepositoryResult> {
    let started_at = Utc::now();
    debug!("Evaluating repository {}", repository.name);

    let analysis = match run_analyzer(shared, &repository, cancel).await {
        AnalysisOutcome::Analyzed(result) => Some(result),
        AnalysisOutcome::Skipped | AnalysisOutcome::Failed(_) => None,
    };
    if cancel.is_cancelled() {
        return None;
    }

    let mut checks = Vec::new();
    for (checker, config) in checkers {
        let limit = config.timeout();
        let ctx = RepositoryContext {
            repository: repository.clone(),
            config,
            cancel: cancel.clone(),
        };

        let outcome = tokio::select! {
            result = timeout(limit, checker.check(&ctx)) => {
                result.unwrap_or(Err(CheckError::Timeout(limit)))
            }
            _ = cancel.cancelled() => return None,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("Checker {} failed on {}: {}", checker.id(), repository.name, e);
                CheckResult::execution_error(checker.id(), checker.name(), checker.category(), e)
            }
        };
        checks.push(result);
    }

    Some(RepositoryResult {
        status: aggregate::rollup_status(&checks),
        score: aggregate::rollup_score(&checks),
        repository,
        analysis,
        checks,
        started_at,
        completed_at: Utc::now(),
        error: None,
    })
}

async fn run_analyzer(
    shared: &Shared,
    repository: &Repository,
    cancel: &CancellationToken,
) -> AnalysisOutcome {
    let Some(language) = repository.language.as_deref() else {
        return AnalysisOutcome::Skipped;
    };
    let Ok(analyzer) = shared.registry.analyzers.get(language) else {
        debug!("No analyzer registered for {}", language);
        return AnalysisOutcome::Skipped;
    };
    if !analyzer.can_analyze(repository) {
        return AnalysisOutcome::Skipped;
    }

    let config = shared.config.analyzer_config(language);
    if !config.enabled {
        return AnalysisOutcome::Skipped;
    }

    let limit = config.timeout();
    let outcome = tokio::select! {
        result = timeout(limit, analyzer.analyze(&repository.path, &config)) => result,
        _ = cancel.cancelled() => return AnalysisOutcome::Failed("analysis cancelled".to_string()),
    };

    match outcome {
        Ok(Ok(result)) => AnalysisOutcome::Analyzed(result),
        Ok(Err(e)) => {
            warn!("Analyzer {} failed on {}: {}", language, repository.name, e);
            AnalysisOutcome::Failed(e.to_string())
        }
        Err(_) => {
            warn!("Analyzer {} timed out on {} after {:?}", language, repository.name, limit);
            AnalysisOutcome::Failed(format!("analysis timed out after {:?}", limit))
        }
    }
}
