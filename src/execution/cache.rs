//! In-memory cache of recent repository results

use crate::core::{Repository, RepositoryResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// What a cached result was computed from
///
/// A result is only reused for the same path, the same language tag and the
/// same set of active checkers, in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: PathBuf,
    language: Option<String>,
    checkers: Vec<String>,
}

impl CacheKey {
    pub fn new(repository: &Repository, checkers: Vec<String>) -> Self {
        Self {
            path: repository.path.clone(),
            language: repository.language.clone(),
            checkers,
        }
    }
}

/// Per-process cache of repository results
///
/// Only results without a task-level error are stored. Entries older than
/// the TTL are treated as absent and dropped on the next write.
pub struct ResultCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, (Instant, RepositoryResult)>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// A fresh result for `repository`, if one is cached under `key`
    ///
    /// The returned result describes `repository` itself, whatever name it
    /// was cached under.
    pub async fn get(&self, key: &CacheKey, repository: &Repository) -> Option<RepositoryResult> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((stored, result)) if stored.elapsed() < self.ttl => {
                debug!("Cache hit for {}", key.path.display());
                let mut result = result.clone();
                result.repository = repository.clone();
                Some(result)
            }
            _ => None,
        }
    }

    pub async fn insert(&self, key: CacheKey, result: &RepositoryResult) {
        if result.error.is_some() {
            return;
        }
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        entries.insert(key, (Instant::now(), result.clone()));
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
