//! Capability registries
//!
//! Both registries are read concurrently by every repository task, so every
//! operation goes through the same `RwLock`. Locks are never held across an
//! `.await`: lookups clone the `Arc` out and release immediately.

use crate::capability::{Analyzer, AnalyzerKind, Checker, SourceAnalyzer};
use crate::core::RegistryError;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Keyed entries kept in registration order
struct Entries<T> {
    kind: &'static str,
    entries: RwLock<Vec<(String, T)>>,
}

impl<T: Clone> Entries<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(Vec::new()),
        }
    }

    // A panic while holding the lock cannot leave the Vec half-updated,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Vec<(String, T)>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(String, T)>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, key: String, value: T) {
        let mut entries = self.write();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => {
                debug!("Replacing {} '{}'", self.kind, key);
                entry.1 = value;
            }
            None => {
                debug!("Registering {} '{}'", self.kind, key);
                entries.push((key, value));
            }
        }
    }

    fn unregister(&self, key: &str) {
        self.write().retain(|(k, _)| k != key);
    }

    fn get(&self, key: &str) -> Result<T, RegistryError> {
        self.read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RegistryError::NotFound {
                kind: self.kind,
                key: key.to_string(),
            })
    }

    fn get_all(&self) -> Vec<T> {
        self.read().iter().map(|(_, v)| v.clone()).collect()
    }

    fn keys(&self) -> Vec<String> {
        self.read().iter().map(|(k, _)| k.clone()).collect()
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

/// Checkers keyed by ID
pub struct CheckerRegistry {
    inner: Entries<Arc<dyn Checker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Entries::new("checker"),
        }
    }

    /// Register a checker, replacing any checker with the same ID in place
    pub fn register(&self, checker: Arc<dyn Checker>) {
        self.inner.register(checker.id().to_string(), checker);
    }

    pub fn unregister(&self, id: &str) {
        self.inner.unregister(id);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Checker>, RegistryError> {
        self.inner.get(id)
    }

    /// All checkers, in registration order
    pub fn get_all(&self) -> Vec<Arc<dyn Checker>> {
        self.inner.get_all()
    }

    pub fn ids(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyzers keyed by language tag
pub struct AnalyzerRegistry {
    inner: Entries<AnalyzerKind>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Entries::new("analyzer"),
        }
    }

    /// Register an analyzer, replacing any analyzer for the same language
    pub fn register(&self, analyzer: AnalyzerKind) {
        self.inner.register(analyzer.language().to_string(), analyzer);
    }

    pub fn register_full(&self, analyzer: Arc<dyn Analyzer>) {
        self.register(AnalyzerKind::Full(analyzer));
    }

    pub fn register_basic(&self, analyzer: Arc<dyn SourceAnalyzer>) {
        self.register(AnalyzerKind::Basic(analyzer));
    }

    pub fn unregister(&self, language: &str) {
        self.inner.unregister(language);
    }

    pub fn get(&self, language: &str) -> Result<AnalyzerKind, RegistryError> {
        self.inner.get(language)
    }

    pub fn get_all(&self) -> Vec<AnalyzerKind> {
        self.inner.get_all()
    }

    pub fn languages(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Every capability available to a run
#[derive(Default)]
pub struct Registry {
    pub checkers: CheckerRegistry,
    pub analyzers: AnalyzerRegistry,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in checkers
    pub fn with_builtin_checkers() -> Self {
        let registry = Self::new();
        for checker in crate::checkers::builtin() {
            registry.checkers.register(checker);
        }
        registry
    }
}
