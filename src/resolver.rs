//! Accession-resolution boundary: maps a JGAS study accession to its
//! member dataset accessions. The lookup itself lives outside this
//! crate (database or network); here is the trait seam plus a per-run
//! memoization wrapper so each unique study id is resolved at most
//! once.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait AccessionResolver: Send + Sync {
    /// Dataset accessions belonging to one study accession. No ordering
    /// guarantee; callers sort and dedupe downstream. Errors propagate
    /// to the caller — this crate adds no retry on this path.
    async fn resolve(&self, study_accession: &str) -> Result<Vec<String>>;
}

/// Memoizing wrapper. Population happens at most once per unique study
/// id per run; concurrent callers for the same id serialize on the
/// cache lock, so the inner resolver never sees duplicate lookups that
/// already completed.
pub struct CachedResolver<R> {
    inner: R,
    cache: Mutex<HashMap<String, Arc<Vec<String>>>>,
}

impl<R: AccessionResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        CachedResolver {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, study_accession: &str) -> Result<Arc<Vec<String>>> {
        {
            let cache = self.cache.lock().await;
            if let Some(hit) = cache.get(study_accession) {
                return Ok(Arc::clone(hit));
            }
        }
        let resolved = self.inner.resolve(study_accession).await?;
        debug!(study = study_accession, n = resolved.len(), "resolved study accession");
        let mut cache = self.cache.lock().await;
        let entry = cache
            .entry(study_accession.to_string())
            .or_insert_with(|| Arc::new(resolved));
        Ok(Arc::clone(entry))
    }
}

/// Resolver backed by a fixed table. Used by tests and by offline runs
/// where a pre-exported study→dataset map is available.
pub struct StaticResolver {
    map: HashMap<String, Vec<String>>,
}

impl StaticResolver {
    pub fn new(map: HashMap<String, Vec<String>>) -> Self {
        StaticResolver { map }
    }

    pub fn empty() -> Self {
        StaticResolver { map: HashMap::new() }
    }
}

#[async_trait]
impl AccessionResolver for StaticResolver {
    async fn resolve(&self, study_accession: &str) -> Result<Vec<String>> {
        Ok(self.map.get(study_accession).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AccessionResolver for CountingResolver {
        async fn resolve(&self, study: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![format!("{}-member", study)])
        }
    }

    #[tokio::test]
    async fn cache_populates_once_per_id() {
        let cached = CachedResolver::new(CountingResolver { calls: AtomicUsize::new(0) });
        let a = cached.resolve("JGAS000001").await.unwrap();
        let b = cached.resolve("JGAS000001").await.unwrap();
        let c = cached.resolve("JGAS000002").await.unwrap();
        assert_eq!(*a, vec!["JGAS000001-member".to_string()]);
        assert_eq!(a, b);
        assert_eq!(*c, vec!["JGAS000002-member".to_string()]);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn static_resolver_unknown_is_empty() {
        let r = StaticResolver::empty();
        assert!(r.resolve("JGAS000099").await.unwrap().is_empty());
    }
}
