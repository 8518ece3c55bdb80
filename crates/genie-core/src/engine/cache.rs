use crate::core::thermo::oracle::{FoldKey, FoldRequest, FoldResult, FoldingBackend, OracleError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Memoising wrapper around a folding backend.
///
/// Entries are written once and never evicted, so one instance can be shared
/// by concurrent jobs. Failed calls are not cached.
pub struct CachedOracle {
    inner: Arc<dyn FoldingBackend>,
    data: RwLock<HashMap<FoldKey, FoldResult>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedOracle {
    pub fn new(inner: Arc<dyn FoldingBackend>) -> Self {
        Self {
            inner,
            data: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.data.read().map_or(0, |d| d.len()),
        }
    }

    fn get(&self, key: &FoldKey) -> Option<FoldResult> {
        self.data.read().ok().and_then(|d| d.get(key).cloned())
    }
}

impl FoldingBackend for CachedOracle {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fold(&self, request: &FoldRequest) -> Result<FoldResult, OracleError> {
        let key = request.key();
        if let Some(hit) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(backend = self.inner.name(), "Folding cache miss.");

        let result = self.inner.fold(request)?;
        if let Ok(mut data) = self.data.write() {
            data.entry(key).or_insert_with(|| result.clone());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thermo::oracle::{Dangles, Structure};
    use std::sync::atomic::AtomicUsize;

    struct CountingBackend {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FoldingBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        fn fold(&self, request: &FoldRequest) -> Result<FoldResult, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(OracleError::Backend("unavailable".into()));
            }
            Ok(FoldResult::single(Structure {
                energy: -(request.total_length() as f64),
                pairs: Vec::new(),
            }))
        }
    }

    fn backend(fail: bool) -> Arc<CountingBackend> {
        Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[test]
    fn repeated_requests_hit_the_cache() {
        let inner = backend(false);
        let cache = CachedOracle::new(inner.clone());
        let request = FoldRequest::mfe(vec!["GGGAAACCC".into()], Dangles::Some, 37.0);

        let first = cache.fold(&request).unwrap();
        let second = cache.fold(&request).unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn distinct_parameters_are_cached_separately() {
        let inner = backend(false);
        let cache = CachedOracle::new(inner.clone());
        let seqs = vec!["GGGAAACCC".to_string()];
        cache
            .fold(&FoldRequest::mfe(seqs.clone(), Dangles::Some, 37.0))
            .unwrap();
        cache
            .fold(&FoldRequest::mfe(seqs, Dangles::Some, 25.0))
            .unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let inner = backend(true);
        let cache = CachedOracle::new(inner.clone());
        let request = FoldRequest::mfe(vec!["GGGAAACCC".into()], Dangles::Some, 37.0);
        assert!(cache.fold(&request).is_err());
        assert!(cache.fold(&request).is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn cache_is_shared_across_threads() {
        let inner = backend(false);
        let cache = Arc::new(CachedOracle::new(inner.clone()));
        let request = FoldRequest::mfe(vec!["GGGAAACCC".into()], Dangles::Some, 37.0);
        cache.fold(&request).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let request = request.clone();
                std::thread::spawn(move || cache.fold(&request).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 4);
    }
}
