//! FILENAME: core/engine/src/cache.rs
//! PURPOSE: Compile-or-fetch cache for expression programs.
//! CONTEXT: Owned by the `CubeManager`. Entries are keyed by cell signature
//! (the source text). Each entry is a `OnceCell`, so concurrent requests for
//! the same signature block on a single build instead of compiling twice.
//! Compile failures are cached too.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cube_expr::Program;
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;

use crate::logging::log_debug;

type Entry = Arc<OnceCell<Result<Arc<Program>, String>>>;

#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: Mutex<FxHashMap<String, Entry>>,
    builds: AtomicUsize,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&self, signature: &str) -> Result<Arc<Program>, String> {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(signature.to_string()).or_default())
        };
        entry
            .get_or_init(|| {
                self.builds.fetch_add(1, Ordering::Relaxed);
                compile_program(signature)
            })
            .clone()
    }

    /// Number of compilations performed since creation.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        log_debug!("EXEC", "clearing {} cached programs", entries.len());
        entries.clear();
    }
}

pub(crate) fn compile_program(source: &str) -> Result<Arc<Program>, String> {
    cube_expr::parse(source)
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_builds_once_per_signature_across_threads() {
        let cache = Arc::new(ProgramCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_compile("input.x + 1").is_ok())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.builds(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_cached() {
        let cache = ProgramCache::new();
        assert!(cache.get_or_compile("(").is_err());
        assert!(cache.get_or_compile("(").is_err());
        assert_eq!(cache.builds(), 1);
    }

    #[test]
    fn test_clear_forces_rebuild() {
        let cache = ProgramCache::new();
        cache.get_or_compile("1").unwrap();
        cache.clear();
        assert!(cache.is_empty());
        cache.get_or_compile("1").unwrap();
        assert_eq!(cache.builds(), 2);
    }
}
