//! Memoized candidate rule lists keyed by (subject, action)

use crate::rule::Rule;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Candidate rules for one (subject, action) pair, most relevant first
pub type RuleList = Arc<[Arc<Rule>]>;

#[derive(Clone)]
struct CachedEntry {
    rules: RuleList,
    generation: u64,
}

/// Lookup cache owned by one rule store
///
/// Entries remember the alias registry generation they were computed
/// against; a registration made after the store was built makes them stale.
pub struct LookupCache {
    entries: DashMap<(String, String), CachedEntry>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LookupCache {
    /// Create an empty cache holding at most `capacity` keys
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached list for the key, if present and computed at `generation`
    pub fn get(&self, subject_name: &str, action: &str, generation: u64) -> Option<RuleList> {
        let key = (subject_name.to_string(), action.to_string());
        let found = self
            .entries
            .get(&key)
            .filter(|entry| entry.generation == generation)
            .map(|entry| Arc::clone(&entry.rules));

        match found {
            Some(rules) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(rules)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a computed list, flushing everything once capacity is reached
    pub fn put(&self, subject_name: &str, action: &str, generation: u64, rules: RuleList) {
        if self.capacity == 0 {
            return;
        }

        if self.entries.len() >= self.capacity {
            debug!("Lookup cache full ({} entries), flushing", self.entries.len());
            self.entries.clear();
        }

        self.entries.insert(
            (subject_name.to_string(), action.to_string()),
            CachedEntry { rules, generation },
        );
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            size: self.entries.len(),
            capacity: self.capacity,
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Lookup cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Keys currently cached
    pub size: usize,
    /// Maximum keys before a flush
    pub capacity: usize,
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that had to scan the rules
    pub misses: u64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}
