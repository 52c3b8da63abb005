//! Parse cache shared across compilations
//!
//! Parsed stylesheets are keyed by the ordered list of source identities and
//! stamped with the newest modification time of those sources. The cache is
//! advisory: a stale or evicted entry simply causes a fresh parse.

use crate::parser::{ParsedStylesheet, Source};
use crate::result::Result;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Cache entry with metadata
#[derive(Debug, Clone)]
struct CacheEntry {
    parsed: Arc<ParsedStylesheet>,
    /// Newest modification time of the inputs, `None` when any was unknown
    newest: Option<SystemTime>,
    access_tick: u64,
}

impl CacheEntry {
    fn is_fresh(&self, sources: &[Source]) -> bool {
        self.newest.is_some_and(|recorded| {
            sources
                .iter()
                .all(|source| source.modified.is_some_and(|modified| modified <= recorded))
        })
    }
}

/// Bounded cache of parsed stylesheets, safe to share between threads
#[derive(Debug)]
pub struct ParseCache {
    entries: DashMap<Vec<String>, CacheEntry>,
    max_size: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
}

impl ParseCache {
    /// Create a cache holding at most `max_size` stylesheets
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn key(sources: &[Source]) -> Vec<String> {
        sources.iter().map(|s| s.name.clone()).collect()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a fresh entry and return a copy the caller may mutate
    pub fn get(&self, sources: &[Source]) -> Option<ParsedStylesheet> {
        let key = Self::key(sources);
        let lookup = match self.entries.get_mut(&key) {
            None => None,
            Some(mut entry) if entry.is_fresh(sources) => {
                entry.access_tick = self.tick();
                Some(Ok(Arc::clone(&entry.parsed)))
            }
            Some(_) => Some(Err(())),
        };

        match lookup {
            Some(Ok(parsed)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Parse cache hit for {:?}", key);
                Some((*parsed).clone())
            }
            Some(Err(())) => {
                self.entries.remove(&key);
                self.invalidations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Parse cache entry for {:?} is stale", key);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Cache a parsed stylesheet for the given sources
    pub fn insert(&self, sources: &[Source], parsed: ParsedStylesheet) {
        let newest = sources
            .iter()
            .map(|s| s.modified)
            .collect::<Option<Vec<_>>>()
            .and_then(|stamps| stamps.into_iter().max());
        let entry = CacheEntry {
            parsed: Arc::new(parsed),
            newest,
            access_tick: self.tick(),
        };
        self.entries.insert(Self::key(sources), entry);
        self.evict_if_needed();
    }

    /// Return the cached tree or parse the sources and cache the result
    pub fn get_or_parse(
        &self,
        sources: &[Source],
        parse: impl FnOnce(&[Source]) -> Result<ParsedStylesheet>,
    ) -> Result<ParsedStylesheet> {
        if let Some(parsed) = self.get(sources) {
            return Ok(parsed);
        }
        let parsed = parse(sources)?;
        self.insert(sources, parsed.clone());
        Ok(parsed)
    }

    /// Evict least recently used entries if cache is over capacity
    fn evict_if_needed(&self) {
        while self.entries.len() > self.max_size {
            let oldest_key = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().access_tick)
                .map(|entry| entry.key().clone());

            match oldest_key {
                Some(key) => {
                    self.entries.remove(&key);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            capacity: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Get the cache utilization as a percentage
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            (self.size as f64 / self.capacity as f64) * 100.0
        }
    }
}
