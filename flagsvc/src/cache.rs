//! Process-wide cache of document fetch outcomes.
//!
//! Successful and failed fetches are both stored, each with its own expiry,
//! so a misconfigured host costs one fetch per error TTL instead of one per
//! request. Expiry is evaluated lazily on lookup. Keys are derived from
//! request hosts, so stores sweep out expired entries once the map has grown
//! past a threshold, and the map never holds more than its capacity.

use crate::document::HostDocument;
use crate::errors::FetchError;
use crate::metrics_defs::{CACHE_HIT, CACHE_MISS};
use parking_lot::RwLock;
use shared::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Clone, Debug)]
pub enum CacheEntry {
    Ok {
        document: Arc<HostDocument>,
        expires_at: Instant,
    },
    Err {
        error: FetchError,
        expires_at: Instant,
    },
}

impl CacheEntry {
    pub fn expires_at(&self) -> Instant {
        match self {
            CacheEntry::Ok { expires_at, .. } | CacheEntry::Err { expires_at, .. } => *expires_at,
        }
    }

    /// An entry is valid strictly before its expiry.
    pub fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at()
    }

    fn outcome(&self) -> Result<Arc<HostDocument>, FetchError> {
        match self {
            CacheEntry::Ok { document, .. } => Ok(document.clone()),
            CacheEntry::Err { error, .. } => Err(error.clone()),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Lookup {
    Hit(Result<Arc<HostDocument>, FetchError>),
    Miss,
}

/// Fetch outcomes keyed by absolute document URL.
///
/// Lookups share a read lock; stores and invalidations take the write lock
/// and replace entries whole. Concurrent misses on the same URL are not
/// coalesced: every caller fetches and the last store wins.
pub struct DocCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
    /// Size at which the next store sweeps expired entries.
    sweep_at: AtomicUsize,
}

const DEFAULT_CAPACITY: usize = 10_000;
pub(crate) const MIN_SWEEP_SIZE: usize = 64;

impl Default for DocCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DocCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        DocCache {
            entries: RwLock::new(HashMap::new()),
            capacity,
            sweep_at: AtomicUsize::new(MIN_SWEEP_SIZE.min(capacity)),
        }
    }

    pub fn lookup(&self, url: &str, now: Instant) -> Lookup {
        let hit = self
            .entries
            .read()
            .get(url)
            .filter(|entry| entry.is_valid(now))
            .map(CacheEntry::outcome);

        match hit {
            Some(outcome) => {
                let tag = if outcome.is_ok() { "ok" } else { "error" };
                counter!(CACHE_HIT, "outcome" => tag).increment(1);
                tracing::debug!(url, outcome = tag, "Document cache hit");
                Lookup::Hit(outcome)
            }
            None => {
                counter!(CACHE_MISS).increment(1);
                tracing::debug!(url, "Document cache miss");
                Lookup::Miss
            }
        }
    }

    pub fn store_ok(&self, url: &str, document: Arc<HostDocument>, expires_at: Instant) {
        self.store(
            url,
            CacheEntry::Ok {
                document,
                expires_at,
            },
        );
    }

    pub fn store_err(&self, url: &str, error: FetchError, expires_at: Instant) {
        self.store(url, CacheEntry::Err { error, expires_at });
    }

    fn store(&self, url: &str, entry: CacheEntry) {
        let mut entries = self.entries.write();

        let grown = entries.len() >= self.sweep_at.load(Ordering::Relaxed);
        if grown && !entries.contains_key(url) {
            let now = Instant::now();
            entries.retain(|_, entry| entry.is_valid(now));

            // Still full of live entries: evict the one expiring first
            if entries.len() >= self.capacity
                && let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at())
                    .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest);
            }

            // Amortized: the next sweep waits until the live set doubles
            let sweep_at = (entries.len() * 2).max(MIN_SWEEP_SIZE).min(self.capacity);
            self.sweep_at.store(sweep_at, Ordering::Relaxed);
            tracing::debug!(size = entries.len(), "Swept document cache");
        }

        entries.insert(url.to_string(), entry);
    }

    /// Removes the entry for `url`. Returns whether one was present.
    pub fn invalidate(&self, url: &str) -> bool {
        self.entries.write().remove(url).is_some()
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    /// Number of resident entries, expired ones included until the next
    /// sweep.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
