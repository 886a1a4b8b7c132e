//! Cache Manager: expiry policy and upsert semantics over a [`RecordStore`].
//!
//! Reads through [`lookup`](MovieCache::lookup) never filter by expiry;
//! stale records stay servable until [`sweep_expired`](MovieCache::sweep_expired)
//! removes them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

use crate::model::{DEFAULT_TTL, InternalId, MovieRecord};
use crate::store::{RecordStore, StoreError, StorePage, TitleQuery};

/// Snapshot of cache counters for the administrative stats operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub store: String,
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub ttl: TimeDelta,
}

impl CacheStats {
    /// Fraction of lookups that were hits, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Time-to-live cache of movie records.
pub struct MovieCache {
    store: Arc<dyn RecordStore>,
    ttl: TimeDelta,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MovieCache {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_ttl(store, DEFAULT_TTL)
    }

    pub fn with_ttl(store: Arc<dyn RecordStore>, ttl: TimeDelta) -> Self {
        Self {
            store,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Point lookup by external id. Expired records are still returned.
    pub fn lookup(&self, external_id: i64) -> Result<Option<MovieRecord>, StoreError> {
        let found = self.store.find_by_external_id(external_id)?;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(external_id, "cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(external_id, "cache miss");
        }
        Ok(found)
    }

    pub fn find_by_id(&self, id: InternalId) -> Result<Option<MovieRecord>, StoreError> {
        self.store.find_by_id(id)
    }

    pub fn search_titles(&self, query: &TitleQuery) -> Result<StorePage, StoreError> {
        self.store.title_contains(query)
    }

    pub fn find_by_genre(&self, genre: &str) -> Result<Vec<MovieRecord>, StoreError> {
        self.store.find_by_genre_contains(genre)
    }

    pub fn find_by_year(&self, year: i32) -> Result<Vec<MovieRecord>, StoreError> {
        self.store.find_by_year(year)
    }

    /// Insert `record` or refresh the existing record with the same external id.
    pub fn save_or_refresh(&self, record: &MovieRecord) -> Result<MovieRecord, StoreError> {
        self.save_or_refresh_at(record, Utc::now())
    }

    /// [`save_or_refresh`](Self::save_or_refresh) with an explicit clock.
    ///
    /// An existing record keeps its id and `created_at`, takes every
    /// descriptive field from `record`, and gets `updated_at = now` and
    /// `expires_at = now + ttl`. A new record gets all three timestamps from
    /// `now`.
    pub fn save_or_refresh_at(
        &self,
        record: &MovieRecord,
        now: DateTime<Utc>,
    ) -> Result<MovieRecord, StoreError> {
        let to_store = match self.store.find_by_external_id(record.external_id)? {
            Some(mut existing) => {
                tracing::debug!(external_id = record.external_id, "refreshing cached movie");
                existing.overwrite_descriptive(record);
                existing.refresh(now, self.ttl);
                existing
            }
            None => {
                tracing::debug!(external_id = record.external_id, "caching new movie");
                let mut fresh = record.clone();
                fresh.id = None;
                fresh.created_at = now;
                fresh.refresh(now, self.ttl);
                fresh
            }
        };
        self.store.upsert(&to_store)
    }

    /// Delete every record whose expiry lies strictly before `now`.
    ///
    /// Best effort: store failures are logged and reported as zero removals
    /// so a periodic caller simply tries again next cycle.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        match self.try_sweep(now) {
            Ok(0) => {
                tracing::debug!("no expired movies to sweep");
                0
            }
            Ok(removed) => {
                tracing::info!(removed, "swept expired movies from cache");
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "cache sweep failed");
                0
            }
        }
    }

    fn try_sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let expired = self.store.find_expired_before(now)?;
        if expired.is_empty() {
            return Ok(0);
        }
        tracing::debug!(candidates = expired.len(), "found expired movies");
        self.store.delete_expired_before(now)
    }

    /// Number of stored records, expired or not.
    pub fn size(&self) -> Result<u64, StoreError> {
        self.store.count()
    }

    /// Remove every record.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let removed = self.store.delete_all()?;
        tracing::warn!(removed, "cleared movie cache");
        Ok(removed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        Ok(CacheStats {
            store: self.store.name().to_string(),
            entries: self.size()?,
            hits: self.hits(),
            misses: self.misses(),
            ttl: self.ttl,
        })
    }
}

impl std::fmt::Debug for MovieCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieCache")
            .field("store", &self.store.name())
            .field("ttl", &self.ttl)
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}
