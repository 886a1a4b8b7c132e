//! In-process record store.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{RecordStore, StoreError, StorePage, TitleQuery};
use crate::model::{InternalId, MovieRecord};
use crate::query::{SortSpec, contains_ci, paginate_offset};

/// [`DashMap`]-backed store keyed by external id.
///
/// Internal ids come from a monotonically increasing counter starting at 1.
#[derive(Debug)]
pub struct MemoryStore {
    records: DashMap<i64, MovieRecord>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn collect_sorted(&self, mut pred: impl FnMut(&MovieRecord) -> bool) -> Vec<MovieRecord> {
        let mut out: Vec<MovieRecord> = self
            .records
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.value().clone())
            .collect();
        SortSpec::default().comparator().sort(&mut out);
        out
    }
}

impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn find_by_external_id(&self, external_id: i64) -> Result<Option<MovieRecord>, StoreError> {
        Ok(self.records.get(&external_id).map(|r| r.value().clone()))
    }

    fn exists_by_external_id(&self, external_id: i64) -> Result<bool, StoreError> {
        Ok(self.records.contains_key(&external_id))
    }

    fn find_by_id(&self, id: InternalId) -> Result<Option<MovieRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .find(|e| e.value().id == Some(id))
            .map(|e| e.value().clone()))
    }

    fn title_contains(&self, query: &TitleQuery) -> Result<StorePage, StoreError> {
        let mut matches: Vec<MovieRecord> = self
            .records
            .iter()
            .filter(|e| {
                let m = e.value();
                contains_ci(&m.title, &query.text) && query.filter.matches(m)
            })
            .map(|e| e.value().clone())
            .collect();
        let total = matches.len() as u64;
        query.sort.comparator().sort(&mut matches);
        Ok(StorePage {
            items: paginate_offset(matches, query.offset, query.limit),
            total,
        })
    }

    fn find_by_genre_contains(&self, genre: &str) -> Result<Vec<MovieRecord>, StoreError> {
        Ok(self.collect_sorted(|m| m.genres.iter().any(|g| contains_ci(g, genre))))
    }

    fn find_by_year(&self, year: i32) -> Result<Vec<MovieRecord>, StoreError> {
        Ok(self.collect_sorted(|m| m.release_year == Some(year)))
    }

    fn find_expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MovieRecord>, StoreError> {
        Ok(self.collect_sorted(|m| m.is_expired_at(cutoff)))
    }

    fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.records.len();
        self.records.retain(|_, m| !m.is_expired_at(cutoff));
        Ok(before.saturating_sub(self.records.len()))
    }

    fn upsert(&self, record: &MovieRecord) -> Result<MovieRecord, StoreError> {
        let stored = match self.records.entry(record.external_id) {
            Entry::Occupied(mut e) => {
                let current = e.get_mut();
                current.overwrite_descriptive(record);
                current.updated_at = record.updated_at;
                current.expires_at = record.expires_at;
                current.clone()
            }
            Entry::Vacant(e) => {
                let mut fresh = record.clone();
                fresh.id = Some(self.next_id.fetch_add(1, Ordering::Relaxed));
                e.insert(fresh).value().clone()
            }
        };
        tracing::trace!(
            external_id = stored.external_id,
            id = stored.id,
            "memory store upsert"
        );
        Ok(stored)
    }

    fn delete_by_id(&self, id: InternalId) -> Result<bool, StoreError> {
        let key = self
            .records
            .iter()
            .find(|e| e.value().id == Some(id))
            .map(|e| *e.key());
        Ok(match key {
            Some(k) => self.records.remove(&k).is_some(),
            None => false,
        })
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.len() as u64)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let n = self.records.len();
        self.records.clear();
        Ok(n)
    }
}
