//! Record store abstraction: durable keyed storage of [`MovieRecord`]s.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`] – [`DashMap`](dashmap::DashMap) keyed by external id; used in tests and when
//!   no cache path is configured.
//! - [`SqliteStore`] – single writer connection plus a pool of read-only
//!   connections over a WAL-mode SQLite file.
//!
//! Every implementation must keep `external_id` unique, preserve `id` and
//! `created_at` across upserts, and order/filter exactly as
//! [`RecordComparator`](crate::query::RecordComparator) and
//! [`MovieFilter`](crate::query::MovieFilter) do.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::model::{InternalId, MovieRecord};
use crate::query::{MovieFilter, SortSpec};

/// Errors raised by a [`RecordStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to encode stored field: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Title search pushed down into the store: substring match, filters,
/// ordering and one page.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleQuery {
    pub text: String,
    pub filter: MovieFilter,
    pub sort: SortSpec,
    /// Zero-based.
    pub offset: usize,
    pub limit: usize,
}

/// One page of records plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorePage {
    pub items: Vec<MovieRecord>,
    pub total: u64,
}

/// Keyed storage for movie records.
///
/// Calls are synchronous; implementations are expected to be cheap enough to
/// call from async code (single-row SQLite statements or in-memory maps).
pub trait RecordStore: Send + Sync {
    /// Short label used in logs and stats.
    fn name(&self) -> &str;

    fn find_by_external_id(&self, external_id: i64) -> Result<Option<MovieRecord>, StoreError>;

    fn exists_by_external_id(&self, external_id: i64) -> Result<bool, StoreError> {
        Ok(self.find_by_external_id(external_id)?.is_some())
    }

    fn find_by_id(&self, id: InternalId) -> Result<Option<MovieRecord>, StoreError>;

    /// Case-insensitive title substring search with filters, ordering and paging.
    fn title_contains(&self, query: &TitleQuery) -> Result<StorePage, StoreError>;

    /// Records with any genre containing `genre`, ignoring case, in title order.
    fn find_by_genre_contains(&self, genre: &str) -> Result<Vec<MovieRecord>, StoreError>;

    /// Records released in `year`, in title order.
    fn find_by_year(&self, year: i32) -> Result<Vec<MovieRecord>, StoreError>;

    /// Records whose expiry lies strictly before `cutoff`.
    fn find_expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MovieRecord>, StoreError>;

    /// Delete records whose expiry lies strictly before `cutoff`.
    fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Insert or update by `external_id`. Returns the stored record with its
    /// internal id populated.
    fn upsert(&self, record: &MovieRecord) -> Result<MovieRecord, StoreError>;

    fn delete_by_id(&self, id: InternalId) -> Result<bool, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;

    fn delete_all(&self) -> Result<usize, StoreError>;
}
