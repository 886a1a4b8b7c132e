//! Scripted [`RemoteCatalog`] for tests and offline runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{GenreTable, RemoteCatalog, RemoteError, RemoteFuture};
use crate::model::MovieRecord;

/// How a [`MockCatalog`] answers a call.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Serve the scripted records.
    Serve,
    /// Fail every call with [`RemoteError::Unavailable`].
    Fail(String),
    /// Fail every call with [`RemoteError::RateLimited`].
    RateLimited { retry_after: Option<Duration> },
}

/// A hand-rolled mock implementing [`RemoteCatalog`].
///
/// Supports:
/// - Canned search results (returned for every query) and a details map.
/// - Failure injection via [`MockBehavior`].
/// - Optional per-call latency.
/// - Separate call counters for search and details.
pub struct MockCatalog {
    search_results: Mutex<Vec<MovieRecord>>,
    details: Mutex<HashMap<i64, MovieRecord>>,
    behavior: Mutex<MockBehavior>,
    delay: Option<Duration>,
    genres: GenreTable,
    search_calls: AtomicUsize,
    details_calls: AtomicUsize,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalog {
    /// A catalog that knows nothing and always succeeds.
    pub fn new() -> Self {
        Self {
            search_results: Mutex::new(Vec::new()),
            details: Mutex::new(HashMap::new()),
            behavior: Mutex::new(MockBehavior::Serve),
            delay: None,
            genres: GenreTable::fallback(),
            search_calls: AtomicUsize::new(0),
            details_calls: AtomicUsize::new(0),
        }
    }

    /// A catalog whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.set_behavior(MockBehavior::Fail(message.into()));
        mock
    }

    pub fn with_search_results(self, records: Vec<MovieRecord>) -> Self {
        if let Ok(mut results) = self.search_results.lock() {
            *results = records;
        }
        self
    }

    pub fn with_details(self, record: MovieRecord) -> Self {
        if let Ok(mut details) = self.details.lock() {
            details.insert(record.external_id, record);
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_genres(mut self, genres: GenreTable) -> Self {
        self.genres = genres;
        self
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        if let Ok(mut b) = self.behavior.lock() {
            *b = behavior;
        }
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn details_calls(&self) -> usize {
        self.details_calls.load(Ordering::SeqCst)
    }

    fn check_behavior(&self) -> Result<(), RemoteError> {
        let behavior = self
            .behavior
            .lock()
            .map(|b| b.clone())
            .unwrap_or(MockBehavior::Serve);
        match behavior {
            MockBehavior::Serve => Ok(()),
            MockBehavior::Fail(msg) => Err(RemoteError::Unavailable(msg)),
            MockBehavior::RateLimited { retry_after } => {
                Err(RemoteError::RateLimited { retry_after })
            }
        }
    }
}

impl RemoteCatalog for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    fn search<'a>(&'a self, _query: &'a str, _page: u32) -> RemoteFuture<'a, Vec<MovieRecord>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            self.check_behavior()?;
            Ok(self
                .search_results
                .lock()
                .map(|r| r.clone())
                .unwrap_or_default())
        })
    }

    fn details(&self, external_id: i64) -> RemoteFuture<'_, Option<MovieRecord>> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            self.check_behavior()?;
            Ok(self
                .details
                .lock()
                .ok()
                .and_then(|d| d.get(&external_id).cloned()))
        })
    }

    fn genres(&self) -> &GenreTable {
        &self.genres
    }
}
