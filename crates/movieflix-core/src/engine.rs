//! Lookup Engine: cache-first search and detail retrieval.
//!
//! Search consults the store first and returns any non-empty page as is.
//! Only an empty cache page triggers a remote search, whose results are
//! saved through the [`MovieCache`] and then filtered, sorted and paged in
//! memory with the same comparator the store uses. A failing remote search
//! falls back to the (empty) cache result instead of surfacing an error;
//! store failures while saving the fetched records are still returned.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::MovieCache;
use crate::model::{InternalId, MovieRecord, MovieView, SearchResult};
use crate::query::{SearchQuery, paginate};
use crate::remote::{RemoteCatalog, RemoteError, RemoteFuture};
use crate::store::TitleQuery;
use crate::{CoreError, MovieRef};

/// Default bound on a single remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LookupEngine {
    cache: Arc<MovieCache>,
    remote: Arc<dyn RemoteCatalog>,
    remote_timeout: Duration,
}

impl LookupEngine {
    pub fn new(cache: Arc<MovieCache>, remote: Arc<dyn RemoteCatalog>) -> Self {
        Self {
            cache,
            remote,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<MovieCache> {
        &self.cache
    }

    pub fn remote(&self) -> &Arc<dyn RemoteCatalog> {
        &self.remote
    }

    /// Search by title substring with optional genre/year filters.
    pub async fn search_movies(&self, query: &SearchQuery) -> Result<SearchResult, CoreError> {
        query.validate()?;
        let text = query.text.trim();

        let page = self.cache.search_titles(&TitleQuery {
            text: text.to_string(),
            filter: query.filter.clone(),
            sort: query.sort,
            offset: query.offset(),
            limit: query.page_size as usize,
        })?;
        let cached = SearchResult::new(
            page.items.into_iter().map(MovieView::cached).collect(),
            query.page,
            query.page_size,
            page.total,
        );

        if !cached.is_empty() {
            tracing::debug!(
                query = text,
                page = query.page,
                total = cached.total_elements,
                "search served from cache"
            );
            return Ok(cached);
        }

        tracing::debug!(query = text, page = query.page, "cache empty, searching remote");
        match self.search_remote(text, query).await {
            Ok(result) => Ok(result),
            Err(CoreError::RemoteUnavailable(e)) => {
                tracing::error!(
                    query = text,
                    remote = self.remote.name(),
                    error = %e,
                    "remote search failed, returning cached result"
                );
                Ok(cached)
            }
            Err(e) => Err(e),
        }
    }

    async fn search_remote(
        &self,
        text: &str,
        query: &SearchQuery,
    ) -> Result<SearchResult, CoreError> {
        let fetched = self
            .call_remote(self.remote.search(text, query.page))
            .await
            .map_err(CoreError::RemoteUnavailable)?;

        let mut saved: Vec<MovieRecord> = Vec::with_capacity(fetched.len());
        for record in &fetched {
            saved.push(self.cache.save_or_refresh(record)?);
        }

        let mut matching: Vec<MovieRecord> = saved
            .into_iter()
            .filter(|m| query.filter.matches(m))
            .collect();
        query.sort.comparator().sort(&mut matching);
        let total = matching.len() as u64;

        tracing::debug!(
            query = text,
            fetched = fetched.len(),
            matching = total,
            "cached remote search results"
        );

        let movies = paginate(matching, query.page, query.page_size)
            .into_iter()
            .map(MovieView::fetched)
            .collect();
        Ok(SearchResult::new(movies, query.page, query.page_size, total))
    }

    /// Detail lookup by the remote catalog's id. Cache hits are served
    /// without a freshness check.
    pub async fn get_by_external_id(&self, external_id: i64) -> Result<MovieView, CoreError> {
        if let Some(hit) = self.cache.lookup(external_id)? {
            return Ok(MovieView::cached(hit));
        }

        match self.call_remote(self.remote.details(external_id)).await {
            Ok(Some(record)) => {
                let saved = self.cache.save_or_refresh(&record)?;
                Ok(MovieView::fetched(saved))
            }
            Ok(None) => Err(CoreError::NotFound(MovieRef::External(external_id))),
            Err(e) => {
                tracing::warn!(
                    external_id,
                    remote = self.remote.name(),
                    error = %e,
                    "remote details lookup failed"
                );
                Err(CoreError::RemoteUnavailable(e))
            }
        }
    }

    /// Store-only lookup by internal id.
    pub fn get_by_internal_id(&self, id: InternalId) -> Result<MovieView, CoreError> {
        self.cache
            .find_by_id(id)?
            .map(MovieView::cached)
            .ok_or(CoreError::NotFound(MovieRef::Internal(id)))
    }

    /// Cached movies with a genre containing `genre`, ignoring case.
    pub fn get_by_genre(&self, genre: &str) -> Result<Vec<MovieView>, CoreError> {
        Ok(self
            .cache
            .find_by_genre(genre.trim())?
            .into_iter()
            .map(MovieView::cached)
            .collect())
    }

    /// Cached movies released in `year`.
    pub fn get_by_year(&self, year: i32) -> Result<Vec<MovieView>, CoreError> {
        Ok(self
            .cache
            .find_by_year(year)?
            .into_iter()
            .map(MovieView::cached)
            .collect())
    }

    /// Genre names known to the remote catalog, sorted.
    pub fn available_genres(&self) -> Vec<String> {
        self.remote.genres().names()
    }

    async fn call_remote<T>(&self, fut: RemoteFuture<'_, T>) -> Result<T, RemoteError> {
        match tokio::time::timeout(self.remote_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout),
        }
    }
}

impl std::fmt::Debug for LookupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupEngine")
            .field("cache", &self.cache)
            .field("remote", &self.remote.name())
            .field("remote_timeout", &self.remote_timeout)
            .finish()
    }
}
