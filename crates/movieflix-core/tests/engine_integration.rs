//! Integration tests for the [`LookupEngine`].
//!
//! Every test wires a [`MemoryStore`] to a [`MockCatalog`], so no HTTP
//! requests are made.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use movieflix_core::model::InternalId;
use movieflix_core::remote::mock::{MockBehavior, MockCatalog};
use movieflix_core::store::{StorePage, TitleQuery};
use movieflix_core::{
    CoreError, LookupEngine, MemoryStore, MovieCache, MovieRecord, MovieRef, RecordStore,
    RemoteError, SearchQuery, SortDirection, SortField, StoreError,
};

fn movie(external_id: i64, title: &str, year: Option<i32>, genres: &[&str]) -> MovieRecord {
    let mut m = MovieRecord::new(external_id, title);
    m.release_year = year;
    m.genres = genres.iter().map(|g| g.to_string()).collect();
    m
}

fn engine_with(remote: MockCatalog) -> (LookupEngine, Arc<MovieCache>, Arc<MockCatalog>) {
    let cache = Arc::new(MovieCache::new(Arc::new(MemoryStore::new())));
    let remote = Arc::new(remote);
    let engine = LookupEngine::new(cache.clone(), remote.clone());
    (engine, cache, remote)
}

/// Reads go to an empty [`MemoryStore`]; every write fails.
struct ReadOnlyStore(MemoryStore);

impl RecordStore for ReadOnlyStore {
    fn name(&self) -> &str {
        "read-only"
    }
    fn find_by_external_id(&self, external_id: i64) -> Result<Option<MovieRecord>, StoreError> {
        self.0.find_by_external_id(external_id)
    }
    fn find_by_id(&self, id: InternalId) -> Result<Option<MovieRecord>, StoreError> {
        self.0.find_by_id(id)
    }
    fn title_contains(&self, query: &TitleQuery) -> Result<StorePage, StoreError> {
        self.0.title_contains(query)
    }
    fn find_by_genre_contains(&self, genre: &str) -> Result<Vec<MovieRecord>, StoreError> {
        self.0.find_by_genre_contains(genre)
    }
    fn find_by_year(&self, year: i32) -> Result<Vec<MovieRecord>, StoreError> {
        self.0.find_by_year(year)
    }
    fn find_expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MovieRecord>, StoreError> {
        self.0.find_expired_before(cutoff)
    }
    fn delete_expired_before(&self, _cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        Err(StoreError::Poisoned)
    }
    fn upsert(&self, _record: &MovieRecord) -> Result<MovieRecord, StoreError> {
        Err(StoreError::Poisoned)
    }
    fn delete_by_id(&self, _id: InternalId) -> Result<bool, StoreError> {
        Err(StoreError::Poisoned)
    }
    fn count(&self) -> Result<u64, StoreError> {
        self.0.count()
    }
    fn delete_all(&self) -> Result<usize, StoreError> {
        Err(StoreError::Poisoned)
    }
}

#[tokio::test]
async fn non_empty_cache_page_skips_remote() {
    let (engine, cache, remote) = engine_with(MockCatalog::new());
    cache
        .save_or_refresh(&movie(268, "Batman", Some(1989), &["Action"]))
        .unwrap();

    let result = engine.search_movies(&SearchQuery::new("batman")).await.unwrap();

    assert_eq!(remote.search_calls(), 0);
    assert_eq!(result.total_elements, 1);
    assert!(result.movies.iter().all(|v| v.from_cache));
}

#[tokio::test]
async fn empty_cache_fetches_saves_and_marks_remote() {
    let remote = MockCatalog::new().with_search_results(vec![
        movie(155, "The Dark Knight", Some(2008), &["Action", "Crime"]),
        movie(272, "Batman Begins", Some(2005), &["Action"]),
    ]);
    let (engine, cache, remote) = engine_with(remote);

    let result = engine.search_movies(&SearchQuery::new("batman")).await.unwrap();

    assert_eq!(remote.search_calls(), 1);
    assert_eq!(result.total_elements, 2);
    assert!(result.movies.iter().all(|v| !v.from_cache));
    assert!(result.movies.iter().all(|v| v.movie.id.is_some()));
    assert_eq!(cache.size().unwrap(), 2);
    // default sort is title ascending
    assert_eq!(result.movies[0].movie.title, "Batman Begins");
}

#[tokio::test]
async fn remote_results_are_filtered_and_sorted_in_memory() {
    let remote = MockCatalog::new().with_search_results(vec![
        movie(1, "Heat", Some(1995), &["Crime", "Drama"]),
        movie(2, "Collateral", Some(2004), &["Crime", "Thriller"]),
        movie(3, "Ali", Some(2001), &["Drama"]),
        movie(4, "Public Enemies", None, &["Crime"]),
    ]);
    let (engine, _cache, _remote) = engine_with(remote);

    let query = SearchQuery::new("mann")
        .genre("crime")
        .sort(SortField::Year, SortDirection::Desc);
    let result = engine.search_movies(&query).await.unwrap();

    let ids: Vec<_> = result.movies.iter().map(|v| v.movie.external_id).collect();
    assert_eq!(ids, vec![2, 1, 4]);
    assert_eq!(result.total_elements, 3);
}

#[tokio::test]
async fn remote_failure_falls_back_to_empty_cache_result() {
    let (engine, _cache, remote) = engine_with(MockCatalog::failing("connection refused"));

    let result = engine.search_movies(&SearchQuery::new("batman")).await.unwrap();

    assert_eq!(remote.search_calls(), 1);
    assert!(result.movies.is_empty());
    assert_eq!(result.total_elements, 0);
    assert_eq!(result.total_pages, 0);
}

#[tokio::test]
async fn store_write_failure_during_remote_search_is_an_error() {
    let cache = Arc::new(MovieCache::new(Arc::new(ReadOnlyStore(MemoryStore::new()))));
    let remote = Arc::new(
        MockCatalog::new().with_search_results(vec![movie(603, "The Matrix", Some(1999), &[])]),
    );
    let engine = LookupEngine::new(cache, remote.clone());

    let err = engine.search_movies(&SearchQuery::new("matrix")).await.unwrap_err();
    assert!(matches!(err, CoreError::Store(StoreError::Poisoned)), "{err:?}");
    assert_eq!(remote.search_calls(), 1);
}

#[tokio::test]
async fn rate_limited_search_also_falls_back() {
    let (engine, _cache, remote) = engine_with(MockCatalog::new());
    remote.set_behavior(MockBehavior::RateLimited {
        retry_after: Some(Duration::from_secs(2)),
    });
    let result = engine.search_movies(&SearchQuery::new("anything")).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn slow_remote_search_times_out_into_fallback() {
    let remote = MockCatalog::new()
        .with_search_results(vec![movie(1, "Slow", None, &[])])
        .with_delay(Duration::from_millis(500));
    let (engine, cache, _remote) = engine_with(remote);
    let engine = engine.with_remote_timeout(Duration::from_millis(20));

    let result = engine.search_movies(&SearchQuery::new("slow")).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(cache.size().unwrap(), 0);
}

#[tokio::test]
async fn repeated_remote_search_keeps_one_record_per_external_id() {
    let remote =
        MockCatalog::new().with_search_results(vec![movie(603, "The Matrix", Some(1999), &[])]);
    let (engine, cache, _remote) = engine_with(remote);

    // "zion" never matches a stored title, so every call goes remote
    for _ in 0..3 {
        engine.search_movies(&SearchQuery::new("zion")).await.unwrap();
    }
    assert_eq!(cache.size().unwrap(), 1);
}

#[tokio::test]
async fn validation_rejects_before_touching_anything() {
    let (engine, _cache, remote) = engine_with(MockCatalog::new());

    for query in [
        SearchQuery::new("  "),
        SearchQuery::new("x").page(0),
        SearchQuery::new("x").page_size(51),
    ] {
        let err = engine.search_movies(&query).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)), "{err:?}");
    }
    assert_eq!(remote.search_calls(), 0);
}

#[tokio::test]
async fn cache_pagination_envelope() {
    let (engine, cache, _remote) = engine_with(MockCatalog::new());
    for i in 0..45 {
        cache
            .save_or_refresh(&movie(i, &format!("Star {i:02}"), None, &[]))
            .unwrap();
    }

    let last = engine
        .search_movies(&SearchQuery::new("star").page(3).page_size(20))
        .await
        .unwrap();
    assert_eq!(last.total_pages, 3);
    assert_eq!(last.movies.len(), 5);
    assert!(!last.has_next);
    assert!(last.has_previous);

    let first = engine
        .search_movies(&SearchQuery::new("star").page_size(20))
        .await
        .unwrap();
    assert!(first.has_next);
    assert!(!first.has_previous);
    assert_eq!(first.movies[0].movie.title, "Star 00");
}

#[tokio::test]
async fn details_cache_hit_does_not_call_remote() {
    let (engine, cache, remote) = engine_with(MockCatalog::new());
    cache.save_or_refresh(&movie(550, "Fight Club", Some(1999), &[])).unwrap();

    let view = engine.get_by_external_id(550).await.unwrap();
    assert!(view.from_cache);
    assert_eq!(remote.details_calls(), 0);
}

#[tokio::test]
async fn expired_record_is_still_a_cache_hit() {
    let (engine, cache, remote) = engine_with(MockCatalog::new());
    cache
        .save_or_refresh_at(&movie(550, "Fight Club", None, &[]), Utc::now() - TimeDelta::days(3))
        .unwrap();

    let view = engine.get_by_external_id(550).await.unwrap();
    assert!(view.from_cache);
    assert!(view.movie.is_expired_at(Utc::now()));
    assert_eq!(remote.details_calls(), 0);
}

#[tokio::test]
async fn details_miss_fetches_and_caches() {
    let mut details = movie(27205, "Inception", Some(2010), &["Action"]);
    details.runtime_minutes = Some(148);
    details.directors = vec!["Christopher Nolan".into()];
    let (engine, cache, remote) = engine_with(MockCatalog::new().with_details(details));

    let view = engine.get_by_external_id(27205).await.unwrap();
    assert!(!view.from_cache);
    assert_eq!(view.movie.runtime_minutes, Some(148));
    assert_eq!(remote.details_calls(), 1);

    let again = engine.get_by_external_id(27205).await.unwrap();
    assert!(again.from_cache);
    assert_eq!(again.movie.id, view.movie.id);
    assert_eq!(remote.details_calls(), 1);
    assert_eq!(cache.size().unwrap(), 1);
}

#[tokio::test]
async fn details_unknown_everywhere_is_not_found() {
    let (engine, _cache, _remote) = engine_with(MockCatalog::new());
    let err = engine.get_by_external_id(999_999).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(MovieRef::External(999_999))));
}

#[tokio::test]
async fn details_remote_failure_is_surfaced() {
    let (engine, _cache, _remote) = engine_with(MockCatalog::failing("boom"));
    let err = engine.get_by_external_id(1).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::RemoteUnavailable(RemoteError::Unavailable(_))
    ));
}

#[tokio::test]
async fn internal_id_lookup_never_goes_remote() {
    let (engine, cache, remote) = engine_with(MockCatalog::new());
    let saved = cache.save_or_refresh(&movie(10, "Local", None, &[])).unwrap();
    let id = saved.id.unwrap();

    assert!(engine.get_by_internal_id(id).unwrap().from_cache);
    let err = engine.get_by_internal_id(id + 100).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(MovieRef::Internal(_))));
    assert_eq!(remote.details_calls() + remote.search_calls(), 0);
}

#[tokio::test]
async fn genre_and_year_lookups_are_cache_only() {
    let (engine, cache, remote) = engine_with(MockCatalog::new());
    cache.save_or_refresh(&movie(1, "B Movie", Some(2001), &["Science Fiction"])).unwrap();
    cache.save_or_refresh(&movie(2, "A Movie", Some(2001), &["Drama"])).unwrap();

    let scifi = engine.get_by_genre("FICTION").unwrap();
    assert_eq!(scifi.len(), 1);
    assert!(scifi[0].from_cache);

    let year = engine.get_by_year(2001).unwrap();
    let titles: Vec<_> = year.iter().map(|v| v.movie.title.as_str()).collect();
    assert_eq!(titles, vec!["A Movie", "B Movie"]);

    assert!(engine.get_by_year(1950).unwrap().is_empty());
    assert_eq!(remote.search_calls() + remote.details_calls(), 0);
}

#[tokio::test]
async fn available_genres_come_from_the_catalog_table() {
    let (engine, _cache, _remote) = engine_with(MockCatalog::new());
    let genres = engine.available_genres();
    assert_eq!(genres.len(), 19);
    assert_eq!(genres.first().map(String::as_str), Some("Action"));
    assert!(genres.windows(2).all(|w| w[0] <= w[1]));
}
