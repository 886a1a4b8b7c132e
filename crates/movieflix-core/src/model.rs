//! Canonical cached movie record and the views handed back to callers.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Store-assigned identifier. Stable for the lifetime of a record.
pub type InternalId = i64;

/// Default time-to-live for cached records: 24 hours.
pub const DEFAULT_TTL: TimeDelta = TimeDelta::hours(24);

/// Rating information carried alongside a movie.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rating {
    /// Score from the external catalog (0.0–10.0). The only value used for ordering.
    pub external_score: Option<f64>,
    pub external_votes: Option<i64>,
    /// Optional rating from a second source (e.g. IMDb).
    pub secondary: Option<f64>,
}

/// A movie as persisted in the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    /// `None` until the store has persisted the record.
    pub id: Option<InternalId>,
    /// The external catalog's key. Unique across the store.
    pub external_id: i64,
    pub imdb_id: Option<String>,
    pub title: String,
    pub release_year: Option<i32>,
    pub runtime_minutes: Option<i32>,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub plot: Option<String>,
    pub language: Option<String>,
    pub status: Option<String>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl MovieRecord {
    /// A fresh, unpersisted record stamped with the current time and the
    /// default TTL.
    pub fn new(external_id: i64, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            external_id,
            imdb_id: None,
            title: title.into(),
            release_year: None,
            runtime_minutes: None,
            genres: Vec::new(),
            directors: Vec::new(),
            actors: Vec::new(),
            plot: None,
            language: None,
            status: None,
            budget: None,
            revenue: None,
            poster_url: None,
            backdrop_url: None,
            release_date: None,
            rating: Rating::default(),
            created_at: now,
            updated_at: now,
            expires_at: now + DEFAULT_TTL,
        }
    }

    /// Overwrite every descriptive field with the values from `other`.
    /// Identity and cache timestamps are left alone.
    pub fn overwrite_descriptive(&mut self, other: &MovieRecord) {
        self.imdb_id = other.imdb_id.clone();
        self.title = other.title.clone();
        self.release_year = other.release_year;
        self.runtime_minutes = other.runtime_minutes;
        self.genres = other.genres.clone();
        self.directors = other.directors.clone();
        self.actors = other.actors.clone();
        self.plot = other.plot.clone();
        self.language = other.language.clone();
        self.status = other.status.clone();
        self.budget = other.budget;
        self.revenue = other.revenue;
        self.poster_url = other.poster_url.clone();
        self.backdrop_url = other.backdrop_url.clone();
        self.release_date = other.release_date;
        self.rating = other.rating.clone();
    }

    /// Reset `updated_at` to `now` and push the expiry out by `ttl`.
    /// An expiry past the representable range saturates at the maximum.
    pub fn refresh(&mut self, now: DateTime<Utc>, ttl: TimeDelta) {
        self.updated_at = now;
        self.expires_at = now
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Whether the record's expiry lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// True when both records carry the same descriptive data.
    pub fn same_descriptive(&self, other: &MovieRecord) -> bool {
        let mut probe = self.clone();
        probe.overwrite_descriptive(other);
        probe == *self
    }
}

/// A record handed back to a caller, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieView {
    pub movie: MovieRecord,
    /// `true` when served from the local store, `false` after a fresh remote fetch.
    pub from_cache: bool,
}

impl MovieView {
    pub fn cached(movie: MovieRecord) -> Self {
        Self {
            movie,
            from_cache: true,
        }
    }

    pub fn fetched(movie: MovieRecord) -> Self {
        Self {
            movie,
            from_cache: false,
        }
    }
}

/// One page of search results plus the pagination envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub movies: Vec<MovieView>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_elements: u64,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl SearchResult {
    pub fn new(movies: Vec<MovieView>, current_page: u32, page_size: u32, total_elements: u64) -> Self {
        let total_pages = crate::query::total_pages(total_elements, page_size);
        Self {
            movies,
            current_page,
            total_pages,
            total_elements,
            page_size,
            has_next: current_page < total_pages,
            has_previous: current_page > 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}
