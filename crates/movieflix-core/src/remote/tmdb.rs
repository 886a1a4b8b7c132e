//! TMDB v3 client.
//!
//! Endpoints used:
//! - `GET /search/movie?query=&page=`
//! - `GET /movie/{id}?append_to_response=credits`
//! - `GET /genre/movie/list` (once, at construction)
//!
//! Payloads are decoded item by item: a search hit that fails to decode is
//! dropped without losing the rest of the page, and an unparseable release
//! date only clears that field.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use super::{GenreTable, RemoteCatalog, RemoteError, RemoteFuture};
use crate::Config;
use crate::model::{MovieRecord, Rating};
use crate::rate_limit::{AdaptiveLimiter, check_rate_limit_response};

/// Number of billed cast members kept as `actors`.
const MAX_ACTORS: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: i64,
    #[serde(default)]
    title: String,
    release_date: Option<String>,
    overview: Option<String>,
    original_language: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<i64>,
    #[serde(default)]
    genre_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GenreListResponse {
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct CastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    name: String,
    job: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    id: i64,
    #[serde(default)]
    title: String,
    imdb_id: Option<String>,
    release_date: Option<String>,
    runtime: Option<i32>,
    overview: Option<String>,
    original_language: Option<String>,
    status: Option<String>,
    budget: Option<i64>,
    revenue: Option<i64>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<i64>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    credits: Credits,
}

/// Parse a `YYYY-MM-DD` release date. Empty strings are treated as absent;
/// anything else that fails to parse is logged and dropped.
fn parse_release_date(external_id: i64, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::warn!(external_id, raw, error = %e, "unparseable release date, skipping");
            None
        }
    }
}

fn image_url(base: &str, path: Option<&str>) -> Option<String> {
    let path = path.filter(|p| !p.is_empty())?;
    Some(format!("{}{}", base.trim_end_matches('/'), path))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

fn record_from_search(item: SearchItem, genres: &GenreTable, image_base: &str) -> MovieRecord {
    let release_date = parse_release_date(item.id, item.release_date.as_deref());
    let mut record = MovieRecord::new(item.id, item.title);
    record.release_date = release_date;
    record.release_year = release_date.map(|d| d.year());
    record.plot = non_empty(item.overview);
    record.language = non_empty(item.original_language);
    record.poster_url = image_url(image_base, item.poster_path.as_deref());
    record.backdrop_url = image_url(image_base, item.backdrop_path.as_deref());
    record.genres = genres.resolve(&item.genre_ids);
    record.rating = Rating {
        external_score: item.vote_average,
        external_votes: item.vote_count,
        secondary: None,
    };
    record
}

fn record_from_details(details: MovieDetails, image_base: &str) -> MovieRecord {
    let release_date = parse_release_date(details.id, details.release_date.as_deref());
    let mut record = MovieRecord::new(details.id, details.title);
    record.imdb_id = non_empty(details.imdb_id);
    record.release_date = release_date;
    record.release_year = release_date.map(|d| d.year());
    record.runtime_minutes = details.runtime;
    record.plot = non_empty(details.overview);
    record.language = non_empty(details.original_language);
    record.status = non_empty(details.status);
    record.budget = details.budget;
    record.revenue = details.revenue;
    record.poster_url = image_url(image_base, details.poster_path.as_deref());
    record.backdrop_url = image_url(image_base, details.backdrop_path.as_deref());
    record.genres = details.genres.into_iter().map(|g| g.name).collect();
    record.actors = details
        .credits
        .cast
        .into_iter()
        .take(MAX_ACTORS)
        .map(|c| c.name)
        .collect();
    record.directors = details
        .credits
        .crew
        .into_iter()
        .filter(|c| c.job.as_deref() == Some("Director"))
        .map(|c| c.name)
        .collect();
    record.rating = Rating {
        external_score: details.vote_average,
        external_votes: details.vote_count,
        secondary: None,
    };
    record
}

/// Decode each search hit on its own so one bad item does not sink the page.
fn decode_search_items(
    results: Vec<serde_json::Value>,
    genres: &GenreTable,
    image_base: &str,
) -> Vec<MovieRecord> {
    results
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<SearchItem>(value) {
            Ok(item) => Some(record_from_search(item, genres, image_base)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable search result");
                None
            }
        })
        .collect()
}

/// [`RemoteCatalog`] backed by the TMDB v3 REST API.
pub struct TmdbCatalog {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    image_base_url: String,
    limiter: AdaptiveLimiter,
    genres: GenreTable,
}

impl TmdbCatalog {
    /// Build the client and load the genre table. A failed or empty genre
    /// fetch falls back to the built-in table.
    pub async fn connect(config: &Config) -> Result<Self, RemoteError> {
        let mut catalog = Self::with_genres(config, GenreTable::fallback())?;
        match catalog.fetch_genres().await {
            Ok(table) if !table.is_empty() => {
                tracing::info!(count = table.len(), "loaded TMDB genre list");
                catalog.genres = table;
            }
            Ok(_) => {
                tracing::warn!("TMDB returned an empty genre list, using built-in genres");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load TMDB genres, using built-in genres");
            }
        }
        Ok(catalog)
    }

    /// Build the client with an already known genre table. No network access.
    pub fn with_genres(config: &Config, genres: GenreTable) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.remote_timeout)
            .user_agent(concat!("movieflix/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_key: config.tmdb_api_key.clone().filter(|k| !k.is_empty()),
            base_url: config.tmdb_base_url.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url.clone(),
            limiter: AdaptiveLimiter::per_second(config.requests_per_second),
            genres,
        })
    }

    fn api_key(&self) -> Result<&str, RemoteError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| RemoteError::Unavailable("TMDB API key is not configured".into()))
    }

    /// Send a GET to `path` with the API key and `params`, throttled by the
    /// adaptive limiter. Returns `Ok(None)` on 404.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, RemoteError> {
        let api_key = self.api_key()?;
        self.limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(&[("api_key", api_key)])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout
                } else {
                    RemoteError::Http(e)
                }
            })?;

        if let Err(e) = check_rate_limit_response(&resp) {
            self.limiter.on_rate_limited(e.retry_after());
            return Err(e);
        }

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    async fn fetch_genres(&self) -> Result<GenreTable, RemoteError> {
        let list: Option<GenreListResponse> = self.get("/genre/movie/list", &[]).await?;
        let genres = list.map(|l| l.genres).unwrap_or_default();
        Ok(GenreTable::new(genres.into_iter().map(|g| (g.id, g.name))))
    }
}

impl std::fmt::Debug for TmdbCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbCatalog")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("genres", &self.genres.len())
            .finish()
    }
}

impl RemoteCatalog for TmdbCatalog {
    fn name(&self) -> &str {
        "TMDB"
    }

    fn search<'a>(&'a self, query: &'a str, page: u32) -> RemoteFuture<'a, Vec<MovieRecord>> {
        Box::pin(async move {
            let resp: Option<SearchResponse> = self
                .get(
                    "/search/movie",
                    &[
                        ("query", query.to_string()),
                        ("page", page.to_string()),
                        ("include_adult", "false".to_string()),
                    ],
                )
                .await?;
            let results = resp.map(|r| r.results).unwrap_or_default();
            let records = decode_search_items(results, &self.genres, &self.image_base_url);
            tracing::debug!(query, page, count = records.len(), "TMDB search");
            Ok(records)
        })
    }

    fn details(&self, external_id: i64) -> RemoteFuture<'_, Option<MovieRecord>> {
        Box::pin(async move {
            let path = format!("/movie/{external_id}");
            let details: Option<MovieDetails> = self
                .get(&path, &[("append_to_response", "credits".to_string())])
                .await?;
            Ok(details.map(|d| record_from_details(d, &self.image_base_url)))
        })
    }

    fn genres(&self) -> &GenreTable {
        &self.genres
    }
}
