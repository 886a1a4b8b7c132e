//! Remote catalog trait and implementations.

pub mod genres;
pub mod mock;
pub mod tmdb;

pub use genres::GenreTable;
pub use tmdb::TmdbCatalog;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::model::MovieRecord;

/// Boxed future returned by [`RemoteCatalog`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Failure talking to a remote catalog.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote request timed out")]
    Timeout,
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("rate limited (429){}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("remote unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// The server's requested back-off, for a 429.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {:.1}s", d.as_secs_f64()))
        .unwrap_or_default()
}

/// An external movie catalog that returns domain records.
pub trait RemoteCatalog: Send + Sync {
    /// Catalog name for logs (e.g. "TMDB").
    fn name(&self) -> &str;

    /// One page of search results. Records are partial: no cast, crew or
    /// runtime.
    fn search<'a>(&'a self, query: &'a str, page: u32) -> RemoteFuture<'a, Vec<MovieRecord>>;

    /// Full details for one movie. `Ok(None)` when the catalog has no such id.
    fn details(&self, external_id: i64) -> RemoteFuture<'_, Option<MovieRecord>>;

    /// Genre id to name table loaded when the catalog was constructed.
    fn genres(&self) -> &GenreTable;
}
