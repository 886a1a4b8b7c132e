//! SQLite-backed record store.
//!
//! Writes go through a single connection behind a [`Mutex`]; reads borrow a
//! connection from a small pool of read-only handles (WAL mode allows them to
//! run alongside the writer). Genre and title matching are registered as
//! scalar functions on every connection so the SQL path applies exactly the
//! same rules as [`MemoryStore`](super::MemoryStore).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags, Row, params};

use super::{RecordStore, StoreError, StorePage, TitleQuery};
use crate::model::{InternalId, MovieRecord, Rating};
use crate::query::contains_ci;

const COLUMNS: &str = "id, external_id, imdb_id, title, release_year, runtime_minutes, \
     genres, directors, actors, plot, language, status, budget, revenue, \
     poster_url, backdrop_url, release_date, rating_score, rating_votes, rating_secondary, \
     created_at, updated_at, expires_at";

const SEARCH_WHERE: &str = "ci_contains(title, ?1) \
     AND (?2 IS NULL OR genres_match(genres, ?2)) \
     AND (?3 IS NULL OR release_year = ?3)";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Open a SQLite connection with WAL mode and the matching functions registered.
fn open_sqlite(path: &Path, read_only: bool) -> Result<Connection, rusqlite::Error> {
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };
    let conn = Connection::open_with_flags(path, flags)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    register_functions(&conn)?;
    Ok(conn)
}

fn register_functions(conn: &Connection) -> Result<(), rusqlite::Error> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function("ci_contains", 2, flags, |ctx| {
        let haystack: String = ctx.get(0)?;
        let needle: String = ctx.get(1)?;
        Ok(contains_ci(&haystack, &needle))
    })?;
    conn.create_scalar_function("genres_match", 2, flags, |ctx| {
        let genres_json: Option<String> = ctx.get(0)?;
        let needle: Option<String> = ctx.get(1)?;
        let Some(needle) = needle.filter(|n| !n.is_empty()) else {
            return Ok(true);
        };
        let genres: Vec<String> = genres_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_default();
        Ok(genres.iter().any(|g| contains_ci(g, &needle)))
    })?;
    Ok(())
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn decode_list(json: Option<String>) -> Vec<String> {
    json.and_then(|j| serde_json::from_str(&j).ok())
        .unwrap_or_default()
}

fn row_to_record(row: &Row<'_>) -> Result<MovieRecord, rusqlite::Error> {
    let release_date: Option<String> = row.get(16)?;
    Ok(MovieRecord {
        id: Some(row.get(0)?),
        external_id: row.get(1)?,
        imdb_id: row.get(2)?,
        title: row.get(3)?,
        release_year: row.get(4)?,
        runtime_minutes: row.get(5)?,
        genres: decode_list(row.get(6)?),
        directors: decode_list(row.get(7)?),
        actors: decode_list(row.get(8)?),
        plot: row.get(9)?,
        language: row.get(10)?,
        status: row.get(11)?,
        budget: row.get(12)?,
        revenue: row.get(13)?,
        poster_url: row.get(14)?,
        backdrop_url: row.get(15)?,
        release_date: release_date.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
        rating: Rating {
            external_score: row.get(17)?,
            external_votes: row.get(18)?,
            secondary: row.get(19)?,
        },
        created_at: from_millis(row.get(20)?),
        updated_at: from_millis(row.get(21)?),
        expires_at: from_millis(row.get(22)?),
    })
}

/// Writer connection: schema, upserts and deletes.
struct SqliteWriter {
    conn: Connection,
}

impl SqliteWriter {
    fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = open_sqlite(path, false)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS movies (
                 id               INTEGER PRIMARY KEY AUTOINCREMENT,
                 external_id      INTEGER NOT NULL UNIQUE,
                 imdb_id          TEXT,
                 title            TEXT NOT NULL,
                 release_year     INTEGER,
                 runtime_minutes  INTEGER,
                 genres           TEXT NOT NULL DEFAULT '[]',
                 directors        TEXT NOT NULL DEFAULT '[]',
                 actors           TEXT NOT NULL DEFAULT '[]',
                 plot             TEXT,
                 language         TEXT,
                 status           TEXT,
                 budget           INTEGER,
                 revenue          INTEGER,
                 poster_url       TEXT,
                 backdrop_url     TEXT,
                 release_date     TEXT,
                 rating_score     REAL,
                 rating_votes     INTEGER,
                 rating_secondary REAL,
                 created_at       INTEGER NOT NULL,
                 updated_at       INTEGER NOT NULL,
                 expires_at       INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_movies_expires_at ON movies (expires_at);
             CREATE INDEX IF NOT EXISTS idx_movies_title ON movies (title);
             CREATE INDEX IF NOT EXISTS idx_movies_release_year ON movies (release_year);",
        )?;
        Ok(Self { conn })
    }

    fn upsert(&self, r: &MovieRecord) -> Result<MovieRecord, StoreError> {
        let sql = format!(
            "INSERT INTO movies (external_id, imdb_id, title, release_year, runtime_minutes,
                 genres, directors, actors, plot, language, status, budget, revenue,
                 poster_url, backdrop_url, release_date, rating_score, rating_votes,
                 rating_secondary, created_at, updated_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22)
             ON CONFLICT(external_id) DO UPDATE SET
                 imdb_id = excluded.imdb_id,
                 title = excluded.title,
                 release_year = excluded.release_year,
                 runtime_minutes = excluded.runtime_minutes,
                 genres = excluded.genres,
                 directors = excluded.directors,
                 actors = excluded.actors,
                 plot = excluded.plot,
                 language = excluded.language,
                 status = excluded.status,
                 budget = excluded.budget,
                 revenue = excluded.revenue,
                 poster_url = excluded.poster_url,
                 backdrop_url = excluded.backdrop_url,
                 release_date = excluded.release_date,
                 rating_score = excluded.rating_score,
                 rating_votes = excluded.rating_votes,
                 rating_secondary = excluded.rating_secondary,
                 updated_at = excluded.updated_at,
                 expires_at = excluded.expires_at
             RETURNING {COLUMNS}"
        );
        let genres = serde_json::to_string(&r.genres)?;
        let directors = serde_json::to_string(&r.directors)?;
        let actors = serde_json::to_string(&r.actors)?;
        let release_date = r.release_date.map(|d| d.format(DATE_FORMAT).to_string());

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let stored = stmt.query_row(
            params![
                r.external_id,
                r.imdb_id,
                r.title,
                r.release_year,
                r.runtime_minutes,
                genres,
                directors,
                actors,
                r.plot,
                r.language,
                r.status,
                r.budget,
                r.revenue,
                r.poster_url,
                r.backdrop_url,
                release_date,
                r.rating.external_score,
                r.rating.external_votes,
                r.rating.secondary,
                to_millis(r.created_at),
                to_millis(r.updated_at),
                to_millis(r.expires_at),
            ],
            row_to_record,
        )?;
        Ok(stored)
    }

    fn delete_by_id(&self, id: InternalId) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM movies WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "DELETE FROM movies WHERE expires_at < ?1",
            params![to_millis(cutoff)],
        )?)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let n = self.conn.execute("DELETE FROM movies", [])?;
        // Without VACUUM the deleted pages stay allocated in the file.
        let _ = self.conn.execute_batch("VACUUM");
        Ok(n)
    }
}

/// Pool of read-only connections, opened lazily.
struct ReadPool {
    pool: Mutex<Vec<Connection>>,
    path: PathBuf,
}

impl ReadPool {
    fn new(path: &Path) -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
            path: path.to_path_buf(),
        }
    }

    fn acquire(&self) -> Result<Connection, StoreError> {
        if let Ok(mut pool) = self.pool.lock()
            && let Some(conn) = pool.pop()
        {
            return Ok(conn);
        }
        Ok(open_sqlite(&self.path, true)?)
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut pool) = self.pool.lock() {
            pool.push(conn);
        }
    }

    /// Run `f` against a pooled connection and hand it back afterwards.
    fn with<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let conn = self.acquire()?;
        let result = f(&conn);
        self.release(conn);
        Ok(result?)
    }
}

fn query_records(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<MovieRecord>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, row_to_record)?;
    rows.collect()
}

/// Persistent [`RecordStore`] over a single SQLite file.
pub struct SqliteStore {
    writer: Mutex<SqliteWriter>,
    readers: ReadPool,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let writer = SqliteWriter::open(path)?;
        tracing::debug!(path = %path.display(), "opened sqlite record store");
        Ok(Self {
            writer: Mutex::new(writer),
            readers: ReadPool::new(path),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&SqliteWriter) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let writer = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
        f(&writer)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn find_by_external_id(&self, external_id: i64) -> Result<Option<MovieRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM movies WHERE external_id = ?1");
        self.readers
            .with(|conn| query_records(conn, &sql, params![external_id]))
            .map(|rows| rows.into_iter().next())
    }

    fn exists_by_external_id(&self, external_id: i64) -> Result<bool, StoreError> {
        self.readers.with(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM movies WHERE external_id = ?1)",
                params![external_id],
                |row| row.get(0),
            )
        })
    }

    fn find_by_id(&self, id: InternalId) -> Result<Option<MovieRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM movies WHERE id = ?1");
        self.readers
            .with(|conn| query_records(conn, &sql, params![id]))
            .map(|rows| rows.into_iter().next())
    }

    fn title_contains(&self, query: &TitleQuery) -> Result<StorePage, StoreError> {
        let genre = query.filter.genre_needle();
        let year = query.filter.year;
        let count_sql = format!("SELECT COUNT(*) FROM movies WHERE {SEARCH_WHERE}");
        let page_sql = format!(
            "SELECT {COLUMNS} FROM movies WHERE {SEARCH_WHERE} ORDER BY {} LIMIT ?4 OFFSET ?5",
            query.sort.order_by_sql()
        );
        self.readers.with(|conn| {
            let total: i64 = conn.query_row(
                &count_sql,
                params![query.text, genre, year],
                |row| row.get(0),
            )?;
            let items = query_records(
                conn,
                &page_sql,
                params![
                    query.text,
                    genre,
                    year,
                    query.limit as i64,
                    query.offset as i64
                ],
            )?;
            Ok(StorePage {
                items,
                total: total.max(0) as u64,
            })
        })
    }

    fn find_by_genre_contains(&self, genre: &str) -> Result<Vec<MovieRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM movies WHERE genres_match(genres, ?1) ORDER BY title ASC, id ASC"
        );
        self.readers
            .with(|conn| query_records(conn, &sql, params![genre]))
    }

    fn find_by_year(&self, year: i32) -> Result<Vec<MovieRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM movies WHERE release_year = ?1 ORDER BY title ASC, id ASC"
        );
        self.readers
            .with(|conn| query_records(conn, &sql, params![year]))
    }

    fn find_expired_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MovieRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM movies WHERE expires_at < ?1 ORDER BY title ASC, id ASC"
        );
        self.readers
            .with(|conn| query_records(conn, &sql, params![to_millis(cutoff)]))
    }

    fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.write(|w| w.delete_expired_before(cutoff))
    }

    fn upsert(&self, record: &MovieRecord) -> Result<MovieRecord, StoreError> {
        let stored = self.write(|w| w.upsert(record))?;
        tracing::trace!(
            external_id = stored.external_id,
            id = stored.id,
            "sqlite store upsert"
        );
        Ok(stored)
    }

    fn delete_by_id(&self, id: InternalId) -> Result<bool, StoreError> {
        self.write(|w| w.delete_by_id(id))
    }

    fn count(&self) -> Result<u64, StoreError> {
        self.readers
            .with(|conn| conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get::<_, i64>(0)))
            .map(|n| n.max(0) as u64)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        self.write(|w| w.delete_all())
    }
}
