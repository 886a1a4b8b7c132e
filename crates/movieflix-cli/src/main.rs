use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use movieflix_core::{
    Config, GenreTable, LookupEngine, MovieCache, SearchQuery, SortDirection, SortField,
    TmdbCatalog, build_record_store,
};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// MovieFlix - search and cache movie metadata from TMDB
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// SQLite cache file (overrides config and MOVIEFLIX_CACHE_PATH)
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search movies by title, cache first
    Search {
        /// Title text to look for
        query: String,

        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(short, long, default_value_t = 20)]
        size: u32,

        /// Only movies whose genre contains this text
        #[arg(long)]
        genre: Option<String>,

        #[arg(long)]
        year: Option<i32>,

        /// title, year, rating or runtime
        #[arg(long, default_value = "title")]
        sort_by: SortField,

        /// asc or desc
        #[arg(long, default_value = "asc")]
        direction: SortDirection,
    },

    /// Show one movie by its TMDB id
    Show { tmdb_id: i64 },

    /// List cached movies in a genre
    Genre { name: String },

    /// List cached movies released in a year
    Year { year: i32 },

    /// Print cache statistics
    Stats,

    /// Remove expired records now
    Sweep,

    /// Remove every cached record
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load();
    if let Some(path) = cli.cache_path {
        config.cache_path = Some(path);
    }
    tracing::debug!(?config, "loaded configuration");
    let color = ColorMode(!cli.no_color);
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::Search {
            query,
            page,
            size,
            genre,
            year,
            sort_by,
            direction,
        } => {
            let mut query = SearchQuery::new(query)
                .page(page)
                .page_size(size)
                .sort(sort_by, direction);
            if let Some(genre) = genre {
                query = query.genre(genre);
            }
            if let Some(year) = year {
                query = query.year(year);
            }
            let engine = movieflix_core::build_engine(&config).await?;
            let result = engine.search_movies(&query).await?;
            output::print_search_result(&mut out, &result, color)?;
        }
        Command::Show { tmdb_id } => {
            let engine = movieflix_core::build_engine(&config).await?;
            let view = engine.get_by_external_id(tmdb_id).await?;
            output::print_movie_details(&mut out, &view, color)?;
        }
        Command::Genre { name } => {
            let engine = cache_only_engine(&config)?;
            output::print_movie_list(&mut out, &engine.get_by_genre(&name)?, color)?;
        }
        Command::Year { year } => {
            let engine = cache_only_engine(&config)?;
            output::print_movie_list(&mut out, &engine.get_by_year(year)?, color)?;
        }
        Command::Stats => {
            let stats = open_cache(&config).stats()?;
            output::print_stats(&mut out, &stats, color)?;
        }
        Command::Sweep => {
            let removed = open_cache(&config).sweep_expired(Utc::now());
            writeln!(out, "Removed {removed} expired records")?;
        }
        Command::Clear => {
            let removed = open_cache(&config).clear()?;
            writeln!(out, "Removed {removed} records")?;
        }
    }
    Ok(())
}

/// Cache over the configured store, without connecting to TMDB.
fn open_cache(config: &Config) -> MovieCache {
    let store = build_record_store(config.cache_path.as_deref());
    MovieCache::with_ttl(store, config.cache_ttl)
}

/// Engine for lookups that never leave the cache. The catalog uses the
/// built-in genre table, so building it makes no TMDB request.
fn cache_only_engine(config: &Config) -> anyhow::Result<LookupEngine> {
    let remote = TmdbCatalog::with_genres(config, GenreTable::fallback())?;
    Ok(LookupEngine::new(Arc::new(open_cache(config)), Arc::new(remote)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use movieflix_core::MovieRecord;

    fn temp_cache_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("movieflix_cli_test_{}", std::process::id()))
            .join("movies.db")
    }

    #[test]
    fn genre_and_year_lookups_need_no_tmdb() {
        let path = temp_cache_path();
        let _ = std::fs::remove_file(&path);
        let config = Config {
            // nothing listens here; any request would fail
            tmdb_base_url: "http://127.0.0.1:9".into(),
            cache_path: Some(path),
            ..Config::default()
        };
        let mut heat = MovieRecord::new(949, "Heat");
        heat.release_year = Some(1995);
        heat.genres = vec!["Crime".into()];
        open_cache(&config).save_or_refresh(&heat).unwrap();

        let engine = cache_only_engine(&config).unwrap();
        assert_eq!(engine.get_by_genre("crime").unwrap().len(), 1);
        assert_eq!(engine.get_by_year(1995).unwrap()[0].movie.title, "Heat");
        assert_eq!(engine.available_genres().len(), 19);
    }
}
