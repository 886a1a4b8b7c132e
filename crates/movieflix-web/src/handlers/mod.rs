pub mod admin;
pub mod movies;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::state::AppState;

/// All API routes bound to `state`. CORS is layered on by the caller.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/movies", get(movies::search_movies))
        .route("/api/movies/search", post(movies::search_movies_post))
        .route("/api/movies/genres", get(movies::genres))
        .route("/api/movies/{id}", get(movies::movie_by_id))
        .route("/api/movies/tmdb/{tmdb_id}", get(movies::movie_by_tmdb_id))
        .route("/api/movies/genre/{genre}", get(movies::movies_by_genre))
        .route("/api/movies/year/{year}", get(movies::movies_by_year))
        .route("/api/admin/cache/stats", get(admin::cache_stats))
        .route("/api/admin/cache/clear", delete(admin::clear_cache))
        .route("/api/admin/cache/cleanup", post(admin::cleanup_expired))
        .with_state(state)
}
