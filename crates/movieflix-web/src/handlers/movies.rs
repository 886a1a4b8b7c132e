use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use movieflix_core::SearchQuery;

use crate::error::ApiError;
use crate::models::{MovieJson, PagedMoviesJson, SearchParams, SearchRequest};
use crate::state::AppState;

pub async fn search_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<PagedMoviesJson>, ApiError> {
    let query = SearchQuery::try_from(params)?;
    tracing::info!(text = %query.text, page = query.page, "search request");
    let result = state.engine.search_movies(&query).await?;
    Ok(Json(PagedMoviesJson::from(&result)))
}

pub async fn search_movies_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<PagedMoviesJson>, ApiError> {
    let query = SearchQuery::try_from(body)?;
    tracing::info!(text = %query.text, page = query.page, "search request");
    let result = state.engine.search_movies(&query).await?;
    Ok(Json(PagedMoviesJson::from(&result)))
}

pub async fn movie_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MovieJson>, ApiError> {
    let view = state.engine.get_by_internal_id(id)?;
    Ok(Json(MovieJson::from(&view)))
}

pub async fn movie_by_tmdb_id(
    State(state): State<Arc<AppState>>,
    Path(tmdb_id): Path<i64>,
) -> Result<Json<MovieJson>, ApiError> {
    let view = state.engine.get_by_external_id(tmdb_id).await?;
    Ok(Json(MovieJson::from(&view)))
}

pub async fn movies_by_genre(
    State(state): State<Arc<AppState>>,
    Path(genre): Path<String>,
) -> Result<Json<Vec<MovieJson>>, ApiError> {
    let views = state.engine.get_by_genre(&genre)?;
    Ok(Json(views.iter().map(MovieJson::from).collect()))
}

pub async fn movies_by_year(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> Result<Json<Vec<MovieJson>>, ApiError> {
    let views = state.engine.get_by_year(year)?;
    Ok(Json(views.iter().map(MovieJson::from).collect()))
}

pub async fn genres(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.engine.available_genres())
}
