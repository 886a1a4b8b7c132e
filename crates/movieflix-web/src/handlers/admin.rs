use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use movieflix_core::CoreError;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::models::CacheStatsJson;
use crate::state::AppState;

pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStatsJson>, ApiError> {
    let stats = state.engine.cache().stats().map_err(CoreError::from)?;
    Ok(Json(CacheStatsJson::from(&stats)))
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let removed = state.engine.cache().clear().map_err(CoreError::from)?;
    Ok(Json(json!({
        "message": "Cache cleared successfully",
        "removed": removed,
    })))
}

pub async fn cleanup_expired(State(state): State<Arc<AppState>>) -> Json<Value> {
    let removed = state.engine.cache().sweep_expired(Utc::now());
    Json(json!({
        "message": "Expired cache entries removed",
        "removed": removed,
    }))
}
