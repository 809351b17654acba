//! Public name lookups.
//!
//! GET /imoveis/search, GET /categorias/search

use crate::dtos::SearchQuery;
use crate::models::{CategoryMatch, PropertyMatch};
use crate::startup::AppState;
use axum::extract::{Json, Query, State};
use service_core::error::AppError;
use tracing::debug;

fn ensure_enabled(state: &AppState) -> Result<(), AppError> {
    if state.config.access.search_enabled {
        Ok(())
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Not found")))
    }
}

/// GET /imoveis/search?q=&limit=&offset=
pub async fn search_properties(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PropertyMatch>>, AppError> {
    ensure_enabled(&state)?;
    let (limit, offset) = (query.limit(), query.offset());
    debug!(term = ?query.term(), limit, offset, "Searching properties");
    Ok(Json(
        state
            .store
            .search_properties(query.term(), limit, offset)
            .await?,
    ))
}

/// GET /categorias/search?q=&limit=&offset=
pub async fn search_categories(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<CategoryMatch>>, AppError> {
    ensure_enabled(&state)?;
    let (limit, offset) = (query.limit(), query.offset());
    Ok(Json(
        state
            .store
            .search_categories(query.term(), limit, offset)
            .await?,
    ))
}
