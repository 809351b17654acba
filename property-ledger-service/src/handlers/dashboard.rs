//! Dashboard views over confirmed entries.

use crate::dtos::{LastUpdateResponse, RecentEntriesQuery, RecentEntryResponse};
use crate::services::dates;
use crate::startup::AppState;
use axum::extract::{Json, Query, State};
use chrono::Local;
use service_core::error::AppError;

/// GET /dashboard/ultimos-lancamentos?limit=N
pub async fn recent_entries(
    State(state): State<AppState>,
    Query(query): Query<RecentEntriesQuery>,
) -> Result<Json<Vec<RecentEntryResponse>>, AppError> {
    let today = Local::now().date_naive();
    let rows = state
        .store
        .last_confirmed_entries(today, query.limit())
        .await?;
    Ok(Json(rows.into_iter().map(RecentEntryResponse::from).collect()))
}

/// GET /dashboard/ultima-atualizacao
pub async fn last_update(
    State(state): State<AppState>,
) -> Result<Json<LastUpdateResponse>, AppError> {
    let today = Local::now().date_naive();
    let date = state.store.last_confirmed_date(today).await?;
    Ok(Json(LastUpdateResponse {
        data: date.map(dates::display),
    }))
}
