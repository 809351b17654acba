//! Entry listing, dashboard batch import and manual edits.

use crate::dtos::{BatchResponse, MessageResponse};
use crate::models::Entry;
use crate::services::{LedgerError, RawEntry};
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
};
use serde_json::Value;
use service_core::error::AppError;

/// Body as JSON, with malformed bodies reported as 400.
pub(crate) fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| LedgerError::InvalidPayload(e.body_text()).into())
}

/// GET /lancamentos
pub async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<Entry>>, AppError> {
    Ok(Json(state.store.list_entries().await?))
}

/// POST /dashboard/lancamentos/lote
pub async fn create_batch(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchResponse>), AppError> {
    let items = match json_body(payload)? {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(LedgerError::InvalidPayload(
                "expected a non-empty list of entries".to_string(),
            )
            .into())
        }
    };

    let total = state.entries.write_batch(&items).await?;

    Ok((
        StatusCode::CREATED,
        Json(BatchResponse {
            message: "Entries imported".to_string(),
            total,
        }),
    ))
}

/// PATCH /dashboard/lancamentos/:id
pub async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let raw = RawEntry::from_json(&json_body(payload)?)?;
    state.entries.update_entry(id, &raw).await?;
    Ok(Json(MessageResponse::new(format!("Entry {} updated", id))))
}

/// DELETE /dashboard/lancamentos/:id
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.entries.delete_entry(id).await?;
    Ok(Json(MessageResponse::new(format!("Entry {} deleted", id))))
}
