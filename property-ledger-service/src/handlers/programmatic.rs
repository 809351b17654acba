//! POST /gpt/lancamentos: single-entry writes from automated clients.
//!
//! Access is checked by `programmatic_write_middleware`; this handler only
//! deals with the idempotency key and the payload.

use crate::models::CreatedEntry;
use crate::services::RawEntry;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{HeaderMap, StatusCode},
};
use serde_json::Value;
use service_core::error::AppError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// POST /gpt/lancamentos
pub async fn create_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedEntry>), AppError> {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    // A body that is not a JSON object counts as empty and reports missing fields.
    let raw: RawEntry = payload
        .ok()
        .and_then(|Json(value)| RawEntry::from_json(&value).ok())
        .unwrap_or_default();

    let created = state.entries.write_single(key, &raw).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
