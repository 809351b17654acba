//! Category CRUD.
//!
//! GET/POST /categorias, DELETE /categorias/:id

use crate::dtos::{CreatedCategory, MessageResponse};
use crate::models::{Category, NewCategory};
use crate::services::LedgerError;
use crate::startup::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use service_core::error::AppError;

/// GET /categorias
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.store.list_categories().await?))
}

/// POST /categorias
pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<NewCategory>,
) -> Result<(StatusCode, Json<CreatedCategory>), AppError> {
    let label = req.label.trim();
    if label.is_empty() {
        return Err(LedgerError::MissingField(vec!["categoria"]).into());
    }
    let dc = req.dc.trim().to_uppercase();
    if dc != "D" && dc != "C" {
        return Err(LedgerError::InvalidPayload("dc must be 'D' or 'C'".to_string()).into());
    }

    let id = state.store.create_category(label, &dc).await?;
    tracing::info!(category_id = id, "Category created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedCategory {
            id,
            categoria: label.to_string(),
            dc,
        }),
    ))
}

/// DELETE /categorias/:id
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.store.delete_category(id).await? {
        return Err(LedgerError::NotFound(format!("Category {}", id)).into());
    }
    tracing::info!(category_id = id, "Category deleted");
    Ok(Json(MessageResponse::new(format!("Category {} deleted", id))))
}
