//! GET/POST /orcamentos/:id_imovel

use crate::dtos::MessageResponse;
use crate::handlers::entries::json_body;
use crate::models::BudgetRow;
use crate::services::budgets::parse_budget_item;
use crate::services::LedgerError;
use crate::startup::AppState;
use axum::extract::{rejection::JsonRejection, Json, Path, State};
use serde_json::Value;
use service_core::error::AppError;

/// GET /orcamentos/:id_imovel
pub async fn list_budgets(
    State(state): State<AppState>,
    Path(property_id): Path<i64>,
) -> Result<Json<Vec<BudgetRow>>, AppError> {
    Ok(Json(state.budgets.list_budgets(property_id).await?))
}

/// POST /orcamentos/:id_imovel
pub async fn upsert_budgets(
    State(state): State<AppState>,
    Path(property_id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Value::Array(items) = json_body(payload)? else {
        return Err(
            LedgerError::InvalidPayload("expected a list of budgets".to_string()).into(),
        );
    };

    let items = items
        .iter()
        .map(parse_budget_item)
        .collect::<Result<Vec<_>, _>>()?;

    state.budgets.upsert_budgets(property_id, &items).await?;
    Ok(Json(MessageResponse::new("Budgets updated")))
}
