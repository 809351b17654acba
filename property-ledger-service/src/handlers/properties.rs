//! Property CRUD.
//!
//! GET/POST /imoveis, GET/PATCH/DELETE /imoveis/:id

use crate::dtos::{CreatedProperty, MessageResponse, UpdatePropertyRequest};
use crate::models::{NewProperty, Property, PropertySummary};
use crate::services::validation::parse_localized_decimal;
use crate::services::LedgerError;
use crate::startup::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde_json::Value;
use service_core::error::AppError;

fn not_found(id: i64) -> AppError {
    LedgerError::NotFound(format!("Property {}", id)).into()
}

fn is_blank(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn money_field(
    field: &'static str,
    value: &Option<Value>,
    current: Option<Decimal>,
) -> Result<Option<Decimal>, LedgerError> {
    match value {
        v if is_blank(v) => Ok(current),
        Some(v) => parse_localized_decimal(v)
            .map(Some)
            .ok_or(LedgerError::InvalidNumeric {
                field,
                expected: "a number",
            }),
        None => Ok(current),
    }
}

fn coordinate_field(
    field: &'static str,
    value: &Option<Value>,
    current: Option<f64>,
) -> Result<Option<f64>, LedgerError> {
    let invalid = LedgerError::InvalidNumeric {
        field,
        expected: "a number",
    };
    match value {
        v if is_blank(v) => Ok(current),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or(invalid),
        Some(Value::String(s)) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid),
        _ => Err(invalid),
    }
}

fn apply_update(property: &mut Property, req: UpdatePropertyRequest) -> Result<(), LedgerError> {
    if let Some(name) = req.nome.filter(|n| !n.trim().is_empty()) {
        property.name = name.trim().to_string();
    }
    if let Some(sold) = req.vendido {
        property.sold = sold;
    }
    if let Some(address) = req.endereco {
        property.address = Some(address);
    }
    if let Some(occupant) = req.nome_ocupante {
        property.occupant_name = Some(occupant);
    }
    if let Some(cpf) = req.cpf_ocupante {
        // A blank CPF clears the stored one.
        let cpf = cpf.trim();
        property.occupant_cpf = (!cpf.is_empty()).then(|| cpf.to_string());
    }
    property.latitude = coordinate_field("latitude", &req.latitude, property.latitude)?;
    property.longitude = coordinate_field("longitude", &req.longitude, property.longitude)?;
    property.brokerage_fee = money_field("corretagem", &req.corretagem, property.brokerage_fee)?;
    property.capital_gain = money_field("ganho_capital", &req.ganho_capital, property.capital_gain)?;
    property.sale_value = money_field("valor_venda", &req.valor_venda, property.sale_value)?;
    Ok(())
}

/// GET /imoveis
pub async fn list_properties(
    State(state): State<AppState>,
) -> Result<Json<Vec<PropertySummary>>, AppError> {
    Ok(Json(state.store.list_properties().await?))
}

/// POST /imoveis
pub async fn create_property(
    State(state): State<AppState>,
    Json(req): Json<NewProperty>,
) -> Result<(StatusCode, Json<CreatedProperty>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(LedgerError::MissingField(vec!["nome"]).into());
    }

    let id = state.store.create_property(name, req.sold).await?;
    tracing::info!(property_id = id, "Property created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedProperty {
            id,
            nome: name.to_string(),
            vendido: req.sold,
        }),
    ))
}

/// GET /imoveis/:id
pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Property>, AppError> {
    state
        .store
        .get_property(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// PATCH /imoveis/:id
pub async fn update_property(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePropertyRequest>,
) -> Result<Json<Property>, AppError> {
    let mut property = state
        .store
        .get_property(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    apply_update(&mut property, req)?;

    if !state.store.update_property(&property).await? {
        return Err(not_found(id));
    }
    tracing::info!(property_id = id, "Property updated");
    Ok(Json(property))
}

/// DELETE /imoveis/:id
pub async fn delete_property(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.store.delete_property(id).await? {
        return Err(not_found(id));
    }
    tracing::info!(property_id = id, "Property deleted");
    Ok(Json(MessageResponse::new(format!("Property {} deleted", id))))
}
