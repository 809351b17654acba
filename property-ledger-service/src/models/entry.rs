//! Financial entry (lançamento) model.

use crate::services::dates::CanonicalDate;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Situation id meaning "confirmed".
pub const CONFIRMED_SITUATION_ID: i64 = 1;

/// Category id the batch path assigns when none is given.
pub const UNCATEGORIZED_CATEGORY_ID: i64 = 0;

/// Stored entry.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "id_imovel")]
    pub property_id: i64,
    #[serde(rename = "id_categoria")]
    pub category_id: i64,
    #[serde(rename = "id_situacao")]
    pub situation_id: i64,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "valor", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "ativo")]
    pub active: bool,
}

/// Validated entry ready to be written. Always active.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub date: CanonicalDate,
    pub property_id: i64,
    pub category_id: i64,
    pub situation_id: i64,
    pub description: String,
    pub amount: Decimal,
}

/// Response body of the programmatic write endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedEntry {
    pub id: i64,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "valor", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Confirmed entry joined with its property name and category label.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ConfirmedEntry {
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "valor", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "imovel")]
    pub property: String,
    #[serde(rename = "categoria")]
    pub category: String,
}
