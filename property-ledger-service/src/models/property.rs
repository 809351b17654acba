//! Property (imóvel) model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A property owned or managed by the ledger.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "vendido")]
    pub sold: bool,
    #[serde(rename = "endereco")]
    pub address: Option<String>,
    #[serde(rename = "nome_ocupante")]
    pub occupant_name: Option<String>,
    #[serde(rename = "cpf_ocupante")]
    pub occupant_cpf: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "corretagem", with = "rust_decimal::serde::float_option")]
    pub brokerage_fee: Option<Decimal>,
    #[serde(rename = "ganho_capital", with = "rust_decimal::serde::float_option")]
    pub capital_gain: Option<Decimal>,
    #[serde(rename = "valor_venda", with = "rust_decimal::serde::float_option")]
    pub sale_value: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Property {
    pub fn new(id: i64, name: impl Into<String>, sold: bool) -> Self {
        Self {
            id,
            name: name.into(),
            sold,
            address: None,
            occupant_name: None,
            occupant_cpf: None,
            latitude: None,
            longitude: None,
            brokerage_fee: None,
            capital_gain: None,
            sale_value: None,
            created_at: Utc::now(),
        }
    }
}

/// Property listing row with the sum of all its entries.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PropertySummary {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "vendido")]
    pub sold: bool,
    #[serde(rename = "total_lancamentos", with = "rust_decimal::serde::float")]
    pub total_entries: Decimal,
}

/// Input for creating a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProperty {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "vendido", default)]
    pub sold: bool,
}

/// Search hit: id and name only.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PropertyMatch {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
}
