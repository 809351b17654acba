//! Budget groups and per-property budgets.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Budget grouping of categories.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    #[serde(rename = "grupo")]
    pub label: String,
}

/// Stored budget row, keyed by (property, group).
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Budget {
    pub property_id: i64,
    pub group_id: i64,
    pub amount: Decimal,
}

/// One budget change requested for a property.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetItem {
    pub group_id: i64,
    pub amount: Decimal,
}

/// Budget as listed for a property: one per known group, zero when never set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRow {
    #[serde(rename = "id_imovel")]
    pub property_id: i64,
    #[serde(rename = "id_grupo")]
    pub group_id: i64,
    #[serde(rename = "orcamento", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "descricao")]
    pub label: String,
}
