//! Category model and the foreign-key references an entry carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Expense/income category. `dc` is the debit/credit flag (`"D"` or `"C"`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    #[serde(rename = "categoria")]
    pub label: String,
    pub dc: String,
    pub created_at: DateTime<Utc>,
}

/// Search hit: id and label only.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub id: i64,
    #[serde(rename = "categoria")]
    pub label: String,
}

/// Input for creating a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    #[serde(rename = "categoria")]
    pub label: String,
    pub dc: String,
}

/// Entity an entry references by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    Property,
    Category,
    Situation,
}

impl Reference {
    /// Table holding the referenced rows.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Property => "imoveis",
            Self::Category => "categorias",
            Self::Situation => "situacao_lancamento",
        }
    }

    /// Wire field carrying the reference on an entry payload.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Property => "id_imovel",
            Self::Category => "id_categoria",
            Self::Situation => "id_situacao",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Category => "category",
            Self::Situation => "situation",
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
