//! Request and response bodies that are not plain models.

use crate::models::ConfirmedEntry;
use crate::services::dates;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_RECENT_LIMIT: i64 = 10;
pub const MAX_RECENT_LIMIT: i64 = 50;

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub message: String,
    pub total: usize,
}

/// Body returned when a property or category is created.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedProperty {
    pub id: i64,
    pub nome: String,
    pub vendido: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedCategory {
    pub id: i64,
    pub categoria: String,
    pub dc: String,
}

/// Partial property update. Absent or blank fields keep their stored value.
/// Money fields accept `1.234,56` style strings.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePropertyRequest {
    pub nome: Option<String>,
    pub vendido: Option<bool>,
    pub endereco: Option<String>,
    pub nome_ocupante: Option<String>,
    pub cpf_ocupante: Option<String>,
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
    pub corretagem: Option<Value>,
    pub ganho_capital: Option<Value>,
    pub valor_venda: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RecentEntriesQuery {
    pub limit: Option<String>,
}

/// Page size clamped to `1..=50`; absent or unparsable values fall back to 10.
fn clamp_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT)
}

impl RecentEntriesQuery {
    pub fn limit(&self) -> i64 {
        clamp_limit(self.limit.as_deref())
    }
}

/// `?q=&limit=&offset=` for the search routes.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl SearchQuery {
    /// Trimmed search term; blank means "no filter".
    pub fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn limit(&self) -> i64 {
        clamp_limit(self.limit.as_deref())
    }

    /// Rows to skip; negative or unparsable values mean 0.
    pub fn offset(&self) -> i64 {
        self.offset
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(0)
            .max(0)
    }
}

/// Confirmed entry as the dashboard shows it.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecentEntryResponse {
    /// `DD/MM/YYYY`.
    pub data: String,
    pub descricao: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor: Decimal,
    pub imovel: String,
    pub categoria: String,
}

impl From<ConfirmedEntry> for RecentEntryResponse {
    fn from(entry: ConfirmedEntry) -> Self {
        Self {
            data: dates::display(entry.date),
            descricao: entry.description,
            valor: entry.amount,
            imovel: entry.property,
            categoria: entry.category,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LastUpdateResponse {
    /// `DD/MM/YYYY`, or null when there is no confirmed entry yet.
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<&str>) -> RecentEntriesQuery {
        RecentEntriesQuery {
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn test_recent_limit_is_clamped() {
        assert_eq!(query(None).limit(), 10);
        assert_eq!(query(Some("abc")).limit(), 10);
        assert_eq!(query(Some("0")).limit(), 1);
        assert_eq!(query(Some("-5")).limit(), 1);
        assert_eq!(query(Some("25")).limit(), 25);
        assert_eq!(query(Some("500")).limit(), 50);
    }

    #[test]
    fn test_search_query_defaults_and_bounds() {
        let empty = SearchQuery::default();
        assert_eq!(empty.term(), None);
        assert_eq!(empty.limit(), 10);
        assert_eq!(empty.offset(), 0);

        let query = SearchQuery {
            q: Some("  casa ".to_string()),
            limit: Some("99".to_string()),
            offset: Some("-3".to_string()),
        };
        assert_eq!(query.term(), Some("casa"));
        assert_eq!(query.limit(), 50);
        assert_eq!(query.offset(), 0);

        let blank = SearchQuery {
            q: Some("   ".to_string()),
            offset: Some("20".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.term(), None);
        assert_eq!(blank.offset(), 20);
    }
}
