//! Entry payload validation shared by the batch, programmatic and manual-edit
//! write paths.
//!
//! Checks run in a fixed order and the first failure wins: missing fields,
//! date, amount, ids, referenced rows, description.

use crate::models::{NewEntry, Reference, CONFIRMED_SITUATION_ID, UNCATEGORIZED_CATEGORY_ID};
use crate::services::dates;
use crate::services::error::LedgerError;
use crate::services::store::StoreTx;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Entry as received on the wire. Every field is optional here so that
/// missing ones can be reported together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    pub data: Option<Value>,
    pub id_imovel: Option<Value>,
    pub id_categoria: Option<Value>,
    pub id_situacao: Option<Value>,
    pub descricao: Option<Value>,
    pub valor: Option<Value>,
}

impl RawEntry {
    /// Decode one wire item. Anything but a JSON object is rejected.
    pub fn from_json(value: &Value) -> Result<Self, LedgerError> {
        if !value.is_object() {
            return Err(LedgerError::InvalidPayload(
                "entry must be an object".to_string(),
            ));
        }
        RawEntry::deserialize(value).map_err(|e| LedgerError::InvalidPayload(e.to_string()))
    }
}

/// What a write path demands of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Category and situation must be supplied. When false they default to
    /// the uncategorized category and the confirmed situation.
    pub require_classification: bool,
    /// Look up property, category and situation before writing.
    pub check_references: bool,
}

impl ValidationPolicy {
    pub fn batch(check_references: bool) -> Self {
        Self {
            require_classification: false,
            check_references,
        }
    }

    pub fn programmatic() -> Self {
        Self {
            require_classification: true,
            check_references: true,
        }
    }

    pub fn manual_edit(check_references: bool) -> Self {
        Self {
            require_classification: true,
            check_references,
        }
    }
}

fn is_absent(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn missing_fields(raw: &RawEntry, policy: ValidationPolicy) -> Vec<&'static str> {
    let mut checks: Vec<(&'static str, &Option<Value>)> = vec![
        ("data", &raw.data),
        ("descricao", &raw.descricao),
        ("valor", &raw.valor),
        ("id_imovel", &raw.id_imovel),
    ];
    if policy.require_classification {
        checks.push(("id_categoria", &raw.id_categoria));
        checks.push(("id_situacao", &raw.id_situacao));
    }

    checks
        .into_iter()
        .filter(|(_, value)| is_absent(value))
        .map(|(name, _)| name)
        .collect()
}

/// Parse a decimal from a JSON number or a numeric string.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Parse a decimal written the Brazilian way (`1.234,56`). Plain numbers and
/// dot-decimal strings are accepted as well.
pub fn parse_localized_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) if s.contains(',') => {
            let normalized = s.trim().replace('.', "").replace(',', ".");
            Decimal::from_str(&normalized).ok()
        }
        other => parse_decimal(other),
    }
}

/// Parse an integer id from a JSON integer or an integer string.
pub fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn id_field(
    value: &Option<Value>,
    field: &'static str,
    default: i64,
) -> Result<i64, LedgerError> {
    match value {
        None | Some(Value::Null) => Ok(default),
        Some(v) => parse_id(v).ok_or(LedgerError::InvalidNumeric {
            field,
            expected: "an integer",
        }),
    }
}

/// Validate a raw entry and turn it into a [`NewEntry`].
pub async fn validate_entry(
    raw: &RawEntry,
    policy: ValidationPolicy,
    tx: &mut dyn StoreTx,
) -> Result<NewEntry, LedgerError> {
    let missing = missing_fields(raw, policy);
    if !missing.is_empty() {
        return Err(LedgerError::MissingField(missing));
    }

    let date = match &raw.data {
        Some(Value::String(s)) => dates::normalize(s)?,
        Some(other) => return Err(LedgerError::InvalidDateFormat(other.to_string())),
        None => return Err(LedgerError::MissingField(vec!["data"])),
    };

    let amount = raw
        .valor
        .as_ref()
        .and_then(parse_decimal)
        .ok_or(LedgerError::InvalidNumeric {
            field: "valor",
            expected: "a number",
        })?;

    let property_id = id_field(&raw.id_imovel, Reference::Property.field(), 0)?;
    let category_id = id_field(
        &raw.id_categoria,
        Reference::Category.field(),
        UNCATEGORIZED_CATEGORY_ID,
    )?;
    let situation_id = id_field(
        &raw.id_situacao,
        Reference::Situation.field(),
        CONFIRMED_SITUATION_ID,
    )?;

    if policy.check_references {
        for (reference, id) in [
            (Reference::Property, property_id),
            (Reference::Category, category_id),
            (Reference::Situation, situation_id),
        ] {
            if !tx.exists(reference, id).await? {
                return Err(LedgerError::ReferenceNotFound(reference));
            }
        }
    }

    let description = match &raw.descricao {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    if description.is_empty() {
        return Err(LedgerError::EmptyDescription);
    }

    Ok(NewEntry {
        date,
        property_id,
        category_id,
        situation_id,
        description,
        amount,
    })
}
