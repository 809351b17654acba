//! Entry date normalization.
//!
//! Clients send either day-first `DD/MM/YYYY` or the canonical `YYYY-MM-DD`. Only
//! the dash form is checked for a four-digit year. Normalization is a pure string
//! transform: segments are reordered, never re-padded, and no
//! calendar check happens here (`31/02/2024` normalizes to `2024-02-31`; the
//! datastore rejects it later).

use crate::services::error::LedgerError;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;

/// Date in canonical `YYYY-MM-DD` storage form, digit widths as supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalDate(String);

impl CanonicalDate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret as a calendar date. Fails for impossible dates such as `2024-02-31`.
    pub fn to_naive_date(&self) -> Result<NaiveDate, LedgerError> {
        NaiveDate::parse_from_str(&self.0, "%Y-%m-%d").map_err(|e| {
            LedgerError::Datastore(anyhow::anyhow!(
                "date/time field value out of range: \"{}\" ({})",
                self.0,
                e
            ))
        })
    }
}

impl fmt::Display for CanonicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CanonicalDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

fn all_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Normalize a user-supplied date to `YYYY-MM-DD`.
pub fn normalize(raw: &str) -> Result<CanonicalDate, LedgerError> {
    let trimmed = raw.trim();
    let invalid = || LedgerError::InvalidDateFormat(raw.to_string());

    if trimmed.contains('/') {
        let parts: Vec<&str> = trimmed.split('/').collect();
        return match parts.as_slice() {
            [day, month, year] if parts.iter().all(|p| all_digits(p)) => {
                Ok(CanonicalDate(format!("{}-{}-{}", year, month, day)))
            }
            _ => Err(invalid()),
        };
    }

    if trimmed.contains('-') {
        let parts: Vec<&str> = trimmed.split('-').collect();
        if parts.len() == 3 && parts[0].len() == 4 && parts.iter().all(|p| all_digits(p)) {
            return Ok(CanonicalDate(trimmed.to_string()));
        }
    }

    Err(invalid())
}

/// Render a stored date the way the dashboard shows it (`DD/MM/YYYY`).
pub fn display(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
