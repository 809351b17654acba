use crate::models::Reference;
use service_core::error::AppError;
use thiserror::Error;

/// Failures of the ledger write pipeline and its datastore.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid date format: {0} (use DD/MM/YYYY or YYYY-MM-DD)")]
    InvalidDateFormat(String),

    #[error("Missing fields: {}", .0.join(", "))]
    MissingField(Vec<&'static str>),

    #[error("Field '{field}' must be {expected}")]
    InvalidNumeric {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Referenced {0} does not exist")]
    ReferenceNotFound(Reference),

    #[error("Description is required")]
    EmptyDescription,

    #[error("Idempotency-Key header is required")]
    MissingIdempotencyKey,

    #[error("Duplicate request")]
    Duplicate,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Datastore error: {0}")]
    Datastore(anyhow::Error),
}

impl LedgerError {
    /// Validation failures are the caller's fault; everything else is ours.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidDateFormat(_)
                | LedgerError::MissingField(_)
                | LedgerError::InvalidNumeric { .. }
                | LedgerError::ReferenceNotFound(_)
                | LedgerError::EmptyDescription
                | LedgerError::MissingIdempotencyKey
                | LedgerError::InvalidPayload(_)
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidDateFormat(_) => "invalid_date_format",
            LedgerError::MissingField(_) => "missing_field",
            LedgerError::InvalidNumeric { .. } => "invalid_numeric",
            LedgerError::ReferenceNotFound(_) => "reference_not_found",
            LedgerError::EmptyDescription => "empty_description",
            LedgerError::MissingIdempotencyKey => "missing_idempotency_key",
            LedgerError::Duplicate => "duplicate",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::InvalidPayload(_) => "invalid_payload",
            LedgerError::Datastore(_) => "datastore",
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Datastore(anyhow::Error::new(err))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidDateFormat(raw) => AppError::InvalidInput {
                message: "Invalid date. Use DD/MM/YYYY or YYYY-MM-DD".to_string(),
                details: format!("Invalid date format: {}", raw),
            },
            LedgerError::Duplicate => AppError::Conflict(anyhow::anyhow!("Duplicate request")),
            LedgerError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            LedgerError::Datastore(e) => AppError::DatabaseError(e),
            other => AppError::BadRequest(anyhow::anyhow!(other.to_string())),
        }
    }
}
