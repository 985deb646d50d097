use std::time::Duration;

use warehouse_types::TypeError;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] TypeError),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),
}

impl LedgerError {
    /// `true` when the caller sent something the ledger refuses to apply.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
