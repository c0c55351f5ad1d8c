use thiserror::Error;

use stockroom_core::DomainError;

/// Storage failure.
///
/// These are infrastructure errors (connectivity, constraint violations,
/// undecodable rows) as opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("stored data is invalid: {0}")]
    Corrupt(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Error from a ledger or catalog operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("export failed: {0}")]
    Export(String),
}

impl LedgerError {
    pub fn not_found(what: &'static str) -> Self {
        LedgerError::Domain(DomainError::not_found(what))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
