/// Error types for asset stat ingestion
use crate::delta::Category;
use crate::ledger::LedgerEntryType;
use crate::models::AssetKey;
use thiserror::Error;

/// Main error type for the ingestion engine
#[derive(Error, Debug)]
pub enum IngestError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A persisted or accumulated balance is not a valid decimal integer
    #[error("Error parsing balance: {0:?}")]
    InvalidBalance(String),

    /// Asset could not be turned into an asset identity
    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    /// The compactor received changes that cannot follow each other
    #[error("Invalid change sequence for {key}: {reason}")]
    InvalidChangeSequence { key: String, reason: String },

    /// Bulk mode only accepts newly created entries
    #[error("AssetStatsProcessor is in insert only mode")]
    InsertOnlyViolation,

    /// The processor hit a state error and must be re-initialized
    #[error("AssetStatsProcessor halted after a state error; reinitialize before reuse")]
    ProcessorHalted,

    /// Persisted index diverged from ledger state
    #[error(transparent)]
    State(#[from] StateError),
}

impl IngestError {
    /// Whether this error signals a divergence between ledger and index
    pub fn is_state_error(&self) -> bool {
        matches!(self, IngestError::State(_))
    }
}

/// Fatal inconsistencies. These are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("{category} accounts negative but DB entry does not exist for asset: {asset}")]
    NegativeAccounts { asset: AssetKey, category: Category },

    #[error("Removing asset stat by final amount non-zero for: {asset}")]
    NonZeroBalance { asset: AssetKey },

    #[error("{rows} rows affected when {operation} asset stat for asset: {asset}")]
    RowsAffected {
        rows: u64,
        operation: StoreOperation,
        asset: AssetKey,
    },

    #[error("Change type {0} is unexpected")]
    UnexpectedEntryType(LedgerEntryType),

    #[error("Change declared as {expected} carries a {actual} entry")]
    EntryTypeMismatch {
        expected: LedgerEntryType,
        actual: LedgerEntryType,
    },

    #[error("Invalid change: both pre and post entries are missing")]
    EmptyChange,
}

/// Row mutation kinds checked for exactly one affected row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Insert,
    Update,
    Remove,
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreOperation::Insert => write!(f, "inserting"),
            StoreOperation::Update => write!(f, "updating"),
            StoreOperation::Remove => write!(f, "removing"),
        }
    }
}

/// Result type alias for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetType;

    fn usd() -> AssetKey {
        AssetKey::new(AssetType::CreditAlphanum4, "USD", "GISSUER")
    }

    #[test]
    fn test_state_error_classification() {
        let err: IngestError = StateError::NonZeroBalance { asset: usd() }.into();
        assert!(err.is_state_error());
        assert!(!IngestError::InvalidBalance("x".to_string()).is_state_error());
        assert!(!IngestError::ProcessorHalted.is_state_error());
    }

    #[test]
    fn test_state_error_display() {
        let err = StateError::RowsAffected {
            rows: 0,
            operation: StoreOperation::Update,
            asset: usd(),
        };
        assert_eq!(
            err.to_string(),
            "0 rows affected when updating asset stat for asset: credit_alphanum4/USD/GISSUER"
        );

        let err = StateError::NegativeAccounts {
            asset: usd(),
            category: Category::AuthorizedToMaintainLiabilities,
        };
        assert!(err.to_string().starts_with("AuthorizedToMaintainLiabilities accounts negative"));
    }

    #[test]
    fn test_transparent_state_error() {
        let err: IngestError = StateError::EmptyChange.into();
        assert_eq!(
            err.to_string(),
            "Invalid change: both pre and post entries are missing"
        );
    }
}
