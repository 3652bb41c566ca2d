//! Ledger Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger-related errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Underlying key-value store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Persisted data could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Audit invariant broken: the persisted total does not match the sum of
    /// persisted receipts. Cannot occur under correct use of `commit`, so a
    /// detection is a fatal programming-contract violation.
    #[error("Ledger invariant violated: total {total} != receipt sum {sum}")]
    InvariantViolation { total: u64, sum: u64 },
}
