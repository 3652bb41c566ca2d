//! Flow Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, FlowError>;

/// Flow-related errors
#[derive(Error, Debug)]
pub enum FlowError {
    /// The remote script endpoint returned something unusable
    #[error("Script fetch failed: {0}")]
    ScriptFetch(String),

    /// Transport-level failure talking to the script endpoint
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The page surface failed underneath the flow
    #[error("Page error: {0}")]
    Page(#[from] donate_core::PageError),

    /// Receipt persistence failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] donate_ledger::LedgerError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
