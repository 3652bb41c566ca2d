//! Page-Surface Error Types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PageError>;

/// Errors raised by an embedded page surface
#[derive(Error, Debug, Clone)]
pub enum PageError {
    /// Navigation could not start or complete
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Script evaluation inside the page context failed
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    /// The page returned something that is not a string result
    #[error("Non-text script result")]
    NonTextResult,
}
