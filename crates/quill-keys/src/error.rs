//! Error types for key and identity parsing.

use thiserror::Error;

/// Errors produced when parsing or validating chain identities and keys.
#[derive(Debug, Error)]
pub enum Error {
    /// Key material failed to parse or verify.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Account name failed the chain's shape rules.
    #[error("Invalid username: {0}")]
    InvalidUsername(String),
}

/// Result type alias for key operations.
pub type Result<T> = std::result::Result<T, Error>;
