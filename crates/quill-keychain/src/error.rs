//! Error types for the custody layer.

use thiserror::Error;

/// Errors surfaced by the custody layer.
///
/// Decrypt failures are deliberately uniform: a wrong PIN, a corrupted
/// envelope and a tampered salt all collapse into the same variant so
/// callers learn nothing about which component failed.
#[derive(Debug, Error)]
pub enum Error {
    /// PIN is not exactly six ASCII digits. Checked before any
    /// cryptographic work.
    #[error("PIN must be exactly 6 digits")]
    InvalidPinFormat,

    /// Account name failed shape validation.
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Posting key malformed or rejected by the chain ledger.
    #[error("Invalid posting key: {0}")]
    InvalidKey(String),

    /// Active key malformed or rejected by the chain ledger.
    #[error("Invalid active key: {0}")]
    InvalidActiveKey(String),

    /// The ledger could not be consulted; the caller may retry.
    #[error("Key validation unavailable: {0}")]
    ValidationUnavailable(String),

    /// No stored record for the referenced username.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Unlock failed. Wrong PIN and unreadable stored data surface
    /// identically.
    #[error("Incorrect PIN")]
    IncorrectPin,

    /// Envelope authentication failed.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// The account list is full.
    #[error("Account limit reached ({0} accounts max)")]
    AccountLimitReached(usize),

    /// Crypto machinery failure outside tag verification.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Underlying secure store failure, passed through unmodified.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Metadata (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True when the error is caused by user input and safe to show
    /// directly in the client.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidPinFormat
                | Error::InvalidUsername(_)
                | Error::InvalidKey(_)
                | Error::InvalidActiveKey(_)
                | Error::AccountNotFound(_)
                | Error::IncorrectPin
                | Error::AccountLimitReached(_)
        )
    }

    /// Message suitable for direct display in the client UI.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidPinFormat => "Your PIN must be exactly 6 digits.".to_string(),
            Error::InvalidUsername(_) => "That username is not valid.".to_string(),
            Error::InvalidKey(_) => {
                "That posting key is not valid for this account.".to_string()
            }
            Error::InvalidActiveKey(_) => {
                "That active key is not valid for this account.".to_string()
            }
            Error::ValidationUnavailable(_) => {
                "Could not reach the network to verify the key. Try again.".to_string()
            }
            Error::AccountNotFound(name) => format!("No stored account named @{name}."),
            Error::IncorrectPin => "Incorrect PIN.".to_string(),
            Error::DecryptionFailed => "Could not decrypt the stored key.".to_string(),
            Error::AccountLimitReached(max) => {
                format!("You can store up to {max} accounts.")
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Result type alias for custody operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_are_flagged() {
        assert!(Error::IncorrectPin.is_user_error());
        assert!(Error::InvalidPinFormat.is_user_error());
        assert!(Error::AccountLimitReached(10).is_user_error());
        assert!(!Error::Storage("backend gone".to_string()).is_user_error());
        assert!(!Error::ValidationUnavailable("offline".to_string()).is_user_error());
    }

    #[test]
    fn display_is_stable_for_uniform_failures() {
        assert_eq!(Error::InvalidPinFormat.to_string(), "PIN must be exactly 6 digits");
        assert_eq!(Error::IncorrectPin.to_string(), "Incorrect PIN");
        assert_eq!(Error::DecryptionFailed.to_string(), "Decryption failed");
    }

    #[test]
    fn user_messages_name_the_account() {
        let message = Error::AccountNotFound("alice".to_string()).user_message();
        assert!(message.contains("alice"));
    }
}
