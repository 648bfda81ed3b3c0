//! Chain-side key validation interface.
//!
//! Adding a key only succeeds when the chain's account ledger lists the
//! derived public key as an authorized signer at the requested
//! authority. The lookup is a network concern owned by the client's RPC
//! layer; the custody layer consumes it through this trait.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use quill_keys::{Authority, PublicKey};

use crate::error::{Error, Result};

/// Ledger lookup answering whether a public key may sign for an account.
#[async_trait]
pub trait KeyValidator: Send + Sync {
    /// `Ok(false)` means the ledger rejected the key.
    /// [`Error::ValidationUnavailable`] means the ledger could not be
    /// consulted and the caller may retry.
    async fn is_authorized_signer(
        &self,
        username: &str,
        public_key: &PublicKey,
        authority: Authority,
    ) -> Result<bool>;
}

/// Scripted [`KeyValidator`] for tests. Accepts everything by default.
#[derive(Debug, Default)]
pub struct MockValidator {
    reject_posting: bool,
    reject_active: bool,
    offline: bool,
    calls: AtomicU32,
}

impl MockValidator {
    /// Accept-everything validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects keys presented at the given authority.
    pub fn rejecting(mut self, authority: Authority) -> Self {
        match authority {
            Authority::Posting => self.reject_posting = true,
            Authority::Active => self.reject_active = true,
        }
        self
    }

    /// Simulates an unreachable ledger.
    pub fn unavailable(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Number of lookups performed.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValidator for MockValidator {
    async fn is_authorized_signer(
        &self,
        _username: &str,
        _public_key: &PublicKey,
        authority: Authority,
    ) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(Error::ValidationUnavailable(
                "mock ledger offline".to_string(),
            ));
        }
        Ok(match authority {
            Authority::Posting => !self.reject_posting,
            Authority::Active => !self.reject_active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_keys::PrivateKey;

    #[tokio::test]
    async fn default_mock_accepts_and_counts() {
        let validator = MockValidator::new();
        let key = PrivateKey::generate().public_key();
        assert!(validator
            .is_authorized_signer("alice", &key, Authority::Posting)
            .await
            .unwrap());
        assert!(validator
            .is_authorized_signer("alice", &key, Authority::Active)
            .await
            .unwrap());
        assert_eq!(validator.calls(), 2);
    }

    #[tokio::test]
    async fn rejection_is_per_authority() {
        let validator = MockValidator::new().rejecting(Authority::Active);
        let key = PrivateKey::generate().public_key();
        assert!(validator
            .is_authorized_signer("alice", &key, Authority::Posting)
            .await
            .unwrap());
        assert!(!validator
            .is_authorized_signer("alice", &key, Authority::Active)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn offline_mock_reports_unavailable() {
        let validator = MockValidator::new().unavailable();
        let key = PrivateKey::generate().public_key();
        let err = validator
            .is_authorized_signer("alice", &key, Authority::Posting)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationUnavailable(_)));
    }
}
