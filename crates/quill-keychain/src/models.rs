//! Data models for stored accounts and unlocked key material.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Account list blob format version written by this build.
pub const ACCOUNT_LIST_VERSION: u32 = 1;

/// One account as surfaced to the switcher UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Normalized account name.
    pub username: String,
    /// Whether an active-key envelope is actually present in storage.
    pub has_active_key: bool,
    /// Unix seconds of the last add or unlock. Ordering only, not
    /// security relevant.
    pub last_used_at: i64,
}

/// Decrypted signing keys for one account. Never persisted; the buffers
/// zeroize on drop.
pub struct AccountKeys {
    /// Posting key in WIF form. Always present.
    pub posting_key: Zeroizing<String>,
    /// Active key in WIF form, when the account stored one.
    pub active_key: Option<Zeroizing<String>>,
}

impl fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKeys")
            .field("posting_key", &"<redacted>")
            .field("active_key", &self.active_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Persisted entry in the account list blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Normalized account name, the unique key.
    pub username: String,
    /// Capability flag as recorded at write time. Listings recompute it
    /// from actual envelope presence.
    #[serde(default)]
    pub has_active_key: bool,
    /// Unix seconds of the last add or unlock.
    #[serde(default)]
    pub last_used_at: i64,
}

/// Versioned account list blob as persisted in the secure store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountList {
    /// Blob format version, see [`ACCOUNT_LIST_VERSION`].
    pub version: u32,
    /// Stored entries, unordered.
    pub accounts: Vec<AccountEntry>,
}

impl AccountList {
    /// Empty list at the current format version.
    pub fn empty() -> Self {
        Self {
            version: ACCOUNT_LIST_VERSION,
            accounts: Vec::new(),
        }
    }
}
