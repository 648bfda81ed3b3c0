//! Multi-account registry over the platform secure store.
//!
//! Owns the persisted account list, the per-account envelope slots and
//! the current-account pointer. Key material is validated against the
//! chain ledger before anything is written, then sealed with the PIN
//! cipher. All mutations serialize through one async mutex so concurrent
//! UI calls can never interleave their read-modify-write of the list;
//! reads run lock-free and repair what they can instead of failing.

use std::sync::Arc;

use quill_keys::{username, Authority, PrivateKey};
use tokio::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::cipher::{validate_pin, Envelope, PinCipher};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{AccountEntry, AccountKeys, AccountList, AccountSummary, ACCOUNT_LIST_VERSION};
use crate::store::SecretStore;
use crate::validator::KeyValidator;

/// Maximum number of stored accounts.
pub const MAX_ACCOUNTS: usize = 10;

/// Storage slot of the account list blob.
pub const ACCOUNT_LIST_KEY: &str = "account_list";
/// Storage slot of the current-account pointer.
pub const CURRENT_ACCOUNT_KEY: &str = "current_account";

/// Storage slot of an account's sealed posting key.
pub fn posting_key_slot(username: &str) -> String {
    format!("account:{username}:posting_key")
}

/// Storage slot of an account's sealed active key.
pub fn active_key_slot(username: &str) -> String {
    format!("account:{username}:active_key")
}

/// Unwraps the bare reason from a key-crate error so custody variants
/// can carry it without stacking prefixes.
fn shape_reason(e: quill_keys::Error) -> String {
    match e {
        quill_keys::Error::InvalidKey(reason) | quill_keys::Error::InvalidUsername(reason) => {
            reason
        }
    }
}

/// Account custody registry.
pub struct AccountRegistry {
    store: Arc<dyn SecretStore>,
    validator: Arc<dyn KeyValidator>,
    cipher: PinCipher,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl AccountRegistry {
    /// Registry with production cipher parameters.
    pub fn new(
        store: Arc<dyn SecretStore>,
        validator: Arc<dyn KeyValidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_cipher(store, validator, clock, PinCipher::new())
    }

    /// Registry with a caller-supplied cipher. Tests pass lighter KDF
    /// parameters.
    pub fn with_cipher(
        store: Arc<dyn SecretStore>,
        validator: Arc<dyn KeyValidator>,
        clock: Arc<dyn Clock>,
        cipher: PinCipher,
    ) -> Self {
        Self {
            store,
            validator,
            cipher,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Registers or updates an account.
    ///
    /// Validation happens before any write: username shape, PIN format,
    /// key parsing and the ledger check must all pass or storage is
    /// left untouched. Re-adding an existing username overwrites it,
    /// and `active_key: None` on an update deletes any stored active
    /// envelope.
    pub async fn add_account(
        &self,
        raw_username: &str,
        posting_key: &str,
        pin: &str,
        active_key: Option<&str>,
    ) -> Result<()> {
        let name = username::normalized(raw_username)
            .map_err(|e| Error::InvalidUsername(shape_reason(e)))?;
        validate_pin(pin)?;

        let posting = PrivateKey::from_wif(posting_key)
            .map_err(|e| Error::InvalidKey(shape_reason(e)))?;
        self.check_authority(&name, &posting, Authority::Posting)
            .await?;
        if let Some(wif) = active_key {
            let active = PrivateKey::from_wif(wif)
                .map_err(|e| Error::InvalidActiveKey(shape_reason(e)))?;
            self.check_authority(&name, &active, Authority::Active)
                .await?;
        }

        let _guard = self.write_lock.lock().await;

        let mut list = self.load_list().await?;
        let existing = list.accounts.iter().position(|a| a.username == name);
        if existing.is_none() && list.accounts.len() >= MAX_ACCOUNTS {
            return Err(Error::AccountLimitReached(MAX_ACCOUNTS));
        }

        let posting_env = self.cipher.encrypt(posting_key, pin).await?;
        self.put_envelope(&posting_key_slot(&name), &posting_env)
            .await?;

        match active_key {
            Some(wif) => {
                let active_env = self.cipher.encrypt(wif, pin).await?;
                self.put_envelope(&active_key_slot(&name), &active_env)
                    .await?;
            }
            None => {
                // explicit absence removes any previously stored active key
                self.store.delete(&active_key_slot(&name)).await?;
            }
        }

        let entry = AccountEntry {
            username: name.clone(),
            has_active_key: active_key.is_some(),
            last_used_at: self.clock.now_ts(),
        };
        match existing {
            Some(i) => list.accounts[i] = entry,
            None => list.accounts.push(entry),
        }
        self.save_list(&list).await?;

        info!(username = %name, updated = existing.is_some(), "account stored");
        Ok(())
    }

    /// Accounts for the switcher UI, most recently used first.
    ///
    /// Never fails on corrupt data: entries with malformed usernames or
    /// a missing posting envelope are dropped from the view, and the
    /// active-key flag is recomputed from what storage actually holds.
    /// Only storage-layer failures propagate.
    pub async fn get_accounts(&self) -> Result<Vec<AccountSummary>> {
        let list = self.load_list().await?;
        let mut out = Vec::with_capacity(list.accounts.len());
        for entry in &list.accounts {
            if username::validate(&entry.username).is_err() {
                warn!(username = %entry.username, "dropping entry with malformed username");
                continue;
            }
            if self
                .store
                .get(&posting_key_slot(&entry.username))
                .await?
                .is_none()
            {
                warn!(username = %entry.username, "dropping entry with no posting envelope");
                continue;
            }
            let has_active = self
                .store
                .get(&active_key_slot(&entry.username))
                .await?
                .is_some();
            out.push(AccountSummary {
                username: entry.username.clone(),
                has_active_key: has_active,
                last_used_at: entry.last_used_at,
            });
        }
        out.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(out)
    }

    /// Single-account lookup over the same repaired view as
    /// [`AccountRegistry::get_accounts`].
    pub async fn get_account(&self, raw_username: &str) -> Result<Option<AccountSummary>> {
        let name = username::normalize(raw_username);
        Ok(self
            .get_accounts()
            .await?
            .into_iter()
            .find(|a| a.username == name))
    }

    /// Decrypts an account's keys without touching its last-used stamp.
    ///
    /// `None` when no such account is stored. Any decrypt failure
    /// surfaces as [`Error::IncorrectPin`].
    pub async fn get_account_keys(
        &self,
        raw_username: &str,
        pin: &str,
    ) -> Result<Option<AccountKeys>> {
        validate_pin(pin)?;
        let name = username::normalize(raw_username);
        match self.decrypt_keys(&name, pin).await {
            Ok(keys) => Ok(Some(keys)),
            Err(Error::AccountNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Verifies the PIN by decrypting the account's envelopes, bumps the
    /// last-used stamp and returns the plaintext keys.
    pub async fn unlock(&self, raw_username: &str, pin: &str) -> Result<AccountKeys> {
        validate_pin(pin)?;
        let name = username::normalize(raw_username);
        let keys = match self.decrypt_keys(&name, pin).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(username = %name, error = %e, "unlock failed");
                return Err(e);
            }
        };
        self.bump_last_used(&name).await?;
        info!(username = %name, "account unlocked");
        Ok(keys)
    }

    /// Adds or replaces an account's active key.
    ///
    /// The ledger check and a PIN proof against the stored posting
    /// envelope both pass before anything is written, so a typo'd PIN
    /// can never leave the two envelopes sealed under different PINs.
    pub async fn add_active_key(
        &self,
        raw_username: &str,
        active_key: &str,
        pin: &str,
    ) -> Result<()> {
        let name = username::normalize(raw_username);
        validate_pin(pin)?;

        let key = PrivateKey::from_wif(active_key)
            .map_err(|e| Error::InvalidActiveKey(shape_reason(e)))?;
        self.check_authority(&name, &key, Authority::Active).await?;

        let _guard = self.write_lock.lock().await;
        let mut list = self.load_list().await?;
        let Some(pos) = list.accounts.iter().position(|a| a.username == name) else {
            return Err(Error::AccountNotFound(name));
        };

        let Some(raw) = self.store.get(&posting_key_slot(&name)).await? else {
            return Err(Error::AccountNotFound(name));
        };
        self.open_envelope(&raw, pin).await?;

        let envelope = self.cipher.encrypt(active_key, pin).await?;
        self.put_envelope(&active_key_slot(&name), &envelope).await?;
        list.accounts[pos].has_active_key = true;
        self.save_list(&list).await?;

        info!(username = %name, "active key added");
        Ok(())
    }

    /// Removes an account's active key and capability flag.
    pub async fn remove_active_key(&self, raw_username: &str) -> Result<()> {
        let name = username::normalize(raw_username);
        let _guard = self.write_lock.lock().await;
        let mut list = self.load_list().await?;
        let Some(pos) = list.accounts.iter().position(|a| a.username == name) else {
            return Err(Error::AccountNotFound(name));
        };

        self.store.delete(&active_key_slot(&name)).await?;
        list.accounts[pos].has_active_key = false;
        self.save_list(&list).await?;

        info!(username = %name, "active key removed");
        Ok(())
    }

    /// Deletes an account's envelopes and list entry, and clears the
    /// current-account pointer when it referenced the removed account.
    pub async fn remove_account(&self, raw_username: &str) -> Result<()> {
        let name = username::normalize(raw_username);
        let _guard = self.write_lock.lock().await;
        let mut list = self.load_list().await?;
        let Some(pos) = list.accounts.iter().position(|a| a.username == name) else {
            return Err(Error::AccountNotFound(name));
        };
        list.accounts.remove(pos);

        self.store.delete(&posting_key_slot(&name)).await?;
        self.store.delete(&active_key_slot(&name)).await?;
        self.save_list(&list).await?;

        if self.read_current().await?.as_deref() == Some(name.as_str()) {
            self.store.delete(CURRENT_ACCOUNT_KEY).await?;
        }

        info!(username = %name, "account removed");
        Ok(())
    }

    /// Marks `username` as the account the UI should foreground.
    pub async fn set_current(&self, raw_username: &str) -> Result<()> {
        let name = username::normalize(raw_username);
        let _guard = self.write_lock.lock().await;
        let list = self.load_list().await?;
        if !list.accounts.iter().any(|a| a.username == name) {
            return Err(Error::AccountNotFound(name));
        }
        self.store.set(CURRENT_ACCOUNT_KEY, name.as_bytes()).await
    }

    /// Currently foregrounded account. `None` when unset or when the
    /// pointed-at account no longer exists.
    pub async fn current(&self) -> Result<Option<String>> {
        let Some(name) = self.read_current().await? else {
            return Ok(None);
        };
        let list = self.load_list().await?;
        Ok(list
            .accounts
            .iter()
            .any(|a| a.username == name)
            .then_some(name))
    }

    /// Clears the foregrounded-account pointer.
    pub async fn clear_current(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(CURRENT_ACCOUNT_KEY).await
    }

    /// Re-seals every stored envelope under a new PIN.
    ///
    /// Every envelope is decrypted with the old PIN first; only when all
    /// of them open does any write happen. Unreadable envelope blobs are
    /// left in place (they cannot be opened under either PIN) and
    /// logged.
    pub async fn change_pin(&self, old_pin: &str, new_pin: &str) -> Result<()> {
        validate_pin(old_pin)?;
        validate_pin(new_pin)?;

        let _guard = self.write_lock.lock().await;
        let list = self.load_list().await?;

        let mut reseals: Vec<(String, Zeroizing<String>)> = Vec::new();
        for entry in &list.accounts {
            for slot in [
                posting_key_slot(&entry.username),
                active_key_slot(&entry.username),
            ] {
                let Some(raw) = self.store.get(&slot).await? else {
                    continue;
                };
                let envelope: Envelope = match serde_json::from_slice(&raw) {
                    Ok(env) => env,
                    Err(_) => {
                        warn!(slot = %slot, "skipping unreadable envelope during PIN change");
                        continue;
                    }
                };
                let plaintext = self.cipher.decrypt(&envelope, old_pin).await.map_err(|e| {
                    match e {
                        Error::DecryptionFailed => Error::IncorrectPin,
                        other => other,
                    }
                })?;
                reseals.push((slot, plaintext));
            }
        }

        for (slot, plaintext) in &reseals {
            let envelope = self.cipher.encrypt(plaintext.as_str(), new_pin).await?;
            self.put_envelope(slot, &envelope).await?;
        }

        info!(envelopes = reseals.len(), "PIN changed");
        Ok(())
    }

    async fn check_authority(
        &self,
        name: &str,
        key: &PrivateKey,
        authority: Authority,
    ) -> Result<()> {
        let authorized = self
            .validator
            .is_authorized_signer(name, &key.public_key(), authority)
            .await?;
        if authorized {
            return Ok(());
        }
        let reason = format!("key is not an authorized {authority} signer");
        Err(match authority {
            Authority::Posting => Error::InvalidKey(reason),
            Authority::Active => Error::InvalidActiveKey(reason),
        })
    }

    /// Reads both envelopes for `name` and opens them with `pin`.
    async fn decrypt_keys(&self, name: &str, pin: &str) -> Result<AccountKeys> {
        let Some(raw) = self.store.get(&posting_key_slot(name)).await? else {
            return Err(Error::AccountNotFound(name.to_owned()));
        };
        let posting = self.open_envelope(&raw, pin).await?;

        let active = match self.store.get(&active_key_slot(name)).await? {
            Some(raw) => Some(self.open_envelope(&raw, pin).await?),
            None => None,
        };

        Ok(AccountKeys {
            posting_key: posting,
            active_key: active,
        })
    }

    /// Parses and decrypts one stored envelope. Corrupt blobs and failed
    /// tags are indistinguishable from a wrong PIN.
    async fn open_envelope(&self, raw: &[u8], pin: &str) -> Result<Zeroizing<String>> {
        let envelope: Envelope =
            serde_json::from_slice(raw).map_err(|_| Error::IncorrectPin)?;
        self.cipher.decrypt(&envelope, pin).await.map_err(|e| match e {
            Error::DecryptionFailed => Error::IncorrectPin,
            other => other,
        })
    }

    /// Serialized last-used bump. Skips silently when the entry vanished
    /// between decrypt and bump.
    async fn bump_last_used(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut list = self.load_list().await?;
        if let Some(entry) = list.accounts.iter_mut().find(|a| a.username == name) {
            entry.last_used_at = self.clock.now_ts();
            self.save_list(&list).await?;
        }
        Ok(())
    }

    async fn load_list(&self) -> Result<AccountList> {
        let Some(raw) = self.store.get(ACCOUNT_LIST_KEY).await? else {
            return Ok(AccountList::empty());
        };
        Ok(parse_list(&raw))
    }

    async fn save_list(&self, list: &AccountList) -> Result<()> {
        let raw = serde_json::to_vec(list)?;
        self.store.set(ACCOUNT_LIST_KEY, &raw).await
    }

    async fn put_envelope(&self, slot: &str, envelope: &Envelope) -> Result<()> {
        let raw = serde_json::to_vec(envelope)?;
        self.store.set(slot, &raw).await
    }

    async fn read_current(&self) -> Result<Option<String>> {
        let Some(raw) = self.store.get(CURRENT_ACCOUNT_KEY).await? else {
            return Ok(None);
        };
        match String::from_utf8(raw) {
            Ok(name) => Ok(Some(name)),
            Err(_) => {
                warn!("current account pointer unreadable, ignoring");
                Ok(None)
            }
        }
    }
}

/// Parses the persisted list blob leniently: the current versioned
/// shape first, then the legacy bare-array shape, then gives up with an
/// empty list rather than an error.
fn parse_list(raw: &[u8]) -> AccountList {
    if let Ok(list) = serde_json::from_slice::<AccountList>(raw) {
        return list;
    }
    if let Ok(accounts) = serde_json::from_slice::<Vec<AccountEntry>>(raw) {
        info!(count = accounts.len(), "lifted legacy account list blob");
        return AccountList {
            version: ACCOUNT_LIST_VERSION,
            accounts,
        };
    }
    warn!("account list blob unreadable, treating as empty");
    AccountList::empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_slots_are_stable() {
        assert_eq!(ACCOUNT_LIST_KEY, "account_list");
        assert_eq!(CURRENT_ACCOUNT_KEY, "current_account");
        assert_eq!(posting_key_slot("alice"), "account:alice:posting_key");
        assert_eq!(active_key_slot("alice"), "account:alice:active_key");
    }

    #[test]
    fn parse_list_reads_current_shape() {
        let raw = br#"{"version":1,"accounts":[{"username":"alice","has_active_key":true,"last_used_at":7}]}"#;
        let list = parse_list(raw);
        assert_eq!(list.version, 1);
        assert_eq!(list.accounts.len(), 1);
        assert!(list.accounts[0].has_active_key);
    }

    #[test]
    fn parse_list_lifts_legacy_bare_array() {
        let raw = br#"[{"username":"alice","last_used_at":7}]"#;
        let list = parse_list(raw);
        assert_eq!(list.version, ACCOUNT_LIST_VERSION);
        assert_eq!(list.accounts.len(), 1);
        assert_eq!(list.accounts[0].username, "alice");
        assert!(!list.accounts[0].has_active_key);
    }

    #[test]
    fn parse_list_swallows_garbage() {
        let list = parse_list(b"definitely not json");
        assert_eq!(list.version, ACCOUNT_LIST_VERSION);
        assert!(list.accounts.is_empty());
    }
}
