//! In-memory unlock session.
//!
//! A successful unlock parks the decrypted keys here so follow-up
//! actions inside the timeout window skip PIN re-entry. Nothing is
//! persisted and no timer runs in the background: expiry is evaluated
//! lazily on access and an expired record is dropped at that moment.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::models::AccountKeys;

/// Default session lifetime in seconds.
pub const SESSION_TIMEOUT_SECS: i64 = 300;

/// Session tunables.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Seconds an unlock stays usable.
    pub timeout_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: SESSION_TIMEOUT_SECS,
        }
    }
}

struct UnlockRecord {
    username: String,
    posting_key: Zeroizing<String>,
    active_key: Option<Zeroizing<String>>,
    unlocked_at: i64,
}

/// Holder of at most one unlocked account's plaintext keys.
pub struct Session {
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    record: RwLock<Option<UnlockRecord>>,
}

impl Session {
    /// Session with the default five-minute window.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, SessionConfig::default())
    }

    /// Session with caller-chosen tunables.
    pub fn with_config(clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        Self {
            clock,
            config,
            record: RwLock::new(None),
        }
    }

    /// Stores freshly decrypted keys, replacing any previous session
    /// unconditionally.
    pub fn record_unlock(&self, username: &str, keys: AccountKeys) {
        let now = self.clock.now_ts();
        let mut record = self.record.write();
        *record = Some(UnlockRecord {
            username: username.to_owned(),
            posting_key: keys.posting_key,
            active_key: keys.active_key,
            unlocked_at: now,
        });
        debug!(username, "session opened");
    }

    /// True while the unlock window is open. An expired record is
    /// dropped by this check.
    pub fn is_valid(&self) -> bool {
        self.read_valid(|_| ()).is_some()
    }

    /// Username of the unlocked account.
    pub fn username(&self) -> Option<String> {
        self.read_valid(|r| r.username.clone())
    }

    /// Decrypted posting key.
    pub fn posting_key(&self) -> Option<Zeroizing<String>> {
        self.read_valid(|r| r.posting_key.clone())
    }

    /// Decrypted active key, when the unlocked account stored one.
    pub fn active_key(&self) -> Option<Zeroizing<String>> {
        self.read_valid(|r| r.active_key.clone()).flatten()
    }

    /// Whether the unlocked account carries an active key.
    pub fn has_active_key(&self) -> bool {
        self.read_valid(|r| r.active_key.is_some()).unwrap_or(false)
    }

    /// Re-stamps the window start for a still-valid session and returns
    /// true. Plain reads never extend the window; extension happens
    /// through this explicit call only.
    pub fn refresh(&self) -> bool {
        let now = self.clock.now_ts();
        let mut record = self.record.write();
        match record.as_mut() {
            Some(r) if now - r.unlocked_at < self.config.timeout_secs => {
                r.unlocked_at = now;
                true
            }
            Some(_) => {
                *record = None;
                debug!("session expired, dropped");
                false
            }
            None => false,
        }
    }

    /// Drops the session immediately.
    pub fn clear(&self) {
        let mut record = self.record.write();
        if record.take().is_some() {
            debug!("session cleared");
        }
    }

    fn read_valid<T>(&self, f: impl FnOnce(&UnlockRecord) -> T) -> Option<T> {
        let now = self.clock.now_ts();
        let mut record = self.record.write();
        match record.as_ref() {
            Some(r) if now - r.unlocked_at < self.config.timeout_secs => Some(f(r)),
            Some(_) => {
                *record = None;
                debug!("session expired, dropped");
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn keys(active: bool) -> AccountKeys {
        AccountKeys {
            posting_key: Zeroizing::new("5Jposting".to_string()),
            active_key: active.then(|| Zeroizing::new("5Jactive".to_string())),
        }
    }

    fn session() -> (Arc<MockClock>, Session) {
        let clock = Arc::new(MockClock::new(1_000));
        let session = Session::new(clock.clone());
        (clock, session)
    }

    #[test]
    fn fresh_session_is_empty() {
        let (_, session) = session();
        assert!(!session.is_valid());
        assert!(session.username().is_none());
        assert!(session.posting_key().is_none());
        assert!(session.active_key().is_none());
        assert!(!session.has_active_key());
    }

    #[test]
    fn unlock_exposes_keys_within_window() {
        let (clock, session) = session();
        session.record_unlock("alice", keys(true));

        assert!(session.is_valid());
        assert_eq!(session.username().unwrap(), "alice");
        assert_eq!(session.posting_key().unwrap().as_str(), "5Jposting");
        assert_eq!(session.active_key().unwrap().as_str(), "5Jactive");
        assert!(session.has_active_key());

        clock.advance(SESSION_TIMEOUT_SECS - 1);
        assert!(session.is_valid());
    }

    #[test]
    fn session_expires_at_exact_boundary() {
        let (clock, session) = session();
        session.record_unlock("alice", keys(false));
        clock.advance(SESSION_TIMEOUT_SECS);
        assert!(!session.is_valid());
    }

    #[test]
    fn expired_getter_clears_the_record() {
        let (clock, session) = session();
        session.record_unlock("alice", keys(true));
        clock.advance(SESSION_TIMEOUT_SECS + 1);

        assert!(session.posting_key().is_none());

        // even after winding time back the record stays gone
        clock.set(1_000);
        assert!(!session.is_valid());
        assert!(session.username().is_none());
    }

    #[test]
    fn second_unlock_replaces_the_first() {
        let (clock, session) = session();
        session.record_unlock("alice", keys(true));
        clock.advance(10);
        session.record_unlock("bob", keys(false));

        assert_eq!(session.username().unwrap(), "bob");
        assert!(!session.has_active_key());
        assert!(session.active_key().is_none());
    }

    #[test]
    fn reads_do_not_slide_the_window() {
        let (clock, session) = session();
        session.record_unlock("alice", keys(false));
        clock.advance(SESSION_TIMEOUT_SECS - 1);
        assert!(session.is_valid());
        clock.advance(1);
        assert!(!session.is_valid());
    }

    #[test]
    fn refresh_extends_a_live_session_only() {
        let (clock, session) = session();
        session.record_unlock("alice", keys(false));

        clock.advance(SESSION_TIMEOUT_SECS - 1);
        assert!(session.refresh());
        clock.advance(SESSION_TIMEOUT_SECS - 1);
        assert!(session.is_valid());

        clock.advance(1);
        assert!(!session.refresh());
        assert!(!session.is_valid());
    }

    #[test]
    fn clear_logs_out_immediately() {
        let (_, session) = session();
        session.record_unlock("alice", keys(true));
        session.clear();
        assert!(!session.is_valid());
        assert!(session.posting_key().is_none());
    }

    #[test]
    fn custom_timeout_is_honored() {
        let clock = Arc::new(MockClock::new(0));
        let session = Session::with_config(clock.clone(), SessionConfig { timeout_secs: 10 });
        session.record_unlock("alice", keys(false));
        clock.advance(9);
        assert!(session.is_valid());
        clock.advance(1);
        assert!(!session.is_valid());
    }
}
