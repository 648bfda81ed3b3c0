//! Quill mobile credential custody.
//!
//! The key-handling core of the Quill mobile client: accounts are added
//! with chain-validated signing keys, sealed under a 6-digit PIN and
//! kept in the platform secure store; a successful unlock opens a short
//! in-memory session so follow-up signing flows skip PIN re-entry.
//!
//! ## Security model
//!
//! - The PIN never persists anywhere; it exists only as a KDF input.
//! - Stored key material is ChaCha20-Poly1305 sealed under a PBKDF2
//!   stretch of the PIN with a fresh salt and nonce per envelope.
//! - Decrypt failures are uniform: a wrong PIN and corrupt data are
//!   indistinguishable to callers.
//! - Decrypted keys live in zeroizing buffers and lapse with the
//!   session window.
//!
//! Platform shells supply the [`SecretStore`] backend (Keychain on iOS,
//! EncryptedSharedPreferences on Android) and a [`KeyValidator`] wired
//! to the chain RPC layer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod clock;
mod error;
pub mod models;
pub mod registry;
pub mod session;
pub mod store;
pub mod validator;

pub use cipher::{validate_pin, Envelope, KdfParams, PinCipher, PIN_KDF_ITERATIONS, PIN_LENGTH};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{Error, Result};
pub use models::{AccountKeys, AccountSummary};
pub use registry::{AccountRegistry, MAX_ACCOUNTS};
pub use session::{Session, SessionConfig, SESSION_TIMEOUT_SECS};
pub use store::{MemoryStore, SecretStore};
pub use validator::{KeyValidator, MockValidator};
