//! PIN-based envelope encryption for stored signing keys.
//!
//! A 6-digit PIN is stretched through PBKDF2-HMAC-SHA256 into a 256-bit
//! key which seals the plaintext with ChaCha20-Poly1305. Every call
//! draws a fresh salt and nonce from the OS RNG, so equal inputs never
//! produce equal envelopes. The PIN is the only unlock factor; an
//! envelope alone is useless without it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Required PIN length in digits.
pub const PIN_LENGTH: usize = 6;
/// PBKDF2-HMAC-SHA256 iteration count used in production.
pub const PIN_KDF_ITERATIONS: u32 = 100_000;
/// Salt length in bytes (128-bit).
pub const SALT_LEN: usize = 16;
/// ChaCha20-Poly1305 nonce length in bytes (96-bit).
pub const NONCE_LEN: usize = 12;

const KEY_LEN: usize = 32;

/// Checks PIN shape before any cryptographic work: exactly six ASCII
/// digits, nothing else.
pub fn validate_pin(pin: &str) -> Result<()> {
    if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidPinFormat);
    }
    Ok(())
}

/// Key-stretching parameters. Production uses [`Default`]; tests lower
/// the iteration count to keep suites fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2-HMAC-SHA256 iteration count.
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: PIN_KDF_ITERATIONS,
        }
    }
}

/// Sealed secret as persisted in the platform store.
///
/// All fields are independently base64-encoded. Salt and nonce are
/// generated fresh per encryption and carried alongside the ciphertext;
/// none of the three is secret on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// AEAD output with the authentication tag appended.
    pub ciphertext: String,
    /// PBKDF2 salt.
    pub salt: String,
    /// ChaCha20-Poly1305 nonce.
    pub nonce: String,
}

/// PIN-keyed AEAD cipher.
#[derive(Debug, Clone)]
pub struct PinCipher {
    params: KdfParams,
}

impl Default for PinCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl PinCipher {
    /// Cipher with production key-stretching parameters.
    pub fn new() -> Self {
        Self {
            params: KdfParams::default(),
        }
    }

    /// Cipher with caller-chosen parameters.
    pub fn with_params(params: KdfParams) -> Self {
        Self { params }
    }

    /// Seals `plaintext` under `pin`.
    ///
    /// The stretch runs on the blocking pool so the runtime stays
    /// responsive while the KDF grinds.
    pub async fn encrypt(&self, plaintext: &str, pin: &str) -> Result<Envelope> {
        validate_pin(pin)?;
        let plaintext = Zeroizing::new(plaintext.to_owned());
        let pin = Zeroizing::new(pin.to_owned());
        let iterations = self.params.iterations;
        tokio::task::spawn_blocking(move || {
            let mut salt = [0u8; SALT_LEN];
            let mut nonce = [0u8; NONCE_LEN];
            OsRng.fill_bytes(&mut salt);
            OsRng.fill_bytes(&mut nonce);

            let key = derive_key(&pin, &salt, iterations);
            let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
            let ciphertext = cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
                .map_err(|_| Error::Encryption("AEAD sealing failed".to_string()))?;

            Ok(Envelope {
                ciphertext: BASE64.encode(ciphertext),
                salt: BASE64.encode(salt),
                nonce: BASE64.encode(nonce),
            })
        })
        .await
        .map_err(|e| Error::Encryption(format!("encryption task failed: {e}")))?
    }

    /// Opens `envelope` with `pin`.
    ///
    /// After the PIN format gate every failure collapses into
    /// [`Error::DecryptionFailed`]: wrong PIN, tampered fields and
    /// corrupt ciphertext are indistinguishable to the caller.
    pub async fn decrypt(&self, envelope: &Envelope, pin: &str) -> Result<Zeroizing<String>> {
        validate_pin(pin)?;
        let pin = Zeroizing::new(pin.to_owned());
        let envelope = envelope.clone();
        let iterations = self.params.iterations;
        tokio::task::spawn_blocking(move || {
            let salt = BASE64
                .decode(&envelope.salt)
                .map_err(|_| Error::DecryptionFailed)?;
            let nonce = BASE64
                .decode(&envelope.nonce)
                .map_err(|_| Error::DecryptionFailed)?;
            let ciphertext = BASE64
                .decode(&envelope.ciphertext)
                .map_err(|_| Error::DecryptionFailed)?;
            if salt.len() != SALT_LEN || nonce.len() != NONCE_LEN {
                return Err(Error::DecryptionFailed);
            }

            let key = derive_key(&pin, &salt, iterations);
            let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
            let plaintext = cipher
                .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
                .map_err(|_| Error::DecryptionFailed)?;
            String::from_utf8(plaintext)
                .map(Zeroizing::new)
                .map_err(|_| Error::DecryptionFailed)
        })
        .await
        .map_err(|e| Error::Encryption(format!("decryption task failed: {e}")))?
    }
}

/// Stretches `pin` and `salt` into a 256-bit AEAD key.
fn derive_key(pin: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, iterations, key.as_mut_slice());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> PinCipher {
        PinCipher::with_params(KdfParams { iterations: 1_000 })
    }

    #[tokio::test]
    async fn round_trips_plain_text() {
        let cipher = light();
        let envelope = cipher.encrypt("5Jtestpostingkey...", "123456").await.unwrap();
        let opened = cipher.decrypt(&envelope, "123456").await.unwrap();
        assert_eq!(opened.as_str(), "5Jtestpostingkey...");
    }

    #[tokio::test]
    async fn round_trips_empty_unicode_and_long_inputs() {
        let cipher = light();
        for plaintext in ["", "ключ-👻-鍵", &"x".repeat(8_192)] {
            let envelope = cipher.encrypt(plaintext, "000000").await.unwrap();
            let opened = cipher.decrypt(&envelope, "000000").await.unwrap();
            assert_eq!(opened.as_str(), plaintext);
        }
    }

    #[tokio::test]
    async fn equal_inputs_never_produce_equal_envelopes() {
        let cipher = light();
        let first = cipher.encrypt("secret", "123456").await.unwrap();
        let second = cipher.encrypt("secret", "123456").await.unwrap();
        assert_ne!(first, second);
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[tokio::test]
    async fn wrong_pin_fails_uniformly() {
        let cipher = light();
        let envelope = cipher.encrypt("5Jtestpostingkey...", "123456").await.unwrap();
        let err = cipher.decrypt(&envelope, "654321").await.unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed));
    }

    #[tokio::test]
    async fn tampering_any_field_fails_uniformly() {
        let cipher = light();
        let envelope = cipher.encrypt("secret", "123456").await.unwrap();

        let mut bad_ct = envelope.clone();
        bad_ct.ciphertext = BASE64.encode(b"garbage");
        let mut bad_salt = envelope.clone();
        bad_salt.salt = BASE64.encode([9u8; SALT_LEN]);
        let mut bad_nonce = envelope.clone();
        bad_nonce.nonce = BASE64.encode([9u8; NONCE_LEN]);
        let mut not_base64 = envelope.clone();
        not_base64.salt = "!!not base64!!".to_string();
        let mut short_nonce = envelope;
        short_nonce.nonce = BASE64.encode([9u8; 4]);

        for tampered in [bad_ct, bad_salt, bad_nonce, not_base64, short_nonce] {
            let err = cipher.decrypt(&tampered, "123456").await.unwrap_err();
            assert!(matches!(err, Error::DecryptionFailed));
        }
    }

    #[tokio::test]
    async fn pin_format_is_gated_before_any_crypto() {
        let cipher = light();
        for pin in ["", "12345", "1234567", "12345a", "12 456", "12345\u{0660}"] {
            let err = cipher.encrypt("secret", pin).await.unwrap_err();
            assert!(matches!(err, Error::InvalidPinFormat), "{pin:?}");
        }
        // decrypt applies the same gate even on a garbage envelope
        let junk = Envelope {
            ciphertext: "x".to_string(),
            salt: "y".to_string(),
            nonce: "z".to_string(),
        };
        let err = cipher.decrypt(&junk, "abcdef").await.unwrap_err();
        assert!(matches!(err, Error::InvalidPinFormat));
    }

    #[test]
    fn validate_pin_accepts_exactly_six_digits() {
        for pin in ["000000", "123456", "999999"] {
            assert!(validate_pin(pin).is_ok());
        }
    }

    #[tokio::test]
    async fn production_parameters_round_trip() {
        let cipher = PinCipher::new();
        let envelope = cipher.encrypt("secret", "123456").await.unwrap();
        let opened = cipher.decrypt(&envelope, "123456").await.unwrap();
        assert_eq!(opened.as_str(), "secret");
    }

    #[test]
    fn envelope_serializes_to_stable_json_shape() {
        let envelope = Envelope {
            ciphertext: "Y3Q=".to_string(),
            salt: "c2FsdA==".to_string(),
            nonce: "bm9uY2U=".to_string(),
        };
        let raw = serde_json::to_string(&envelope).unwrap();
        assert!(raw.contains("\"ciphertext\""));
        assert!(raw.contains("\"salt\""));
        assert!(raw.contains("\"nonce\""));
        let back: Envelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn derived_keys_depend_on_pin_and_salt() {
        let a = derive_key("123456", &[1u8; SALT_LEN], 100);
        let b = derive_key("123456", &[2u8; SALT_LEN], 100);
        let c = derive_key("654321", &[1u8; SALT_LEN], 100);
        let again = derive_key("123456", &[1u8; SALT_LEN], 100);
        assert_ne!(a.as_slice(), b.as_slice());
        assert_ne!(a.as_slice(), c.as_slice());
        assert_eq!(a.as_slice(), again.as_slice());
    }
}
