//! Private and public key handling for the chain's wire formats.
//!
//! Private keys travel as base58check WIF strings (version byte `0x80`
//! over a 32-byte secret, the familiar `5...` shape); public keys as
//! `QLL`-prefixed base58check compressed points. Parsing is strict:
//! any checksum, version or length mismatch is rejected.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use secp256k1::{All, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Version byte prefixed to the raw secret in WIF encoding.
const WIF_VERSION: u8 = 0x80;
/// Human-readable prefix on encoded public keys.
pub const PUBLIC_KEY_PREFIX: &str = "QLL";

static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Signing authority level a key grants on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    /// Day-to-day social operations: posts, comments, votes, follows.
    Posting,
    /// Funds movement and account changes.
    Active,
}

impl Authority {
    /// Lowercase wire name used in ledger lookups.
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::Posting => "posting",
            Authority::Active => "active",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secp256k1 private key parsed from WIF.
pub struct PrivateKey {
    secret: SecretKey,
}

impl PrivateKey {
    /// Parses a WIF string, verifying checksum, version byte and length.
    pub fn from_wif(wif: &str) -> Result<Self> {
        let payload = Zeroizing::new(
            bs58::decode(wif.trim())
                .with_check(Some(WIF_VERSION))
                .into_vec()
                .map_err(|e| Error::InvalidKey(format!("WIF decode failed: {e}")))?,
        );
        // decoded payload retains the version byte at index 0
        if payload.len() != 33 {
            return Err(Error::InvalidKey(format!(
                "WIF payload must be 33 bytes, got {}",
                payload.len()
            )));
        }
        let secret = SecretKey::from_slice(&payload[1..])
            .map_err(|e| Error::InvalidKey(format!("not a valid scalar: {e}")))?;
        Ok(Self { secret })
    }

    /// Encodes back to WIF. The string grants full signing power, so it
    /// is returned zeroizing.
    pub fn to_wif(&self) -> Zeroizing<String> {
        let mut payload = Zeroizing::new([0u8; 33]);
        payload[0] = WIF_VERSION;
        payload[1..].copy_from_slice(&self.secret.secret_bytes());
        Zeroizing::new(bs58::encode(payload.as_slice()).with_check().into_string())
    }

    /// Derives the public key for this private key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(secp256k1::PublicKey::from_secret_key(&SECP, &self.secret))
    }

    /// Generates a fresh random key. Onboarding and test helper.
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::new(&mut rand::thread_rng()),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(secp256k1::PublicKey);

impl PublicKey {
    /// Compressed SEC1 bytes.
    pub fn to_bytes(&self) -> [u8; 33] {
        self.0.serialize()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = bs58::encode(self.to_bytes()).with_check().into_string();
        write!(f, "{PUBLIC_KEY_PREFIX}{encoded}")
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let body = s.strip_prefix(PUBLIC_KEY_PREFIX).ok_or_else(|| {
            Error::InvalidKey(format!("public key must start with {PUBLIC_KEY_PREFIX}"))
        })?;
        let bytes = bs58::decode(body)
            .with_check(None)
            .into_vec()
            .map_err(|e| Error::InvalidKey(format!("public key decode failed: {e}")))?;
        let point = secp256k1::PublicKey::from_slice(&bytes)
            .map_err(|e| Error::InvalidKey(format!("not a valid curve point: {e}")))?;
        Ok(Self(point))
    }
}
