//! Account name normalization and shape validation.
//!
//! The chain addresses accounts by short lowercase names. UI surfaces
//! accept sloppy input (`@Alice `, mixed case), so every custody entry
//! point normalizes before comparing or persisting.

use crate::error::{Error, Result};

/// Minimum account name length accepted by the chain.
pub const MIN_LEN: usize = 3;
/// Maximum account name length accepted by the chain.
pub const MAX_LEN: usize = 16;

/// Strips one leading `@`, trims surrounding whitespace and lowercases.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('@').unwrap_or(trimmed);
    stripped.to_lowercase()
}

/// Validates an already-normalized name against the chain shape rules:
/// 3 to 16 characters drawn from `[a-z0-9.-]`, starting with a letter,
/// ending alphanumeric, separators never doubled.
pub fn validate(name: &str) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() < MIN_LEN || bytes.len() > MAX_LEN {
        return Err(Error::InvalidUsername(format!(
            "name must be {MIN_LEN}-{MAX_LEN} characters, got {}",
            bytes.len()
        )));
    }
    if !bytes[0].is_ascii_lowercase() {
        return Err(Error::InvalidUsername(
            "name must start with a letter".to_string(),
        ));
    }
    let last = bytes[bytes.len() - 1];
    if !(last.is_ascii_lowercase() || last.is_ascii_digit()) {
        return Err(Error::InvalidUsername(
            "name must end with a letter or digit".to_string(),
        ));
    }
    let mut prev_sep = false;
    for &b in bytes {
        let sep = b == b'.' || b == b'-';
        if !(b.is_ascii_lowercase() || b.is_ascii_digit() || sep) {
            return Err(Error::InvalidUsername(format!(
                "character {:?} is not allowed",
                b as char
            )));
        }
        if sep && prev_sep {
            return Err(Error::InvalidUsername(
                "separators cannot repeat".to_string(),
            ));
        }
        prev_sep = sep;
    }
    Ok(())
}

/// Normalizes raw input and validates the result, returning the
/// canonical name.
pub fn normalized(raw: &str) -> Result<String> {
    let name = normalize(raw);
    validate(&name)?;
    Ok(name)
}
