//! Chain key and identity primitives for the Quill mobile client.
//!
//! Parsing and encoding for the chain's WIF private keys and `QLL`
//! public keys, plus account name normalization. This crate is pure
//! computation: no I/O, no async, safe to call from any layer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod keys;
pub mod username;

pub use error::{Error, Result};
pub use keys::{Authority, PrivateKey, PublicKey, PUBLIC_KEY_PREFIX};
