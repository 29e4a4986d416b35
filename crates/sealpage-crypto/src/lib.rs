//! sealpage-crypto: password lock protocol for static documents
//!
//! Architecture: derive-then-encrypt-then-MAC, all values hex on the wire
//!
//! Pipeline: password + salt → PBKDF2 rounds → key → AES-256-CBC → HMAC-SHA256 tag
//!
//! Wire format:
//! ```text
//! signedMsg = hex(tag)[64] || hex(iv)[32] || hex(ciphertext)
//! tag       = HMAC-SHA256(key, hex(iv) || hex(ciphertext))
//! ```
//!
//! Key derivation (current pipeline):
//! ```text
//! k1 = PBKDF2-HMAC-SHA1  (password, salt,   1_000)
//! k2 = PBKDF2-HMAC-SHA256(hex(k1),  salt,  14_000)
//! k3 = PBKDF2-HMAC-SHA256(hex(k2),  salt, 585_000)   <- key
//! ```
//!
//! Messages carry no pipeline marker. Older documents were sealed with
//! shorter pipelines, so the verifier falls back through the legacy table
//! until a tag matches.

pub mod cipher;
pub mod encode;
pub mod error;
pub mod hex;
pub mod kdf;
pub mod mac;
pub mod message;
pub mod pipeline;
pub mod verify;

pub use encode::{encode, encode_with_key, generate_salt, hash_password};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_round, DerivedKey, HashAlgorithm, KdfParams, Round};
pub use mac::{sign_message, verify_tag};
pub use message::SignedMessage;
pub use pipeline::{KeyDerivation, LegacyTable, Pipeline};
pub use verify::{Decoded, MatchedPipeline, Verifier};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-CBC initialization vector (128-bit)
pub const IV_SIZE: usize = 16;

/// Size of a lock salt in bytes (128-bit)
pub const SALT_SIZE: usize = 16;

/// Length of the hex-encoded HMAC-SHA256 tag at the front of a signed message
pub const TAG_HEX_LEN: usize = 64;

/// Length of the hex-encoded IV at the front of a ciphertext body
pub const IV_HEX_LEN: usize = IV_SIZE * 2;
