//! Verification and decoding with legacy-pipeline fallback
//!
//! ```text
//! key ← current(pw)          ── tag ok? ──▶ decrypt ──▶ Success
//!   │ mismatch
//!   ▼
//! key ← legacy[0](pw)        ── tag ok? ──▶ decrypt ──▶ Success
//!   │ mismatch
//!   ▼
//! key ← legacy[1](pw)        ── tag ok? ──▶ decrypt ──▶ Success
//!   │ mismatch
//!   ▼
//! SignatureMismatch
//! ```
//!
//! Every legacy key is derived from the raw password the user typed, never
//! from the key that just failed. First match wins.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;
use crate::message::SignedMessage;
use crate::pipeline::KeyDerivation;
use crate::{cipher, mac};

/// Which derivation produced the key that verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedPipeline {
    Current,
    Legacy(usize),
}

impl fmt::Display for MatchedPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedPipeline::Current => f.write_str("current"),
            MatchedPipeline::Legacy(i) => write!(f, "legacy[{i}]"),
        }
    }
}

/// Plaintext recovered from a signed message.
#[derive(Clone, PartialEq, Eq)]
pub struct Decoded {
    pub plaintext: String,
    pub pipeline: MatchedPipeline,
}

impl fmt::Debug for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("plaintext", &format_args!("[{} bytes]", self.plaintext.len()))
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

pub struct Verifier<'a> {
    kdf: &'a KeyDerivation,
}

impl<'a> Verifier<'a> {
    pub fn new(kdf: &'a KeyDerivation) -> Self {
        Self { kdf }
    }

    /// Full view-time path: validate, derive with the current pipeline,
    /// then fall back through the legacy table.
    pub fn unlock(
        &self,
        password: &SecretString,
        salt: &str,
        signed_msg: &str,
    ) -> CryptoResult<Decoded> {
        let msg = SignedMessage::parse(signed_msg)?;
        let key = self.kdf.derive_current(password, salt)?;
        self.decode(&msg, key, salt, password.expose_secret().as_bytes())
    }

    /// Check `msg` against `hashed_password`, then against each legacy
    /// pipeline applied to `original_password`.
    ///
    /// `original_password` must be the literal text the user entered.
    pub fn decode(
        &self,
        msg: &SignedMessage,
        hashed_password: DerivedKey,
        salt: &str,
        original_password: &[u8],
    ) -> CryptoResult<Decoded> {
        let legacy_len = self.kdf.legacy().len();
        let mut key = hashed_password;
        let mut matched = MatchedPipeline::Current;
        let mut next = 0usize;

        loop {
            if mac::verify_tag(&key, msg.body(), msg.tag())? {
                let plaintext = cipher::decrypt(msg.body(), &key).map_err(|e| {
                    warn!(pipeline = %matched, "tag verified but decryption failed");
                    match e {
                        CryptoError::DecryptionFailed(_) => e,
                        other => CryptoError::DecryptionFailed(other.to_string()),
                    }
                })?;
                debug!(pipeline = %matched, "signature verified");
                return Ok(Decoded {
                    plaintext,
                    pipeline: matched,
                });
            }

            if next >= legacy_len {
                debug!(attempts = next + 1, "signature mismatch on every pipeline");
                return Err(CryptoError::SignatureMismatch);
            }

            debug!(failed = %matched, trying = next, "signature mismatch, trying legacy pipeline");
            key = self.kdf.derive_legacy(next, original_password, salt)?;
            matched = MatchedPipeline::Legacy(next);
            next += 1;
        }
    }
}
