//! Key derivation: PBKDF2 rounds → 256-bit derived key
//!
//! A round is one PBKDF2 invocation. Rounds chain by feeding the previous
//! round's *hex text* in as the next round's password; the salt is always
//! the UTF-8 bytes of the salt hex string.

use std::fmt;
use std::time::Instant;

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{hex, KEY_SIZE};

/// Hash underlying a PBKDF2 round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha1 => f.write_str("SHA-1"),
            HashAlgorithm::Sha256 => f.write_str("SHA-256"),
        }
    }
}

/// One hashing step of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    pub iterations: u32,
    pub hash: HashAlgorithm,
}

impl Round {
    pub const fn new(iterations: u32, hash: HashAlgorithm) -> Self {
        Self { iterations, hash }
    }
}

/// A 256-bit key held as its 64-character hex form.
///
/// The hex form is what chains between rounds, so it is the canonical
/// representation. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey {
    hex: String,
}

impl DerivedKey {
    pub fn from_bytes(bytes: &[u8; KEY_SIZE]) -> Self {
        Self {
            hex: hex::stringify(bytes),
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Raw key bytes for the cipher and MAC.
    pub fn to_bytes(&self) -> CryptoResult<[u8; KEY_SIZE]> {
        let mut raw = hex::parse(&self.hex)?;
        if raw.len() != KEY_SIZE {
            let len = raw.len();
            raw.zeroize();
            return Err(CryptoError::InvalidKeyLength(len));
        }
        let mut out = [0u8; KEY_SIZE];
        out.copy_from_slice(&raw);
        raw.zeroize();
        Ok(out)
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.hex.zeroize();
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("hex", &"[REDACTED]")
            .finish()
    }
}

/// Iteration counts for the three rounds of the current pipeline.
///
/// Legacy pipelines reuse rounds 2 and 3, so these also shape the legacy
/// table. Production documents must use the defaults; tests inject small
/// counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Round 1, PBKDF2-HMAC-SHA1 (default: 1000)
    pub sha1_iterations: u32,
    /// Round 2, PBKDF2-HMAC-SHA256 (default: 14000)
    pub sha256_iterations: u32,
    /// Round 3, PBKDF2-HMAC-SHA256 (default: 585000)
    pub final_iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            sha1_iterations: 1000,
            sha256_iterations: 14000,
            final_iterations: 585000,
        }
    }
}

impl KdfParams {
    pub fn round1(&self) -> Round {
        Round::new(self.sha1_iterations, HashAlgorithm::Sha1)
    }

    pub fn round2(&self) -> Round {
        Round::new(self.sha256_iterations, HashAlgorithm::Sha256)
    }

    pub fn round3(&self) -> Round {
        Round::new(self.final_iterations, HashAlgorithm::Sha256)
    }

    pub fn validate(&self) -> CryptoResult<()> {
        for round in [self.round1(), self.round2(), self.round3()] {
            check_round(&round)?;
        }
        Ok(())
    }
}

/// Run one PBKDF2 round, producing a 256-bit key.
///
/// Never cached: every password guess pays the full iteration cost.
pub fn derive_round(password: &[u8], salt: &str, round: Round) -> CryptoResult<DerivedKey> {
    check_round(&round)?;

    let started = Instant::now();
    let mut key = [0u8; KEY_SIZE];
    match round.hash {
        HashAlgorithm::Sha1 => {
            pbkdf2_hmac::<Sha1>(password, salt.as_bytes(), round.iterations, &mut key)
        }
        HashAlgorithm::Sha256 => {
            pbkdf2_hmac::<Sha256>(password, salt.as_bytes(), round.iterations, &mut key)
        }
    }
    let derived = DerivedKey::from_bytes(&key);
    key.zeroize();

    tracing::trace!(
        hash = %round.hash,
        iterations = round.iterations,
        elapsed = ?started.elapsed(),
        "PBKDF2 round complete"
    );

    Ok(derived)
}

fn check_round(round: &Round) -> CryptoResult<()> {
    if round.iterations == 0 {
        return Err(CryptoError::InvalidParams(format!(
            "{} round has zero iterations",
            round.hash
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pbkdf2_sha1_known_answer() {
        // RFC 6070, c = 1; the first 20 bytes of a 32-byte output equal T1
        let key = derive_round(b"password", "salt", Round::new(1, HashAlgorithm::Sha1)).unwrap();
        assert!(key
            .as_hex()
            .starts_with("0c60c80f961f0e71f3a9b524af6012062fe037a6"));
        assert_eq!(key.as_hex().len(), 64);
    }

    #[test]
    fn test_pbkdf2_sha256_known_answer() {
        let key = derive_round(b"password", "salt", Round::new(1, HashAlgorithm::Sha256)).unwrap();
        assert_eq!(
            key.as_hex(),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_round_deterministic() {
        let round = Round::new(10, HashAlgorithm::Sha256);
        let k1 = derive_round(b"hunter2", "00ff", round).unwrap();
        let k2 = derive_round(b"hunter2", "00ff", round).unwrap();
        assert_eq!(k1, k2, "KDF must be deterministic");
    }

    #[test]
    fn test_round_hash_matters() {
        let k1 = derive_round(b"pw", "salt", Round::new(5, HashAlgorithm::Sha1)).unwrap();
        let k2 = derive_round(b"pw", "salt", Round::new(5, HashAlgorithm::Sha256)).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let result = derive_round(b"pw", "salt", Round::new(0, HashAlgorithm::Sha256));
        assert!(matches!(result, Err(CryptoError::InvalidParams(_))));
    }

    #[test]
    fn test_default_params() {
        let params = KdfParams::default();
        assert_eq!(params.round1(), Round::new(1000, HashAlgorithm::Sha1));
        assert_eq!(params.round2(), Round::new(14000, HashAlgorithm::Sha256));
        assert_eq!(params.round3(), Round::new(585000, HashAlgorithm::Sha256));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_derived_key_bytes_roundtrip() {
        let key = DerivedKey::from_bytes(&[0xABu8; KEY_SIZE]);
        assert_eq!(key.as_hex(), "ab".repeat(KEY_SIZE));
        assert_eq!(key.to_bytes().unwrap(), [0xABu8; KEY_SIZE]);
    }

    #[test]
    fn test_derived_key_debug_redacted() {
        let key = DerivedKey::from_bytes(&[7u8; KEY_SIZE]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("0707"));
    }
}
