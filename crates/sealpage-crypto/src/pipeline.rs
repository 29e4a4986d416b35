//! Derivation pipelines and the legacy-pipeline table
//!
//! ```text
//! current   : pw ─SHA1×r1─▶ k1 ─SHA256×r2─▶ k2 ─SHA256×r3─▶ key
//! legacy[0] : pw ─────────────────────────────SHA256×r3─▶ key
//! legacy[1] : pw ──────────────SHA256×r2─▶ k2 ─SHA256×r3─▶ key
//! ```
//!
//! Legacy entries are ordered newest retirement first. New retirements are
//! appended; existing entries are never reordered, because the order is the
//! order in which the verifier spends guesses.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_round, DerivedKey, KdfParams, Round};

/// An ordered, non-empty sequence of PBKDF2 rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    rounds: Vec<Round>,
}

impl Pipeline {
    pub fn new(rounds: Vec<Round>) -> CryptoResult<Self> {
        if rounds.is_empty() {
            return Err(CryptoError::InvalidParams(
                "pipeline needs at least one round".into(),
            ));
        }
        if let Some(r) = rounds.iter().find(|r| r.iterations == 0) {
            return Err(CryptoError::InvalidParams(format!(
                "{} round has zero iterations",
                r.hash
            )));
        }
        Ok(Self { rounds })
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Run every round in order. The first round hashes `password`; each
    /// later round hashes the previous round's hex output.
    pub fn derive(&self, password: &[u8], salt: &str) -> CryptoResult<DerivedKey> {
        let (first, rest) = self
            .rounds
            .split_first()
            .ok_or_else(|| CryptoError::InvalidParams("empty pipeline".into()))?;

        let mut key = derive_round(password, salt, *first)?;
        for round in rest {
            key = derive_round(key.as_hex().as_bytes(), salt, *round)?;
        }
        Ok(key)
    }
}

/// Retired pipelines, consulted only after the current pipeline fails.
#[derive(Debug, Clone, Default)]
pub struct LegacyTable {
    pipelines: Vec<Pipeline>,
}

impl LegacyTable {
    /// The shipped table: round 3 alone, then rounds 2+3.
    pub fn from_params(params: &KdfParams) -> CryptoResult<Self> {
        let mut table = Self::default();
        table.push(Pipeline::new(vec![params.round3()])?);
        table.push(Pipeline::new(vec![params.round2(), params.round3()])?);
        Ok(table)
    }

    /// Append a retired pipeline. It is tried after every existing entry.
    pub fn push(&mut self, pipeline: Pipeline) {
        self.pipelines.push(pipeline);
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pipeline> {
        self.pipelines.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.iter()
    }
}

/// Current pipeline plus legacy table, built once from [`KdfParams`].
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    current: Pipeline,
    legacy: LegacyTable,
}

impl KeyDerivation {
    pub fn new(params: &KdfParams) -> CryptoResult<Self> {
        params.validate()?;
        Ok(Self {
            current: Pipeline::new(vec![params.round1(), params.round2(), params.round3()])?,
            legacy: LegacyTable::from_params(params)?,
        })
    }

    /// Assemble from explicit parts, e.g. a table with extra retirements.
    pub fn from_parts(current: Pipeline, legacy: LegacyTable) -> Self {
        Self { current, legacy }
    }

    pub fn current(&self) -> &Pipeline {
        &self.current
    }

    pub fn legacy(&self) -> &LegacyTable {
        &self.legacy
    }

    /// The only pipeline used for new documents.
    pub fn derive_current(&self, password: &SecretString, salt: &str) -> CryptoResult<DerivedKey> {
        self.current
            .derive(password.expose_secret().as_bytes(), salt)
    }

    /// Derive with legacy pipeline `index`, always from the raw password.
    pub fn derive_legacy(
        &self,
        index: usize,
        original_password: &[u8],
        salt: &str,
    ) -> CryptoResult<DerivedKey> {
        let pipeline = self.legacy.get(index).ok_or_else(|| {
            CryptoError::InvalidParams(format!(
                "legacy pipeline {index} out of range ({} entries)",
                self.legacy.len()
            ))
        })?;
        pipeline.derive(original_password, salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::HashAlgorithm;

    fn fast_params() -> KdfParams {
        KdfParams {
            sha1_iterations: 2,
            sha256_iterations: 3,
            final_iterations: 4,
        }
    }

    #[test]
    fn test_current_chains_hex_outputs() {
        let params = fast_params();
        let kdf = KeyDerivation::new(&params).unwrap();
        let salt = "0123456789abcdef0123456789abcdef";

        let k1 = derive_round(b"open sesame", salt, params.round1()).unwrap();
        let k2 = derive_round(k1.as_hex().as_bytes(), salt, params.round2()).unwrap();
        let k3 = derive_round(k2.as_hex().as_bytes(), salt, params.round3()).unwrap();

        let current = kdf
            .derive_current(&SecretString::from("open sesame"), salt)
            .unwrap();
        assert_eq!(current, k3);
    }

    #[test]
    fn test_legacy_shapes() {
        let params = fast_params();
        let kdf = KeyDerivation::new(&params).unwrap();
        let salt = "aa";

        let only_round3 = derive_round(b"pw", salt, params.round3()).unwrap();
        assert_eq!(kdf.derive_legacy(0, b"pw", salt).unwrap(), only_round3);

        let k2 = derive_round(b"pw", salt, params.round2()).unwrap();
        let rounds_2_3 = derive_round(k2.as_hex().as_bytes(), salt, params.round3()).unwrap();
        assert_eq!(kdf.derive_legacy(1, b"pw", salt).unwrap(), rounds_2_3);
    }

    #[test]
    fn test_pipelines_produce_distinct_keys() {
        let kdf = KeyDerivation::new(&fast_params()).unwrap();
        let salt = "bb";
        let current = kdf.derive_current(&SecretString::from("pw"), salt).unwrap();
        let l0 = kdf.derive_legacy(0, b"pw", salt).unwrap();
        let l1 = kdf.derive_legacy(1, b"pw", salt).unwrap();
        assert_ne!(current, l0);
        assert_ne!(current, l1);
        assert_ne!(l0, l1);
    }

    #[test]
    fn test_legacy_index_out_of_range() {
        let kdf = KeyDerivation::new(&fast_params()).unwrap();
        let result = kdf.derive_legacy(2, b"pw", "salt");
        assert!(matches!(result, Err(CryptoError::InvalidParams(_))));
    }

    #[test]
    fn test_push_appends() {
        let params = fast_params();
        let mut table = LegacyTable::from_params(&params).unwrap();
        let extra = Pipeline::new(vec![Round::new(7, HashAlgorithm::Sha1)]).unwrap();
        table.push(extra.clone());

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0).unwrap().rounds(), &[params.round3()]);
        assert_eq!(table.get(2), Some(&extra));
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        assert!(Pipeline::new(vec![]).is_err());
        assert!(Pipeline::new(vec![Round::new(0, HashAlgorithm::Sha1)]).is_err());
    }

    #[test]
    fn test_zero_params_rejected() {
        let params = KdfParams {
            final_iterations: 0,
            ..fast_params()
        };
        assert!(KeyDerivation::new(&params).is_err());
    }
}
