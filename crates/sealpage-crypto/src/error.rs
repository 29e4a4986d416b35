use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Input was not an even-length string of hex digits.
    #[error("malformed hex: {0}")]
    MalformedHex(String),

    /// No pipeline produced a key whose tag matched. Deliberately says
    /// nothing about whether the password or the data was wrong.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// Padding or UTF-8 failure after the tag already verified.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("invalid key length: {0} bytes (expected 32)")]
    InvalidKeyLength(usize),

    #[error("invalid KDF parameters: {0}")]
    InvalidParams(String),
}
