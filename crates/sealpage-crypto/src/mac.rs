//! HMAC-SHA256 tags over the ciphertext body

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::hex;
use crate::kdf::DerivedKey;

type HmacSha256 = Hmac<Sha256>;

/// Tag `message` (as UTF-8 bytes) with the raw bytes of `key`.
///
/// Returns 64 lowercase hex characters.
pub fn sign_message(key: &DerivedKey, message: &str) -> CryptoResult<String> {
    let mut key_bytes = key.to_bytes()?;
    let tag = hmac_hex(&key_bytes, message.as_bytes());
    key_bytes.zeroize();
    tag
}

/// Recompute the tag and compare it with `tag` in constant time.
pub fn verify_tag(key: &DerivedKey, message: &str, tag: &str) -> CryptoResult<bool> {
    let expected = sign_message(key, message)?;
    Ok(expected.as_bytes().ct_eq(tag.as_bytes()).into())
}

fn hmac_hex(key: &[u8], message: &[u8]) -> CryptoResult<String> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidParams(format!("HMAC key: {e}")))?;
    mac.update(message);
    Ok(hex::stringify(&mac.finalize().into_bytes()))
}
