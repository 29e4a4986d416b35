//! AES-256-CBC document encryption
//!
//! Ciphertext body format (hex text):
//! ```text
//! [32 hex: random IV][N hex: AES-256-CBC ciphertext, PKCS#7 padded]
//! ```
//!
//! CBC alone is malleable; the body is only trusted after the HMAC tag in
//! front of it verifies (see [`crate::verify`]).

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;
use crate::{hex, IV_HEX_LEN, IV_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;

/// Encrypt UTF-8 text under `key` with a fresh random IV.
///
/// Returns `hex(iv) || hex(ciphertext)`.
pub fn encrypt(plaintext: &str, key: &DerivedKey) -> CryptoResult<String> {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    encrypt_with_iv(plaintext, key, &iv)
}

fn encrypt_with_iv(plaintext: &str, key: &DerivedKey, iv: &[u8; IV_SIZE]) -> CryptoResult<String> {
    let mut key_bytes = key.to_bytes()?;
    let cipher = Aes256CbcEnc::new_from_slices(&key_bytes, iv)
        .map_err(|e| CryptoError::InvalidParams(format!("AES-256-CBC init: {e}")));
    key_bytes.zeroize();

    let ciphertext = cipher?.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut body = String::with_capacity(IV_HEX_LEN + ciphertext.len() * 2);
    body.push_str(&hex::stringify(iv));
    body.push_str(&hex::stringify(&ciphertext));
    Ok(body)
}

/// Decrypt a ciphertext body produced by [`encrypt`].
///
/// Only called once the tag has verified, so any failure here means the
/// sealed data itself is inconsistent.
pub fn decrypt(body: &str, key: &DerivedKey) -> CryptoResult<String> {
    if body.len() < IV_HEX_LEN + BLOCK_SIZE * 2 || !body.is_char_boundary(IV_HEX_LEN) {
        return Err(CryptoError::DecryptionFailed(format!(
            "ciphertext body too short: {} hex chars (minimum {})",
            body.len(),
            IV_HEX_LEN + BLOCK_SIZE * 2
        )));
    }

    let (iv_hex, ct_hex) = body.split_at(IV_HEX_LEN);
    let iv = hex::parse(iv_hex)?;
    let ciphertext = hex::parse(ct_hex)?;

    let mut key_bytes = key.to_bytes()?;
    let cipher = Aes256CbcDec::new_from_slices(&key_bytes, &iv)
        .map_err(|e| CryptoError::InvalidParams(format!("AES-256-CBC init: {e}")));
    key_bytes.zeroize();

    let plaintext = cipher?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed("invalid padding".into()))?;

    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::DecryptionFailed(format!("plaintext is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;

    fn test_key() -> DerivedKey {
        DerivedKey::from_bytes(&[42u8; KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let body = encrypt("<h1>hello, sealed page</h1>", &key).unwrap();
        assert_eq!(decrypt(&body, &key).unwrap(), "<h1>hello, sealed page</h1>");
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = test_key();
        let body = encrypt("", &key).unwrap();
        // IV + one full padding block
        assert_eq!(body.len(), IV_HEX_LEN + BLOCK_SIZE * 2);
        assert_eq!(decrypt(&body, &key).unwrap(), "");
    }

    #[test]
    fn test_multibyte_plaintext() {
        let key = test_key();
        let text = "Grüße, 世界 🔒";
        let body = encrypt(text, &key).unwrap();
        assert_eq!(decrypt(&body, &key).unwrap(), text);
    }

    #[test]
    fn test_padding_sizes() {
        let key = test_key();
        // 16 bytes of plaintext pads to 32 bytes of ciphertext
        let body = encrypt("0123456789abcdef", &key).unwrap();
        assert_eq!(body.len(), IV_HEX_LEN + 64);
        // 15 bytes pads to a single block
        let body = encrypt("0123456789abcde", &key).unwrap();
        assert_eq!(body.len(), IV_HEX_LEN + 32);
    }

    #[test]
    fn test_fixed_iv_is_deterministic() {
        let key = test_key();
        let iv = [9u8; IV_SIZE];
        let a = encrypt_with_iv("same", &key, &iv).unwrap();
        let b = encrypt_with_iv("same", &key, &iv).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(&"09".repeat(IV_SIZE)));
    }

    #[test]
    fn test_fresh_iv_per_message() {
        let key = test_key();
        let a = encrypt("same", &key).unwrap();
        let b = encrypt("same", &key).unwrap();
        assert_ne!(a[..IV_HEX_LEN], b[..IV_HEX_LEN], "IVs must not repeat");
    }

    #[test]
    fn test_decrypt_wrong_key_fails_or_garbles() {
        let body = encrypt("secret data", &test_key()).unwrap();
        let other = DerivedKey::from_bytes(&[7u8; KEY_SIZE]);
        // CBC has no integrity of its own: a wrong key usually breaks the
        // padding, and otherwise yields different bytes
        match decrypt(&body, &other) {
            Ok(text) => assert_ne!(text, "secret data"),
            Err(e) => assert!(matches!(e, CryptoError::DecryptionFailed(_))),
        }
    }

    #[test]
    fn test_decrypt_too_short() {
        let result = decrypt("00112233", &test_key());
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_decrypt_partial_block() {
        let body = encrypt("hello", &test_key()).unwrap();
        // drop one byte so the ciphertext is no longer block aligned
        let truncated = &body[..body.len() - 2];
        assert!(matches!(
            decrypt(truncated, &test_key()),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_decrypt_malformed_hex() {
        let body = format!("{}{}", "zz".repeat(IV_SIZE), "00".repeat(BLOCK_SIZE));
        assert!(matches!(
            decrypt(&body, &test_key()),
            Err(CryptoError::MalformedHex(_))
        ));
    }
}
