//! Lock-time encoding: salt generation and `tag || ciphertext` composition

use rand::RngCore;
use secrecy::SecretString;

use crate::error::CryptoResult;
use crate::kdf::DerivedKey;
use crate::message::SignedMessage;
use crate::pipeline::KeyDerivation;
use crate::{cipher, hex, mac, SALT_SIZE};

/// Generate a random 128-bit salt, hex-encoded.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::stringify(&bytes)
}

/// Derive a document key with the current pipeline.
pub fn hash_password(
    kdf: &KeyDerivation,
    password: &SecretString,
    salt: &str,
) -> CryptoResult<DerivedKey> {
    kdf.derive_current(password, salt)
}

/// Encrypt and tag `plaintext` under an already derived key.
pub fn encode_with_key(plaintext: &str, key: &DerivedKey) -> CryptoResult<SignedMessage> {
    let body = cipher::encrypt(plaintext, key)?;
    let tag = mac::sign_message(key, &body)?;
    SignedMessage::compose(&tag, &body)
}

/// Derive, encrypt, and tag in one step.
pub fn encode(
    kdf: &KeyDerivation,
    plaintext: &str,
    password: &SecretString,
    salt: &str,
) -> CryptoResult<SignedMessage> {
    let key = hash_password(kdf, password, salt)?;
    encode_with_key(plaintext, &key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::KdfParams;
    use crate::{IV_HEX_LEN, TAG_HEX_LEN};

    fn fast_kdf() -> KeyDerivation {
        KeyDerivation::new(&KdfParams {
            sha1_iterations: 1,
            sha256_iterations: 1,
            final_iterations: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_salt_shape() {
        let salt = generate_salt();
        assert_eq!(salt.len(), SALT_SIZE * 2);
        assert!(hex::is_hex(&salt));
        assert_ne!(salt, generate_salt(), "salts must be random");
    }

    #[test]
    fn test_tag_covers_body() {
        let kdf = fast_kdf();
        let pw = SecretString::from("pw");
        let msg = encode(&kdf, "doc", &pw, "salt").unwrap();
        let key = hash_password(&kdf, &pw, "salt").unwrap();
        assert_eq!(msg.tag(), mac::sign_message(&key, msg.body()).unwrap());
    }

    #[test]
    fn test_empty_plaintext_layout() {
        let key = DerivedKey::from_bytes(&[5u8; crate::KEY_SIZE]);
        let msg = encode_with_key("", &key).unwrap();
        assert_eq!(msg.as_str().len(), TAG_HEX_LEN + IV_HEX_LEN + 32);
        assert_eq!(msg.tag(), mac::sign_message(&key, msg.body()).unwrap());
    }
}
