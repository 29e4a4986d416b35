//! Signed message: `tag || body`, sliced at a fixed offset

use std::fmt;

use crate::error::{CryptoError, CryptoResult};
use crate::{hex, IV_HEX_LEN, TAG_HEX_LEN};

/// A sealed document as stored in the page.
///
/// The first [`TAG_HEX_LEN`] characters are always the tag. There is no
/// delimiter and no version marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    raw: String,
}

impl SignedMessage {
    /// Validate and wrap a stored signed message.
    ///
    /// Rejects anything that is not hex or is too short to hold a tag and
    /// an IV. This happens before any key derivation.
    pub fn parse(raw: &str) -> CryptoResult<Self> {
        if !hex::is_hex(raw) {
            return Err(CryptoError::MalformedHex(
                "signed message contains non-hex characters".into(),
            ));
        }
        if raw.len() < TAG_HEX_LEN + IV_HEX_LEN {
            return Err(CryptoError::MalformedHex(format!(
                "signed message too short: {} chars (minimum {})",
                raw.len(),
                TAG_HEX_LEN + IV_HEX_LEN
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
        })
    }

    /// Join a freshly computed tag with its ciphertext body.
    pub fn compose(tag: &str, body: &str) -> CryptoResult<Self> {
        if tag.len() != TAG_HEX_LEN {
            return Err(CryptoError::MalformedHex(format!(
                "tag must be {TAG_HEX_LEN} hex chars, got {}",
                tag.len()
            )));
        }
        let mut raw = String::with_capacity(tag.len() + body.len());
        raw.push_str(tag);
        raw.push_str(body);
        Self::parse(&raw)
    }

    pub fn tag(&self) -> &str {
        &self.raw[..TAG_HEX_LEN]
    }

    pub fn body(&self) -> &str {
        &self.raw[TAG_HEX_LEN..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn into_string(self) -> String {
        self.raw
    }
}

impl fmt::Display for SignedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
