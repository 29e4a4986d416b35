//! Hex encoding/decoding
//!
//! Every secret and every ciphertext crosses the page boundary as hex text.
//! Output is always lowercase; input may be either case.

use crate::error::{CryptoError, CryptoResult};

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Encode bytes as lowercase hex, two digits per byte.
pub fn stringify(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &byte in data {
        s.push(DIGITS[(byte >> 4) as usize] as char);
        s.push(DIGITS[(byte & 0x0f) as usize] as char);
    }
    s
}

/// Decode a hex string. Fails on odd length or any non-hex character.
pub fn parse(s: &str) -> CryptoResult<Vec<u8>> {
    let bytes = s.as_bytes();
    if !bytes.len().is_multiple_of(2) {
        return Err(CryptoError::MalformedHex(format!(
            "odd-length hex string ({} chars)",
            bytes.len()
        )));
    }

    bytes
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
            _ => Err(CryptoError::MalformedHex(format!(
                "invalid hex digit at offset {}",
                i * 2
            ))),
        })
        .collect()
}

/// True if every character is an ASCII hex digit.
pub fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
