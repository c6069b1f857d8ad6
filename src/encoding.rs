//! Segment and identifier encodings shared by the token envelope.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use sha2::{Digest, Sha512_256};

use crate::error::ClaimsError;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encodes a token segment as unpadded URL-safe base64.
#[must_use]
pub fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes a token segment.
///
/// Trailing padding is tolerated, and segments produced with the standard
/// alphabet are accepted as a fallback.
///
/// # Errors
///
/// Returns `ClaimsError::MalformedToken` if the segment is not base64.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, ClaimsError> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| ClaimsError::malformed(format!("invalid base64 segment: {e}")))
}

/// Encodes bytes as RFC 4648 base32 without padding.
#[must_use]
pub fn base32_no_pad(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in bytes {
        buffer = ((buffer << 8) | u32::from(byte)) & 0xFFFF;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = (buffer >> bits) & 0x1F;
            out.push(char::from(BASE32_ALPHABET[index as usize]));
        }
    }
    if bits > 0 {
        let index = (buffer << (5 - bits)) & 0x1F;
        out.push(char::from(BASE32_ALPHABET[index as usize]));
    }
    out
}

/// Derives a claim identifier: base32 of the SHA-512/256 digest of `bytes`.
#[must_use]
pub fn hash_id(bytes: &[u8]) -> String {
    base32_no_pad(&Sha512_256::digest(bytes))
}

/// Serde adapter storing a [`Duration`](std::time::Duration) as integer
/// nanoseconds.
pub mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a duration as nanoseconds, saturating at `u64::MAX`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Deserializes a duration from nanoseconds. Negative values read as zero.
    ///
    /// # Errors
    ///
    /// Propagates deserializer errors.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = i64::deserialize(d)?;
        Ok(Duration::from_nanos(u64::try_from(nanos).unwrap_or(0)))
    }

    /// Returns true for the zero duration, for `skip_serializing_if`.
    #[must_use]
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn is_zero(d: &Duration) -> bool {
        d.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base32_matches_rfc4648_vectors() {
        assert_eq!(base32_no_pad(b""), "");
        assert_eq!(base32_no_pad(b"f"), "MY");
        assert_eq!(base32_no_pad(b"fo"), "MZXQ");
        assert_eq!(base32_no_pad(b"foo"), "MZXW6");
        assert_eq!(base32_no_pad(b"foob"), "MZXW6YQ");
        assert_eq!(base32_no_pad(b"fooba"), "MZXW6YTB");
        assert_eq!(base32_no_pad(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn hash_id_is_stable_and_unpadded() {
        let a = hash_id(b"{\"sub\":\"x\"}");
        let b = hash_id(b"{\"sub\":\"x\"}");
        assert_eq!(a, b);
        // 32-byte digest -> 52 base32 characters
        assert_eq!(a.len(), 52);
        assert!(!a.contains('='));
        assert_ne!(a, hash_id(b"{\"sub\":\"y\"}"));
    }

    #[test]
    fn segment_roundtrip_and_padding_tolerance() {
        let encoded = encode_segment(b"{\"a\":1}");
        assert!(!encoded.contains('='));
        assert_eq!(decode_segment(&encoded).unwrap(), b"{\"a\":1}");
        assert_eq!(decode_segment("eyJhIjoxfQ==").unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn standard_alphabet_is_accepted() {
        // 0xfb 0xff encodes to "+/8" in the standard alphabet
        assert_eq!(decode_segment("+/8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_segment("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn garbage_segment_is_malformed() {
        assert!(matches!(
            decode_segment("not base64!"),
            Err(ClaimsError::MalformedToken { .. })
        ));
    }
}
