//! The token header segment.

use serde::{Deserialize, Serialize};

use crate::constants::{ALGORITHM, TOKEN_TYPE};
use crate::encoding::decode_segment;
use crate::error::ClaimsError;

/// Token header: `{"typ":"jwt","alg":"ed25519"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Token type
    #[serde(default)]
    pub typ: String,
    /// Signing algorithm
    #[serde(default)]
    pub alg: String,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl Header {
    /// Creates the header every encoded token carries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            typ: TOKEN_TYPE.to_string(),
            alg: ALGORITHM.to_string(),
        }
    }

    /// Checks the token type and algorithm.
    ///
    /// The type is compared case-insensitively; the algorithm must match exactly.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::UnsupportedHeader` naming the offending field.
    pub fn validate(&self) -> Result<(), ClaimsError> {
        if !self.typ.eq_ignore_ascii_case(TOKEN_TYPE) {
            return Err(ClaimsError::unsupported_header(format!(
                "not supported type '{}'",
                self.typ
            )));
        }
        if self.alg != ALGORITHM {
            return Err(ClaimsError::unsupported_header(format!(
                "unexpected '{}' algorithm",
                self.alg
            )));
        }
        Ok(())
    }

    /// Decodes and validates a header segment.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::MalformedToken` if the segment is not base64 JSON,
    /// or `ClaimsError::UnsupportedHeader` if it names another type or algorithm.
    pub fn parse(segment: &str) -> Result<Self, ClaimsError> {
        let bytes = decode_segment(segment)?;
        let header: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ClaimsError::malformed(format!("invalid header: {e}")))?;
        header.validate()?;
        Ok(header)
    }
}
