//! Error types for claim encoding and decoding.

use thiserror::Error;

/// Errors that can occur while encoding or decoding claims.
///
/// Structural and cryptographic failures are always reported through this
/// type. Semantic problems (overlapping exports, bad CIDR blocks, ...) are
/// collected in [`ValidationResults`](crate::ValidationResults) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// Wrong segment count, or a segment that is not valid base64/JSON.
    #[error("malformed token: {reason}")]
    MalformedToken {
        /// Description of the format error
        reason: String,
    },
    /// Header names an unsupported token type or algorithm.
    #[error("unsupported token header: {reason}")]
    UnsupportedHeader {
        /// Description of the header error
        reason: String,
    },
    /// The claim's `exp` is in the past.
    #[error("claim expired at {expires}; request a new token")]
    Expired {
        /// Expiration time in Unix seconds
        expires: i64,
    },
    /// The claim's `nbf` is in the future.
    #[error("claim is not valid until {not_before}")]
    NotYetValid {
        /// Not-before time in Unix seconds
        not_before: i64,
    },
    /// The signature does not verify against the issuer key.
    #[error("claim failed signature verification; token may have been tampered with")]
    SignatureInvalid,
    /// The issuer key class is not allowed to sign this kind of claim.
    #[error("issuer '{issuer}' is not a valid {expected} key")]
    UntrustedIssuer {
        /// The rejected issuer
        issuer: String,
        /// Human-readable list of accepted key classes
        expected: String,
    },
    /// The subject is not a key of the class this claim kind describes.
    #[error("subject '{subject}' is not a valid {expected}")]
    InvalidSubject {
        /// The rejected subject
        subject: String,
        /// Human-readable description of accepted subjects
        expected: String,
    },
    /// The token carries a different claim kind than requested.
    #[error("expected a {expected} claim but the token is a '{found}' claim")]
    ClaimTypeMismatch {
        /// The requested claim kind
        expected: String,
        /// The claim kind found in the token
        found: String,
    },
    /// A field required for the operation is empty.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Name of the missing field
        field: &'static str,
    },
    /// A key or seed could not be decoded.
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// Description of the key error
        reason: String,
    },
    /// The key pair refused to sign.
    #[error("signing failed: {reason}")]
    Signing {
        /// Description of the signing error
        reason: String,
    },
    /// Claims could not be serialized.
    #[error("failed to serialize claims: {reason}")]
    Serialization {
        /// Description of the serialization error
        reason: String,
    },
}

impl ClaimsError {
    /// Creates a `MalformedToken` error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedToken {
            reason: reason.into(),
        }
    }

    /// Creates an `UnsupportedHeader` error.
    #[must_use]
    pub fn unsupported_header(reason: impl Into<String>) -> Self {
        Self::UnsupportedHeader {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Returns true if the error is a time-window rejection (`Expired` or `NotYetValid`).
    #[must_use]
    pub const fn is_time_check(&self) -> bool {
        matches!(self, Self::Expired { .. } | Self::NotYetValid { .. })
    }

    /// Returns true if the signature did not verify.
    #[must_use]
    pub const fn is_signature_invalid(&self) -> bool {
        matches!(self, Self::SignatureInvalid)
    }
}

impl From<serde_json::Error> for ClaimsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
