//! Error types for credential files.

use broker_claims::ClaimsError;
use thiserror::Error;

/// Errors that can occur while formatting or parsing credential files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredsError {
    /// No token block and no bare token was found.
    #[error("no jwt found in credentials")]
    MissingJwt,
    /// No seed block and no seed line was found.
    #[error("no nkey seed found in credentials")]
    MissingSeed,
    /// The token is not a user claim.
    #[error("credentials require a user jwt, found a {found} jwt")]
    NotUserJwt {
        /// The claim kind that was found
        found: String,
    },
    /// The seed is of a key class that cannot be stored in credentials.
    #[error("seed is not a {expected} seed")]
    WrongSeedKind {
        /// Acceptable key classes
        expected: &'static str,
    },
    /// The seed could not be decoded.
    #[error("invalid nkey seed: {reason}")]
    InvalidSeed {
        /// Why the seed was rejected
        reason: String,
    },
    /// The token could not be read.
    #[error(transparent)]
    Claims(#[from] ClaimsError),
}

impl CredsError {
    /// Returns true if the input lacked a required block.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::MissingJwt | Self::MissingSeed)
    }
}
