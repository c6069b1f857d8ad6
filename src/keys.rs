//! Prefix-tagged key pairs for signing and verifying claims.
//!
//! Keys are Ed25519 key pairs whose public half is encoded with a one-byte
//! role prefix (operator, account, user, server, cluster) and a checksum, so
//! the class of a key can be read off its public string.

use std::fmt;

use nkeys::KeyPairType;

use crate::error::ClaimsError;

/// The principal classes of the trust hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Root of trust; signs accounts
    Operator,
    /// Tenant; signs users and activations
    Account,
    /// Connecting client identity
    User,
    /// Broker server identity
    Server,
    /// Broker cluster identity
    Cluster,
}

impl KeyKind {
    /// Returns the lower-case name of the key class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Account => "account",
            Self::User => "user",
            Self::Server => "server",
            Self::Cluster => "cluster",
        }
    }

    /// Returns the class of a public key, or `None` if it is not a valid
    /// public key of one of the principal classes.
    ///
    /// # Example
    ///
    /// ```
    /// use broker_claims::{KeyKind, KeyPair};
    ///
    /// let account = KeyPair::generate(KeyKind::Account);
    /// assert_eq!(KeyKind::of(&account.public_key()), Some(KeyKind::Account));
    /// assert_eq!(KeyKind::of("not a key"), None);
    /// ```
    #[must_use]
    pub fn of(public_key: &str) -> Option<Self> {
        let kp = nkeys::KeyPair::from_public_key(public_key).ok()?;
        Self::from_pair_type(&kp.key_pair_type())
    }

    fn from_pair_type(kind: &KeyPairType) -> Option<Self> {
        match kind {
            KeyPairType::Operator => Some(Self::Operator),
            KeyPairType::Account => Some(Self::Account),
            KeyPairType::User => Some(Self::User),
            KeyPairType::Server => Some(Self::Server),
            KeyPairType::Cluster => Some(Self::Cluster),
            _ => None,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if `public_key` is a valid public key of class `kind`.
#[must_use]
pub fn is_valid_public_key(kind: KeyKind, public_key: &str) -> bool {
    KeyKind::of(public_key) == Some(kind)
}

/// Joins key classes for error messages: `"operator or account"`.
pub(crate) fn describe_kinds(kinds: &[KeyKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Verifies `signature` over `input` with the key named by `public_key`.
///
/// Any failure, including an undecodable key, is reported as
/// [`ClaimsError::SignatureInvalid`].
///
/// # Errors
///
/// Returns `ClaimsError::SignatureInvalid` if the signature does not verify.
pub fn verify_signature(
    public_key: &str,
    input: &[u8],
    signature: &[u8],
) -> Result<(), ClaimsError> {
    let kp = nkeys::KeyPair::from_public_key(public_key)
        .map_err(|_| ClaimsError::SignatureInvalid)?;
    kp.verify(input, signature)
        .map_err(|_| ClaimsError::SignatureInvalid)
}

/// A signing key pair for one principal.
///
/// # Example
///
/// ```
/// use broker_claims::{KeyKind, KeyPair};
///
/// let operator = KeyPair::generate(KeyKind::Operator);
/// assert!(operator.public_key().starts_with('O'));
///
/// let seed = operator.seed().unwrap();
/// let restored = KeyPair::from_seed(&seed).unwrap();
/// assert_eq!(restored.public_key(), operator.public_key());
/// ```
pub struct KeyPair {
    inner: nkeys::KeyPair,
}

impl KeyPair {
    /// Creates a new random key pair of the given class.
    #[must_use]
    pub fn generate(kind: KeyKind) -> Self {
        let inner = match kind {
            KeyKind::Operator => nkeys::KeyPair::new_operator(),
            KeyKind::Account => nkeys::KeyPair::new_account(),
            KeyKind::User => nkeys::KeyPair::new_user(),
            KeyKind::Server => nkeys::KeyPair::new_server(),
            KeyKind::Cluster => nkeys::KeyPair::new_cluster(),
        };
        Self { inner }
    }

    /// Restores a key pair from its encoded seed.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::InvalidKey` if the seed cannot be decoded.
    pub fn from_seed(seed: &str) -> Result<Self, ClaimsError> {
        nkeys::KeyPair::from_seed(seed)
            .map(|inner| Self { inner })
            .map_err(|e| ClaimsError::invalid_key(e.to_string()))
    }

    /// Creates a verify-only key pair from a public key.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::InvalidKey` if the public key cannot be decoded.
    pub fn from_public_key(public_key: &str) -> Result<Self, ClaimsError> {
        nkeys::KeyPair::from_public_key(public_key)
            .map(|inner| Self { inner })
            .map_err(|e| ClaimsError::invalid_key(e.to_string()))
    }

    /// Returns the principal class of this key, if it is one.
    #[must_use]
    pub fn kind(&self) -> Option<KeyKind> {
        KeyKind::from_pair_type(&self.inner.key_pair_type())
    }

    /// Returns the encoded public key.
    #[must_use]
    pub fn public_key(&self) -> String {
        self.inner.public_key()
    }

    /// Returns the encoded seed.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::InvalidKey` for verify-only key pairs.
    pub fn seed(&self) -> Result<String, ClaimsError> {
        self.inner
            .seed()
            .map_err(|e| ClaimsError::invalid_key(e.to_string()))
    }

    /// Signs `input`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::Signing` for verify-only key pairs.
    pub fn sign(&self, input: &[u8]) -> Result<Vec<u8>, ClaimsError> {
        self.inner.sign(input).map_err(|e| ClaimsError::Signing {
            reason: e.to_string(),
        })
    }

    /// Verifies `signature` over `input`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::SignatureInvalid` if the signature does not verify.
    pub fn verify(&self, input: &[u8], signature: &[u8]) -> Result<(), ClaimsError> {
        self.inner
            .verify(input, signature)
            .map_err(|_| ClaimsError::SignatureInvalid)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
