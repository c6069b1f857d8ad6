//! The signed claims envelope.
//!
//! Every claim is a [`Claims<T>`]: the shared [`ClaimsData`] fields flattened
//! into the payload JSON, plus a kind-specific payload `T` nested under the
//! `nats` key. A token is `header.payload.signature`, each segment base64url
//! without padding, with the signature computed over the payload segment.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::encoding::{decode_segment, encode_segment, hash_id};
use crate::error::ClaimsError;
use crate::header::Header;
use crate::imports::{ActivationFetcher, NoFetch, default_fetcher};
use crate::keys::{KeyKind, KeyPair, describe_kinds, verify_signature};
use crate::validation::ValidationResults;

/// Returns the current Unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Discriminant stored in the `type` field of every claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClaimType {
    /// Operator claim
    Operator,
    /// Account claim
    Account,
    /// User claim
    User,
    /// Server claim
    Server,
    /// Cluster claim
    Cluster,
    /// Activation claim for an import
    Activation,
    /// Revocation claim
    Revocation,
    /// Claim with an untyped payload
    #[default]
    Generic,
    /// Request sent to an external authorization service
    AuthorizationRequest,
    /// Response from an external authorization service
    AuthorizationResponse,
    /// A kind this library does not know
    Other(String),
}

impl ClaimType {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Operator => "operator",
            Self::Account => "account",
            Self::User => "user",
            Self::Server => "server",
            Self::Cluster => "cluster",
            Self::Activation => "activation",
            Self::Revocation => "revocation",
            Self::Generic => "generic",
            Self::AuthorizationRequest => "authorization_request",
            Self::AuthorizationResponse => "authorization_response",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ClaimType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "operator" => Self::Operator,
            "account" => Self::Account,
            "user" => Self::User,
            "server" => Self::Server,
            "cluster" => Self::Cluster,
            "activation" => Self::Activation,
            "revocation" => Self::Revocation,
            "generic" | "" => Self::Generic,
            "authorization_request" => Self::AuthorizationRequest,
            "authorization_response" => Self::AuthorizationResponse,
            _ => Self::Other(s),
        }
    }
}

impl From<ClaimType> for String {
    fn from(t: ClaimType) -> Self {
        match t {
            ClaimType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Fields shared by every claim kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimsData {
    /// Content hash of the claim, set by encode
    #[serde(rename = "jti", skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Issue time in Unix seconds, set by encode
    #[serde(rename = "iat", skip_serializing_if = "is_zero")]
    pub issued_at: i64,
    /// Public key of the signer, set by encode
    #[serde(rename = "iss", skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    /// Display name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Public key of the principal the claim describes
    #[serde(rename = "sub", skip_serializing_if = "String::is_empty")]
    pub subject: String,
    /// Intended audience
    #[serde(rename = "aud", skip_serializing_if = "String::is_empty")]
    pub audience: String,
    /// Expiry in Unix seconds; 0 never expires
    #[serde(rename = "exp", skip_serializing_if = "is_zero")]
    pub expires: i64,
    /// Start of validity in Unix seconds; 0 is valid immediately
    #[serde(rename = "nbf", skip_serializing_if = "is_zero")]
    pub not_before: i64,
    /// Claim kind
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
}

impl ClaimsData {
    /// Returns true if the claim is signed by the principal it describes.
    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        !self.issuer.is_empty() && self.issuer == self.subject
    }

    /// Checks the validity window at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::Expired` or `ClaimsError::NotYetValid`.
    pub fn check_time(&self, now: i64) -> Result<(), ClaimsError> {
        if self.expires > 0 && now > self.expires {
            return Err(ClaimsError::Expired {
                expires: self.expires,
            });
        }
        if self.not_before > 0 && self.not_before > now {
            return Err(ClaimsError::NotYetValid {
                not_before: self.not_before,
            });
        }
        Ok(())
    }

    /// Records time-check issues for the validity window at `now`.
    pub fn validate_times(&self, now: i64, vr: &mut ValidationResults) {
        if self.expires > 0 && now > self.expires {
            vr.add_time_check("claim is expired");
        }
        if self.not_before > 0 && self.not_before > now {
            vr.add_time_check("claim is not yet valid");
        }
    }
}

/// Everything a payload validator may need besides the claim itself.
pub struct ValidationContext<'a> {
    /// Resolves activation tokens given as URLs
    pub fetcher: &'a dyn ActivationFetcher,
    /// Current Unix time
    pub now: i64,
    /// Whether expiry and not-before are reported
    pub time_checks: bool,
}

static NO_FETCH: NoFetch = NoFetch;

impl<'a> ValidationContext<'a> {
    /// Creates a context with time checks enabled.
    #[must_use]
    pub fn new(fetcher: &'a dyn ActivationFetcher, now: i64) -> Self {
        Self {
            fetcher,
            now,
            time_checks: true,
        }
    }

    /// Enables or disables time checks.
    #[must_use]
    pub const fn with_time_checks(mut self, enabled: bool) -> Self {
        self.time_checks = enabled;
        self
    }
}

impl ValidationContext<'static> {
    /// Creates a context that never fetches activation URLs.
    #[must_use]
    pub fn offline(now: i64) -> Self {
        Self::new(&NO_FETCH, now)
    }
}

impl fmt::Debug for ValidationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("now", &self.now)
            .field("time_checks", &self.time_checks)
            .finish_non_exhaustive()
    }
}

/// The kind-specific part of a claim.
pub trait ClaimPayload:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + fmt::Debug
{
    /// The discriminant written to `type`.
    const CLAIM_TYPE: ClaimType;

    /// Key classes allowed to sign this kind. Empty means any key.
    fn expected_issuers() -> &'static [KeyKind];

    /// Returns true if `subject` is an acceptable subject for this kind.
    fn accepts_subject(subject: &str) -> bool;

    /// Describes acceptable subjects for error messages.
    fn subject_description() -> &'static str;

    /// Normalizes the payload before it is hashed and signed.
    fn prepare(&mut self) {}

    /// Records kind-specific validation issues.
    fn validate(&self, data: &ClaimsData, ctx: &ValidationContext<'_>, vr: &mut ValidationResults);
}

/// A claim: shared envelope fields plus a typed payload.
///
/// # Example
///
/// ```
/// use broker_claims::{AccountClaims, KeyKind, KeyPair};
///
/// let operator = KeyPair::generate(KeyKind::Operator);
/// let account = KeyPair::generate(KeyKind::Account);
///
/// let mut claims = AccountClaims::new(account.public_key()).with_name("billing");
/// let token = claims.encode(&operator).unwrap();
///
/// let decoded = AccountClaims::decode(&token).unwrap();
/// assert_eq!(decoded.data.name, "billing");
/// assert_eq!(decoded.data.issuer, operator.public_key());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: ClaimPayload")]
pub struct Claims<T> {
    /// Envelope fields
    #[serde(flatten)]
    pub data: ClaimsData,
    /// Kind-specific payload
    #[serde(rename = "nats", default)]
    pub payload: T,
}

impl<T: ClaimPayload> Claims<T> {
    /// Creates an unsigned claim about `subject` with a default payload.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            data: ClaimsData {
                subject: subject.into(),
                claim_type: T::CLAIM_TYPE,
                ..ClaimsData::default()
            },
            payload: T::default(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.data.name = name.into();
        self
    }

    /// Sets the expiry in Unix seconds.
    #[must_use]
    pub fn with_expires(mut self, expires: i64) -> Self {
        self.data.expires = expires;
        self
    }

    /// Sets the start of validity in Unix seconds.
    #[must_use]
    pub fn with_not_before(mut self, not_before: i64) -> Self {
        self.data.not_before = not_before;
        self
    }

    /// Sets the audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.data.audience = audience.into();
        self
    }

    /// Returns the claim kind.
    #[must_use]
    pub fn claim_type(&self) -> &ClaimType {
        &self.data.claim_type
    }

    /// Signs the claim with `key_pair` at the current time.
    ///
    /// Sets `iss`, `iat` and `jti` as a side effect.
    ///
    /// # Errors
    ///
    /// See [`encode_at`](Self::encode_at).
    pub fn encode(&mut self, key_pair: &KeyPair) -> Result<String, ClaimsError> {
        self.encode_at(key_pair, unix_now())
    }

    /// Signs the claim with `key_pair`, treating `now` as the current time.
    ///
    /// # Errors
    ///
    /// - `InvalidSubject` if the subject is not acceptable for this kind
    /// - `UntrustedIssuer` if `key_pair` may not sign this kind
    /// - `Expired` if the claim is already expired at `now`
    /// - `Signing` or `Serialization` if the token cannot be produced
    pub fn encode_at(&mut self, key_pair: &KeyPair, now: i64) -> Result<String, ClaimsError> {
        if !T::accepts_subject(&self.data.subject) {
            return Err(ClaimsError::InvalidSubject {
                subject: self.data.subject.clone(),
                expected: T::subject_description().to_string(),
            });
        }
        let issuer = key_pair.public_key();
        Self::check_issuer(&issuer)?;
        if self.data.expires > 0 && now > self.data.expires {
            return Err(ClaimsError::Expired {
                expires: self.data.expires,
            });
        }

        self.payload.prepare();
        if T::CLAIM_TYPE != ClaimType::Generic {
            self.data.claim_type = T::CLAIM_TYPE;
        }
        self.data.issuer = issuer;
        self.data.issued_at = now;
        self.data.id.clear();
        self.data.id = hash_id(&serde_json::to_vec(self)?);

        let header = encode_segment(&serde_json::to_vec(&Header::new())?);
        let payload = encode_segment(&serde_json::to_vec(self)?);
        let signature = encode_segment(&key_pair.sign(payload.as_bytes())?);

        tracing::trace!(
            claim_type = %self.data.claim_type,
            issuer = %self.data.issuer,
            subject = %self.data.subject,
            "encoded claim"
        );
        Ok(format!("{header}.{payload}.{signature}"))
    }

    /// Decodes and verifies a token at the current time.
    ///
    /// # Errors
    ///
    /// See [`decode_at`](Self::decode_at).
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        Self::decode_at(token, unix_now())
    }

    /// Decodes and verifies a token, treating `now` as the current time.
    ///
    /// Checks run in order and the first failure is returned:
    /// segment count, header, payload shape and kind, validity window,
    /// signature, issuer class.
    ///
    /// # Errors
    ///
    /// `MalformedToken`, `UnsupportedHeader`, `ClaimTypeMismatch`, `Expired`,
    /// `NotYetValid`, `SignatureInvalid` or `UntrustedIssuer`.
    pub fn decode_at(token: &str, now: i64) -> Result<Self, ClaimsError> {
        Self::decode_inner(token, Some(now))
    }

    /// Decodes and verifies a token without checking its validity window.
    ///
    /// # Errors
    ///
    /// As [`decode_at`](Self::decode_at), minus the time checks.
    pub fn decode_without_time_checks(token: &str) -> Result<Self, ClaimsError> {
        Self::decode_inner(token, None)
    }

    fn decode_inner(token: &str, now: Option<i64>) -> Result<Self, ClaimsError> {
        Self::verify_token(token, now)
            .inspect(|claims| {
                tracing::trace!(
                    claim_type = %claims.data.claim_type,
                    issuer = %claims.data.issuer,
                    "decoded claim"
                );
            })
            .inspect_err(|e| {
                let expected = T::CLAIM_TYPE;
                tracing::debug!(%expected, error = %e, "rejected token");
            })
    }

    fn verify_token(token: &str, now: Option<i64>) -> Result<Self, ClaimsError> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(ClaimsError::malformed(format!(
                "expected 3 chunks, got {}",
                parts.len()
            )));
        };

        Header::parse(header)?;

        let value: serde_json::Value = serde_json::from_slice(&decode_segment(payload)?)
            .map_err(|e| ClaimsError::malformed(format!("invalid payload: {e}")))?;
        let found = crate::generic::claim_type_of(&value);
        if T::CLAIM_TYPE != ClaimType::Generic && found != T::CLAIM_TYPE {
            return Err(ClaimsError::ClaimTypeMismatch {
                expected: T::CLAIM_TYPE.to_string(),
                found: found.to_string(),
            });
        }
        let claims: Self = serde_json::from_value(value)
            .map_err(|e| ClaimsError::malformed(format!("invalid payload: {e}")))?;

        if let Some(now) = now {
            claims.data.check_time(now)?;
        }

        let signature = decode_segment(signature)?;
        verify_signature(&claims.data.issuer, payload.as_bytes(), &signature)?;
        Self::check_issuer(&claims.data.issuer)?;
        Ok(claims)
    }

    fn check_issuer(issuer: &str) -> Result<(), ClaimsError> {
        let expected = T::expected_issuers();
        if expected.is_empty() {
            return Ok(());
        }
        match KeyKind::of(issuer) {
            Some(kind) if expected.contains(&kind) => Ok(()),
            _ => Err(ClaimsError::UntrustedIssuer {
                issuer: issuer.to_string(),
                expected: describe_kinds(expected),
            }),
        }
    }

    /// Collects validation issues using the default configuration.
    pub fn validate(&self, vr: &mut ValidationResults) {
        self.validate_with(&ValidationConfig::default(), vr);
    }

    /// Collects validation issues using `config`.
    ///
    /// Activation URLs are resolved with a blocking HTTP client, so call this
    /// from a blocking thread when inside an async runtime.
    pub fn validate_with(&self, config: &ValidationConfig, vr: &mut ValidationResults) {
        let fetcher = default_fetcher(config);
        let ctx = ValidationContext::new(fetcher.as_ref(), unix_now())
            .with_time_checks(config.time_checks);
        self.validate_in(&ctx, vr);
    }

    /// Collects validation issues with an explicit context.
    pub fn validate_in(&self, ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        if ctx.time_checks {
            self.data.validate_times(ctx.now, vr);
        }
        if !T::accepts_subject(&self.data.subject) {
            vr.add_error(format!(
                "subject {:?} is not a valid {}",
                self.data.subject,
                T::subject_description()
            ));
        }
        self.payload.validate(&self.data, ctx, vr);
    }
}

impl<T: ClaimPayload> fmt::Display for Claims<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
