//! Untyped claims and kind-dispatching decode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::account::AccountClaims;
use crate::activation::ActivationClaims;
use crate::authorization::{AuthorizationRequestClaims, AuthorizationResponseClaims};
use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext};
use crate::cluster::ClusterClaims;
use crate::encoding::decode_segment;
use crate::error::ClaimsError;
use crate::keys::KeyKind;
use crate::operator::OperatorClaims;
use crate::revocation_claims::RevocationClaims;
use crate::server::ServerClaims;
use crate::user::UserClaims;
use crate::validation::ValidationResults;

/// A payload kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenericPayload(pub Map<String, Value>);

impl GenericPayload {
    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// A claim of any kind, with the payload left untyped.
pub type GenericClaims = Claims<GenericPayload>;

impl ClaimPayload for GenericPayload {
    const CLAIM_TYPE: ClaimType = ClaimType::Generic;

    fn expected_issuers() -> &'static [KeyKind] {
        &[]
    }

    fn accepts_subject(_subject: &str) -> bool {
        true
    }

    fn subject_description() -> &'static str {
        "subject"
    }

    fn validate(&self, _data: &ClaimsData, _ctx: &ValidationContext<'_>, _vr: &mut ValidationResults) {}
}

/// Reads the claim kind from a decoded payload.
///
/// The kind lives in the top-level `type` field; a missing field means a
/// generic claim.
pub(crate) fn claim_type_of(payload: &Value) -> ClaimType {
    payload
        .get("type")
        .and_then(Value::as_str)
        .map_or(ClaimType::Generic, |t| ClaimType::from(t.to_string()))
}

/// Reads the claim kind of `token` without verifying it.
///
/// # Errors
///
/// Returns `ClaimsError::MalformedToken` if the token does not have three
/// segments or the payload is not JSON.
pub fn peek_claim_type(token: &str) -> Result<ClaimType, ClaimsError> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClaimsError::malformed("expected 3 chunks"));
    };
    let value: Value = serde_json::from_slice(&decode_segment(payload)?)
        .map_err(|e| ClaimsError::malformed(format!("invalid payload: {e}")))?;
    Ok(claim_type_of(&value))
}

/// Decodes and verifies a token of any kind without enforcing issuer classes.
///
/// # Errors
///
/// As [`Claims::decode`], minus `UntrustedIssuer` and `ClaimTypeMismatch`.
pub fn decode_generic(token: &str) -> Result<GenericClaims, ClaimsError> {
    GenericClaims::decode(token)
}

/// A decoded claim of whichever kind the token declares.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyClaims {
    /// Operator claim
    Operator(OperatorClaims),
    /// Account claim
    Account(AccountClaims),
    /// User claim
    User(UserClaims),
    /// Server claim
    Server(ServerClaims),
    /// Cluster claim
    Cluster(ClusterClaims),
    /// Activation claim
    Activation(ActivationClaims),
    /// Revocation claim
    Revocation(RevocationClaims),
    /// Authorization request
    AuthorizationRequest(AuthorizationRequestClaims),
    /// Authorization response
    AuthorizationResponse(AuthorizationResponseClaims),
    /// Generic or unknown kind
    Generic(GenericClaims),
}

macro_rules! dispatch {
    ($self:expr, $claims:ident => $body:expr) => {
        match $self {
            AnyClaims::Operator($claims) => $body,
            AnyClaims::Account($claims) => $body,
            AnyClaims::User($claims) => $body,
            AnyClaims::Server($claims) => $body,
            AnyClaims::Cluster($claims) => $body,
            AnyClaims::Activation($claims) => $body,
            AnyClaims::Revocation($claims) => $body,
            AnyClaims::AuthorizationRequest($claims) => $body,
            AnyClaims::AuthorizationResponse($claims) => $body,
            AnyClaims::Generic($claims) => $body,
        }
    };
}

impl AnyClaims {
    /// Returns the envelope fields.
    #[must_use]
    pub fn data(&self) -> &ClaimsData {
        dispatch!(self, c => &c.data)
    }

    /// Returns the claim kind.
    #[must_use]
    pub fn claim_type(&self) -> &ClaimType {
        &self.data().claim_type
    }

    /// Collects validation issues with an explicit context.
    pub fn validate_in(&self, ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        dispatch!(self, c => c.validate_in(ctx, vr));
    }

    /// Collects validation issues using the default configuration.
    pub fn validate(&self, vr: &mut ValidationResults) {
        dispatch!(self, c => c.validate(vr));
    }
}

/// Decodes and verifies a token of any kind.
///
/// The `type` field is read first, then the token is decoded as that kind
/// with all of its checks. Unknown kinds decode as [`GenericClaims`].
///
/// # Errors
///
/// As [`Claims::decode`] for the declared kind.
pub fn decode_any(token: &str) -> Result<AnyClaims, ClaimsError> {
    Ok(match peek_claim_type(token)? {
        ClaimType::Operator => AnyClaims::Operator(OperatorClaims::decode(token)?),
        ClaimType::Account => AnyClaims::Account(AccountClaims::decode(token)?),
        ClaimType::User => AnyClaims::User(UserClaims::decode(token)?),
        ClaimType::Server => AnyClaims::Server(ServerClaims::decode(token)?),
        ClaimType::Cluster => AnyClaims::Cluster(ClusterClaims::decode(token)?),
        ClaimType::Activation => AnyClaims::Activation(ActivationClaims::decode(token)?),
        ClaimType::Revocation => AnyClaims::Revocation(RevocationClaims::decode(token)?),
        ClaimType::AuthorizationRequest => {
            AnyClaims::AuthorizationRequest(AuthorizationRequestClaims::decode(token)?)
        }
        ClaimType::AuthorizationResponse => {
            AnyClaims::AuthorizationResponse(AuthorizationResponseClaims::decode(token)?)
        }
        ClaimType::Generic | ClaimType::Other(_) => AnyClaims::Generic(GenericClaims::decode(token)?),
    })
}
