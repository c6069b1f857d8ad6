//! Claims exchanged with an external authorization service.
//!
//! A server sends an [`AuthorizationRequest`] describing a connecting client;
//! the service answers with an [`AuthorizationResponse`] carrying either a
//! user token for the client or an error.

use serde::{Deserialize, Serialize};

use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext};
use crate::keys::{KeyKind, is_valid_public_key};
use crate::types::TagList;
use crate::validation::ValidationResults;

/// Identifies the server asking for authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerId {
    /// Server name
    pub name: String,
    /// Host the server runs on
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    /// Server public key
    pub id: String,
    /// Server version
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Cluster name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cluster: String,
    /// Server tags
    #[serde(skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
    /// Curve key for encrypted responses
    #[serde(rename = "xkey", skip_serializing_if = "String::is_empty")]
    pub xkey: String,
}

/// What the server knows about the connecting client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInformation {
    /// Client address
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    /// Connection id
    #[serde(skip_serializing_if = "is_zero")]
    pub id: u64,
    /// Public key the client connected with
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Client name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Client tags
    #[serde(skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
    /// Name tag of the client
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name_tag: String,
    /// Connection kind
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Client type
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub client_type: String,
    /// Nonce the client was challenged with
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nonce: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Options the client sent in its connect message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// User token presented by the client
    #[serde(skip_serializing_if = "String::is_empty")]
    pub jwt: String,
    /// Public key presented by the client
    #[serde(skip_serializing_if = "String::is_empty")]
    pub nkey: String,
    /// Signature over the nonce
    #[serde(rename = "sig", skip_serializing_if = "String::is_empty")]
    pub signed_nonce: String,
    /// Opaque token
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_token: String,
    /// User name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Password
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pass: String,
    /// Client name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Client library language
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lang: String,
    /// Client library version
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Protocol version
    pub protocol: i32,
}

/// Payload of an authorization request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationRequest {
    /// The asking server
    #[serde(rename = "server_id")]
    pub server: ServerId,
    /// Key the server generated for the client's user claim
    pub user_nkey: String,
    /// The connecting client
    pub client_info: ClientInformation,
    /// The client's connect options
    pub connect_opts: ConnectOptions,
    /// Nonce of the request
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_nonce: String,
    /// Tags
    #[serde(skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
}

/// An authorization request claim.
pub type AuthorizationRequestClaims = Claims<AuthorizationRequest>;

impl ClaimPayload for AuthorizationRequest {
    const CLAIM_TYPE: ClaimType = ClaimType::AuthorizationRequest;

    fn expected_issuers() -> &'static [KeyKind] {
        &[KeyKind::Server]
    }

    fn accepts_subject(subject: &str) -> bool {
        is_valid_public_key(KeyKind::User, subject)
    }

    fn subject_description() -> &'static str {
        "user key"
    }

    fn validate(&self, data: &ClaimsData, _ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        if self.server.id.is_empty() {
            vr.add_error("authorization request requires the server id");
        }
        if self.user_nkey.is_empty() {
            vr.add_error("authorization request requires the user nkey");
        } else if self.user_nkey != data.subject {
            vr.add_error("authorization request user nkey does not match the subject");
        }
    }
}

/// Payload of an authorization response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationResponse {
    /// User token for the client
    #[serde(skip_serializing_if = "String::is_empty")]
    pub jwt: String,
    /// Why the client was rejected
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Account on whose behalf a signing key issued the response
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issuer_account: String,
}

/// An authorization response claim.
pub type AuthorizationResponseClaims = Claims<AuthorizationResponse>;

impl ClaimPayload for AuthorizationResponse {
    const CLAIM_TYPE: ClaimType = ClaimType::AuthorizationResponse;

    fn expected_issuers() -> &'static [KeyKind] {
        &[KeyKind::Account]
    }

    fn accepts_subject(subject: &str) -> bool {
        is_valid_public_key(KeyKind::User, subject)
    }

    fn subject_description() -> &'static str {
        "user key"
    }

    fn validate(&self, _data: &ClaimsData, _ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        match (self.jwt.is_empty(), self.error.is_empty()) {
            (true, true) => vr.add_error("authorization response requires a jwt or an error"),
            (false, false) => {
                vr.add_error("authorization response cannot carry both a jwt and an error");
            }
            _ => {}
        }
        if !self.issuer_account.is_empty()
            && !is_valid_public_key(KeyKind::Account, &self.issuer_account)
        {
            vr.add_error(format!(
                "issuer_account {:?} is not a valid account key",
                self.issuer_account
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::user::UserClaims;

    const NOW: i64 = 1_700_000_000;

    fn validate<T: ClaimPayload>(claims: &Claims<T>) -> ValidationResults {
        let mut vr = ValidationResults::new();
        claims.validate_in(&ValidationContext::offline(NOW), &mut vr);
        vr
    }

    #[test]
    fn request_round_trip() {
        let server = KeyPair::generate(KeyKind::Server);
        let user = KeyPair::generate(KeyKind::User);
        let mut claims = AuthorizationRequestClaims::new(user.public_key());
        claims.payload.server.id = server.public_key();
        claims.payload.server.name = "n1".into();
        claims.payload.user_nkey = user.public_key();
        claims.payload.connect_opts.user = "alice".into();
        claims.payload.connect_opts.protocol = 1;

        let token = claims.encode_at(&server, NOW).unwrap();
        let decoded = AuthorizationRequestClaims::decode_at(&token, NOW).unwrap();
        assert_eq!(decoded.payload, claims.payload);
        assert!(validate(&decoded).is_empty());

        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(json["type"], "authorization_request");
        assert_eq!(json["nats"]["server_id"]["name"], "n1");
    }

    #[test]
    fn request_requires_server_and_user() {
        let user = KeyPair::generate(KeyKind::User);
        let claims = AuthorizationRequestClaims::new(user.public_key());
        let vr = validate(&claims);
        assert_eq!(vr.errors().len(), 2);
    }

    #[test]
    fn only_servers_send_requests() {
        let user = KeyPair::generate(KeyKind::User);
        let mut claims = AuthorizationRequestClaims::new(user.public_key());
        assert!(claims.encode_at(&KeyPair::generate(KeyKind::Account), NOW).is_err());
    }

    #[test]
    fn response_carries_jwt_or_error() {
        let account = KeyPair::generate(KeyKind::Account);
        let user = KeyPair::generate(KeyKind::User);
        let user_jwt = UserClaims::new(user.public_key()).encode_at(&account, NOW).unwrap();

        let mut claims = AuthorizationResponseClaims::new(user.public_key());
        assert!(validate(&claims).mentions("requires a jwt or an error"));

        claims.payload.jwt = user_jwt;
        assert!(validate(&claims).is_empty());

        claims.payload.error = "denied".into();
        assert!(validate(&claims).mentions("cannot carry both"));

        claims.payload.jwt.clear();
        let token = claims.encode_at(&account, NOW).unwrap();
        let decoded = AuthorizationResponseClaims::decode_at(&token, NOW).unwrap();
        assert_eq!(decoded.payload.error, "denied");
    }
}
