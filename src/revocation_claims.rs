//! Revocation claims: a signed statement that another token is revoked.

use serde::{Deserialize, Serialize};

use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext};
use crate::generic::GenericClaims;
use crate::keys::KeyKind;
use crate::validation::ValidationResults;

/// Payload of a revocation claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Revocation {
    /// The revoked token
    pub jwt: String,
    /// Why it was revoked
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// A revocation claim.
pub type RevocationClaims = Claims<Revocation>;

impl ClaimPayload for Revocation {
    const CLAIM_TYPE: ClaimType = ClaimType::Revocation;

    fn expected_issuers() -> &'static [KeyKind] {
        &[KeyKind::Operator, KeyKind::Account]
    }

    fn accepts_subject(subject: &str) -> bool {
        KeyKind::of(subject).is_some()
    }

    fn subject_description() -> &'static str {
        "public key"
    }

    fn validate(&self, data: &ClaimsData, _ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        if self.jwt.is_empty() {
            vr.add_error("revocation claim requires the jwt to revoke");
            return;
        }
        match GenericClaims::decode_without_time_checks(&self.jwt) {
            Ok(revoked) => {
                if revoked.data.issuer != data.issuer {
                    vr.add_error("revocation issuer does not match the issuer of the revoked jwt");
                }
            }
            Err(e) => vr.add_error(format!("revocation contains an invalid jwt: {e}")),
        }
    }
}

impl Claims<Revocation> {
    /// Builds an unsigned revocation of `jwt`, whose subject is `subject`.
    #[must_use]
    pub fn revoking(subject: impl Into<String>, jwt: impl Into<String>) -> Self {
        let mut claims = Self::new(subject);
        claims.payload.jwt = jwt.into();
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::user::UserClaims;

    const NOW: i64 = 1_700_000_000;

    fn validate(claims: &RevocationClaims) -> ValidationResults {
        let mut vr = ValidationResults::new();
        claims.validate_in(&ValidationContext::offline(NOW), &mut vr);
        vr
    }

    #[test]
    fn revokes_a_user_token() {
        let account = KeyPair::generate(KeyKind::Account);
        let user = KeyPair::generate(KeyKind::User);
        let user_jwt = UserClaims::new(user.public_key())
            .with_expires(NOW + 10)
            .encode_at(&account, NOW)
            .unwrap();

        let mut claims = RevocationClaims::revoking(user.public_key(), user_jwt);
        claims.payload.reason = "compromised".into();
        let token = claims.encode_at(&account, NOW).unwrap();
        let decoded = RevocationClaims::decode_at(&token, NOW).unwrap();
        assert_eq!(decoded.payload.reason, "compromised");
        assert!(validate(&decoded).is_empty());
    }

    #[test]
    fn jwt_is_required() {
        let claims = RevocationClaims::new(KeyPair::generate(KeyKind::User).public_key());
        assert!(validate(&claims).mentions("requires the jwt"));
    }

    #[test]
    fn garbage_jwt_is_rejected() {
        let claims =
            RevocationClaims::revoking(KeyPair::generate(KeyKind::User).public_key(), "a.b.c");
        assert!(validate(&claims).mentions("invalid jwt"));
    }

    #[test]
    fn issuer_must_match_revoked_token() {
        let account = KeyPair::generate(KeyKind::Account);
        let other = KeyPair::generate(KeyKind::Account);
        let user = KeyPair::generate(KeyKind::User);
        let user_jwt = UserClaims::new(user.public_key()).encode_at(&account, NOW).unwrap();

        let mut claims = RevocationClaims::revoking(user.public_key(), user_jwt);
        claims.encode_at(&other, NOW).unwrap();
        assert!(validate(&claims).mentions("does not match"));
    }
}
