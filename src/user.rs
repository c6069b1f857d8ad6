//! User claims.

use serde::{Deserialize, Serialize};

use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext};
use crate::constants::CONNECTION_TYPES;
use crate::keys::{KeyKind, is_valid_public_key};
use crate::limits::Limits;
use crate::permission::Permissions;
use crate::types::TagList;
use crate::validation::ValidationResults;

/// Permissions and limits of a user; also the template of a user scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPermissionLimits {
    /// Publish, subscribe and response permissions
    #[serde(flatten)]
    pub permissions: Permissions,
    /// Connection and message limits
    #[serde(flatten)]
    pub limits: Limits,
    /// Whether the token alone authenticates, without proof of key possession
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bearer_token: bool,
    /// Connection types the user may use; empty allows all
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_connection_types: Vec<String>,
}

impl UserPermissionLimits {
    /// Validates permissions, limits and connection types.
    pub fn validate(&self, vr: &mut ValidationResults) {
        self.permissions.validate(vr);
        self.limits.validate(vr);
        for kind in &self.allowed_connection_types {
            if !CONNECTION_TYPES.contains(&kind.as_str()) {
                vr.add_error(format!("unknown connection type {kind:?}"));
            }
        }
    }
}

/// Payload of a user claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    /// Permissions and limits
    #[serde(flatten)]
    pub permission_limits: UserPermissionLimits,
    /// The account, when the user was signed by one of its signing keys
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issuer_account: String,
    /// Tags
    #[serde(skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
}

/// A user claim.
pub type UserClaims = Claims<User>;

impl ClaimPayload for User {
    const CLAIM_TYPE: ClaimType = ClaimType::User;

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
        self.permission_limits.validate(vr);
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

impl Claims<User> {
    /// Returns true if the user sets no permissions or limits of its own.
    #[must_use]
    pub fn has_empty_permissions(&self) -> bool {
        self.payload.permission_limits == UserPermissionLimits::default()
    }

    /// Returns true if the token authenticates on its own.
    #[must_use]
    pub fn is_bearer(&self) -> bool {
        self.payload.permission_limits.bearer_token
    }

    /// Returns the account the user belongs to: `issuer_account` when set,
    /// otherwise the issuer.
    #[must_use]
    pub fn issuing_account(&self) -> &str {
        if self.payload.issuer_account.is_empty() {
            &self.data.issuer
        } else {
            &self.payload.issuer_account
        }
    }
}
