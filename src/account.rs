//! Account claims.
//!
//! An account is the unit of isolation: it owns a subject namespace, shares
//! parts of it through [`Exports`], pulls in other accounts' subjects through
//! [`Imports`], and issues users either directly or through signing keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext, unix_now};
use crate::constants::ALL;
use crate::exports::Exports;
use crate::imports::Imports;
use crate::keys::{KeyKind, is_valid_public_key};
use crate::limits::OperatorLimits;
use crate::permission::Permissions;
use crate::revocation::RevocationList;
use crate::signing_keys::SigningKeys;
use crate::subject::Subject;
use crate::types::{Identity, Info, TagList};
use crate::user::UserClaims;
use crate::validation::ValidationResults;

/// Length of an encoded curve (xkey) public key.
const XKEY_LEN: usize = 56;

/// One destination of a subject mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedMapping {
    /// Destination subject
    pub subject: Subject,
    /// Share of traffic in percent; 0 means all of it
    #[serde(default, skip_serializing_if = "is_zero")]
    pub weight: u8,
    /// Restricts the mapping to one cluster
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(v: &u8) -> bool {
    *v == 0
}

impl WeightedMapping {
    /// Creates a mapping that takes all traffic.
    #[must_use]
    pub fn new(subject: impl Into<Subject>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Sets the weight in percent.
    #[must_use]
    pub const fn with_weight(mut self, weight: u8) -> Self {
        self.weight = weight;
        self
    }

    /// Restricts the mapping to `cluster`.
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Returns the effective weight: 0 counts as 100.
    #[must_use]
    pub fn effective_weight(&self) -> u32 {
        if self.weight == 0 {
            100
        } else {
            u32::from(self.weight)
        }
    }
}

/// Subject mappings, keyed by source subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mappings(BTreeMap<Subject, Vec<WeightedMapping>>);

impl Mappings {
    /// Appends destinations for `from`.
    pub fn add(&mut self, from: impl Into<Subject>, to: impl IntoIterator<Item = WeightedMapping>) {
        self.0.entry(from.into()).or_default().extend(to);
    }

    /// Returns the destinations of `from`.
    #[must_use]
    pub fn get(&self, from: &Subject) -> Option<&[WeightedMapping]> {
        self.0.get(from).map(Vec::as_slice)
    }

    /// Returns true if there are no mappings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validates subjects and checks that weights per source and cluster do
    /// not exceed 100 percent.
    pub fn validate(&self, vr: &mut ValidationResults) {
        for (from, destinations) in &self.0 {
            from.validate(vr);
            let mut totals: BTreeMap<&str, u32> = BTreeMap::new();
            for mapping in destinations {
                mapping.subject.validate(vr);
                if mapping.weight > 100 {
                    vr.add_error(format!(
                        "mapping {from} to {} has weight {} above 100",
                        mapping.subject, mapping.weight
                    ));
                }
                *totals.entry(mapping.cluster.as_str()).or_default() +=
                    mapping.effective_weight();
            }
            for (cluster, total) in totals {
                if total > 100 {
                    let scope = if cluster.is_empty() {
                        String::new()
                    } else {
                        format!(" in cluster {cluster:?}")
                    };
                    vr.add_error(format!(
                        "mapping {from}{scope} exceeds 100% among its weighted destinations"
                    ));
                }
            }
        }
    }
}

/// Delegates user authentication to an external service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalAuthorization {
    /// Users the authorization service connects as
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth_users: Vec<String>,
    /// Accounts the service may place users into; `*` for any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_accounts: Vec<String>,
    /// Curve key used to encrypt requests to the service
    #[serde(skip_serializing_if = "String::is_empty")]
    pub xkey: String,
}

impl ExternalAuthorization {
    /// Returns true if external authorization is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.auth_users.is_empty()
    }

    /// Returns true if nothing is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validates keys and their combination.
    pub fn validate(&self, vr: &mut ValidationResults) {
        for user in &self.auth_users {
            if !is_valid_public_key(KeyKind::User, user) {
                vr.add_error(format!("auth user {user:?} is not a valid user key"));
            }
        }
        for account in &self.allowed_accounts {
            if account != ALL && !is_valid_public_key(KeyKind::Account, account) {
                vr.add_error(format!(
                    "allowed account {account:?} is not a valid account key"
                ));
            }
        }
        if self.auth_users.is_empty() && !self.allowed_accounts.is_empty() {
            vr.add_error("external authorization cannot have accounts without users");
        }
        if !self.xkey.is_empty() && !(self.xkey.starts_with('X') && self.xkey.len() == XKEY_LEN) {
            vr.add_error(format!("xkey {:?} is not a valid curve key", self.xkey));
        }
    }
}

/// Payload of an account claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Subjects imported from other accounts
    #[serde(skip_serializing_if = "Imports::is_empty")]
    pub imports: Imports,
    /// Subjects shared with other accounts
    #[serde(skip_serializing_if = "Exports::is_empty")]
    pub exports: Exports,
    /// Limits set by the operator
    pub limits: OperatorLimits,
    /// Keys that may sign users on behalf of the account
    #[serde(skip_serializing_if = "SigningKeys::is_empty")]
    pub signing_keys: SigningKeys,
    /// Revoked users
    #[serde(skip_serializing_if = "RevocationList::is_empty")]
    pub revocations: RevocationList,
    /// Permissions for users that carry none
    #[serde(skip_serializing_if = "Permissions::is_empty")]
    pub default_permissions: Permissions,
    /// Subject mappings
    #[serde(skip_serializing_if = "Mappings::is_empty")]
    pub mappings: Mappings,
    /// External authorization
    #[serde(skip_serializing_if = "ExternalAuthorization::is_empty")]
    pub authorization: ExternalAuthorization,
    /// Identity proofs
    #[serde(rename = "identity", skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<Identity>,
    /// Description
    #[serde(flatten)]
    pub info: Info,
    /// Tags
    #[serde(skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
}

/// An account claim.
pub type AccountClaims = Claims<Account>;

impl ClaimPayload for Account {
    const CLAIM_TYPE: ClaimType = ClaimType::Account;

    fn expected_issuers() -> &'static [KeyKind] {
        &[KeyKind::Operator, KeyKind::Account]
    }

    fn accepts_subject(subject: &str) -> bool {
        is_valid_public_key(KeyKind::Account, subject)
    }

    fn subject_description() -> &'static str {
        "account key"
    }

    fn prepare(&mut self) {
        self.imports.sort();
        self.exports.sort();
    }

    fn validate(&self, data: &ClaimsData, ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        self.imports.validate(&data.subject, ctx, vr);
        self.exports.validate(vr);
        self.limits.validate(vr);

        let account_limits = &self.limits.account;
        if exceeds(account_limits.imports, self.imports.len()) {
            vr.add_error(format!(
                "the account contains more imports than allowed by the operator ({})",
                account_limits.imports
            ));
        }
        if exceeds(account_limits.exports, self.exports.len()) {
            vr.add_error(format!(
                "the account contains more exports than allowed by the operator ({})",
                account_limits.exports
            ));
        }
        if !account_limits.wildcards && self.exports.has_wildcards() {
            vr.add_error("the account does not allow wildcard exports");
        }

        self.signing_keys.validate(KeyKind::Account, vr);
        if self.signing_keys.contains(&data.subject) {
            vr.add_error("the account key cannot also be one of its signing keys");
        }
        self.default_permissions.validate(vr);
        self.mappings.validate(vr);
        self.authorization.validate(vr);
        for identity in &self.identities {
            identity.validate(vr);
        }
        self.info.validate(vr);

        if data.is_self_signed() {
            if !self.limits.is_unlimited() {
                vr.add_warning("self-signed account JWTs should not contain operator limits");
            }
            if !self.identities.is_empty() {
                vr.add_warning("self-signed account JWTs should not contain identity proofs");
            }
        }
    }
}

fn exceeds(limit: i64, count: usize) -> bool {
    limit >= 0 && i64::try_from(count).unwrap_or(i64::MAX) > limit
}

impl Claims<Account> {
    /// Returns true if the claim was issued by this account, directly or
    /// through one of its signing keys on its behalf.
    ///
    /// `issuer_account` is the account a user or activation names as its
    /// owner; pass an empty string for claims that carry none.
    #[must_use]
    pub fn did_sign(&self, issuer: &str, issuer_account: &str) -> bool {
        if issuer.is_empty() {
            return false;
        }
        if issuer == self.data.subject {
            return true;
        }
        issuer_account == self.data.subject && self.payload.signing_keys.contains(issuer)
    }

    /// Revokes every user with `public_key` issued before now.
    pub fn revoke(&mut self, public_key: impl Into<String>) {
        self.revoke_at(public_key, unix_now());
    }

    /// Revokes every user with `public_key` issued at or before `timestamp`.
    pub fn revoke_at(&mut self, public_key: impl Into<String>, timestamp: i64) {
        self.payload.revocations.revoke(public_key, timestamp);
    }

    /// Revokes every user issued at or before `timestamp`.
    pub fn revoke_all(&mut self, timestamp: i64) {
        self.payload.revocations.revoke(ALL, timestamp);
    }

    /// Removes the revocation of `public_key`.
    pub fn clear_revocation(&mut self, public_key: &str) {
        self.payload.revocations.clear_revocation(public_key);
    }

    /// Returns true if users with `public_key` issued at `timestamp` are revoked.
    #[must_use]
    pub fn is_revoked_at(&self, public_key: &str, timestamp: i64) -> bool {
        self.payload.revocations.is_revoked(public_key, timestamp)
    }

    /// Returns true if `user` is revoked. Claims without a subject or issue
    /// time are treated as revoked.
    #[must_use]
    pub fn is_claim_revoked(&self, user: &UserClaims) -> bool {
        if user.data.subject.is_empty() || user.data.issued_at == 0 {
            return true;
        }
        self.is_revoked_at(&user.data.subject, user.data.issued_at)
    }

    /// Adds a subject mapping.
    pub fn add_mapping(
        &mut self,
        from: impl Into<Subject>,
        to: impl IntoIterator<Item = WeightedMapping>,
    ) {
        self.payload.mappings.add(from, to);
    }

    /// Records errors if `user` was not legitimately signed for this account.
    ///
    /// A user signed by the account key itself must not name a different
    /// `issuer_account`. A user signed by a signing key must name this
    /// account as `issuer_account`, and a scoped key's template rules apply.
    pub fn validate_user_signer(&self, user: &UserClaims, vr: &mut ValidationResults) {
        let issuer = &user.data.issuer;
        let issuer_account = &user.payload.issuer_account;
        if *issuer == self.data.subject {
            if !issuer_account.is_empty() && *issuer_account != self.data.subject {
                vr.add_error(format!(
                    "user issuer_account {issuer_account:?} does not match the signing account"
                ));
            }
            return;
        }
        if !self.payload.signing_keys.contains(issuer) {
            vr.add_error(format!(
                "user issuer {issuer:?} is not the account or one of its signing keys"
            ));
            return;
        }
        if *issuer_account != self.data.subject {
            vr.add_error(format!(
                "user signed by a signing key must set issuer_account to {:?}",
                self.data.subject
            ));
        }
        if let Some(scope) = self.payload.signing_keys.scope(issuer) {
            scope.validate_user(user, vr);
        }
    }
}
