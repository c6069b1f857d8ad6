//! Operator claims: the root of trust.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext};
use crate::keys::{KeyKind, is_valid_public_key};
use crate::signing_keys::SigningKeys;
use crate::types::{Identity, TagList};
use crate::validation::ValidationResults;

/// URL schemes accepted for operator service URLs.
const SERVICE_SCHEMES: &[&str] = &["nats", "tls", "ws", "wss"];

/// Payload of an operator claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Operator {
    /// Operator keys that may sign accounts
    #[serde(skip_serializing_if = "SigningKeys::is_empty")]
    pub signing_keys: SigningKeys,
    /// Base URL of the account resolver
    #[serde(skip_serializing_if = "String::is_empty")]
    pub account_server_url: String,
    /// Client URLs of the operator's servers
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operator_service_urls: Vec<String>,
    /// The account used for system traffic
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system_account: String,
    /// Minimum server version, `major.minor.patch`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assert_server_version: String,
    /// Accounts must be signed with a signing key rather than the operator key
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strict_signing_key_usage: bool,
    /// Identity proofs
    #[serde(rename = "identity", skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<Identity>,
    /// Tags
    #[serde(skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
}

/// An operator claim.
pub type OperatorClaims = Claims<Operator>;

impl ClaimPayload for Operator {
    const CLAIM_TYPE: ClaimType = ClaimType::Operator;

    fn expected_issuers() -> &'static [KeyKind] {
        &[KeyKind::Operator]
    }

    fn accepts_subject(subject: &str) -> bool {
        is_valid_public_key(KeyKind::Operator, subject)
    }

    fn subject_description() -> &'static str {
        "operator key"
    }

    fn validate(&self, _data: &ClaimsData, _ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        self.signing_keys.validate(KeyKind::Operator, vr);
        if !self.account_server_url.is_empty() {
            check_url(
                "account server url",
                &self.account_server_url,
                &["http", "https"],
                vr,
            );
        }
        for url in &self.operator_service_urls {
            check_url("operator service url", url, SERVICE_SCHEMES, vr);
        }
        if !self.system_account.is_empty()
            && !is_valid_public_key(KeyKind::Account, &self.system_account)
        {
            vr.add_error(format!(
                "system account {:?} is not a valid account key",
                self.system_account
            ));
        }
        if !self.assert_server_version.is_empty()
            && parse_version(&self.assert_server_version).is_none()
        {
            vr.add_error(format!(
                "assert_server_version {:?} is not of the form major.minor.patch",
                self.assert_server_version
            ));
        }
        if self.strict_signing_key_usage && self.signing_keys.is_empty() {
            vr.add_warning("strict signing key usage is enabled but no signing keys are set");
        }
        for identity in &self.identities {
            identity.validate(vr);
        }
    }
}

fn check_url(what: &str, raw: &str, schemes: &[&str], vr: &mut ValidationResults) {
    match Url::parse(raw) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => vr.add_error(format!(
            "{what} {raw:?} has unsupported scheme {:?}",
            url.scheme()
        )),
        Err(e) => vr.add_error(format!("{what} {raw:?} is invalid: {e}")),
    }
}

/// Parses `major.minor.patch` into its numeric parts.
fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.split('.').map(str::parse::<u32>);
    let major = parts.next()?.ok()?;
    let minor = parts.next()?.ok()?;
    let patch = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

impl Claims<Operator> {
    /// Returns true if `issuer` is the operator key or one of its signing keys.
    #[must_use]
    pub fn did_sign(&self, issuer: &str) -> bool {
        !issuer.is_empty()
            && (issuer == self.data.subject || self.payload.signing_keys.contains(issuer))
    }

    /// Adds a signing key.
    pub fn add_signing_key(&mut self, public_key: impl Into<String>) {
        self.payload.signing_keys.add([public_key]);
    }
}
