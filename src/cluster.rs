//! Cluster claims.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext};
use crate::keys::{KeyKind, is_valid_public_key};
use crate::validation::ValidationResults;

/// Payload of a cluster claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    /// Operators the cluster trusts
    #[serde(rename = "identity", alias = "trust", skip_serializing_if = "Vec::is_empty")]
    pub trust: Vec<String>,
    /// Accounts hosted by the cluster
    #[serde(rename = "accts", skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<String>,
    /// Account resolver URL
    #[serde(rename = "accturl", skip_serializing_if = "String::is_empty")]
    pub account_url: String,
    /// Operator resolver URL
    #[serde(rename = "opurl", skip_serializing_if = "String::is_empty")]
    pub operator_url: String,
}

/// A cluster claim.
pub type ClusterClaims = Claims<Cluster>;

impl ClaimPayload for Cluster {
    const CLAIM_TYPE: ClaimType = ClaimType::Cluster;

    fn expected_issuers() -> &'static [KeyKind] {
        &[KeyKind::Operator]
    }

    fn accepts_subject(subject: &str) -> bool {
        is_valid_public_key(KeyKind::Cluster, subject)
    }

    fn subject_description() -> &'static str {
        "cluster key"
    }

    fn validate(&self, _data: &ClaimsData, _ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        for key in &self.trust {
            if !is_valid_public_key(KeyKind::Operator, key) {
                vr.add_error(format!("trusted key {key:?} is not a valid operator key"));
            }
        }
        for key in &self.accounts {
            if !is_valid_public_key(KeyKind::Account, key) {
                vr.add_error(format!("cluster account {key:?} is not a valid account key"));
            }
        }
        for (what, raw) in [("account url", &self.account_url), ("operator url", &self.operator_url)] {
            if !raw.is_empty()
                && let Err(e) = Url::parse(raw)
            {
                vr.add_error(format!("{what} {raw:?} is invalid: {e}"));
            }
        }
    }
}
