//! Server claims.

use serde::{Deserialize, Serialize};

use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext};
use crate::keys::{KeyKind, is_valid_public_key};
use crate::types::TagList;
use crate::validation::ValidationResults;

/// Payload of a server claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    /// Cluster the server belongs to
    pub cluster: String,
    /// Tags
    #[serde(skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
}

/// A server claim.
pub type ServerClaims = Claims<Server>;

impl ClaimPayload for Server {
    const CLAIM_TYPE: ClaimType = ClaimType::Server;

    fn expected_issuers() -> &'static [KeyKind] {
        &[KeyKind::Operator, KeyKind::Cluster]
    }

    fn accepts_subject(subject: &str) -> bool {
        is_valid_public_key(KeyKind::Server, subject)
    }

    fn subject_description() -> &'static str {
        "server key"
    }

    fn validate(&self, _data: &ClaimsData, _ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        if self.cluster.is_empty() {
            vr.add_error("servers must be assigned to a cluster");
        }
    }
}
