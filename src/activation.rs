//! Activation claims: an exporting account authorizing an import.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext};
use crate::constants::{PUBLIC, WILDCARD_PLACEHOLDER};
use crate::error::ClaimsError;
use crate::exports::ExportType;
use crate::keys::{KeyKind, is_valid_public_key};
use crate::subject::Subject;
use crate::types::TagList;
use crate::validation::ValidationResults;

/// Payload of an activation claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Activation {
    /// The exported subject the subject account may import
    #[serde(rename = "subject")]
    pub import_subject: Subject,
    /// Stream or service
    #[serde(rename = "type")]
    pub import_type: ExportType,
    /// The exporting account, when signed with one of its signing keys
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issuer_account: String,
    /// Tags
    #[serde(skip_serializing_if = "TagList::is_empty")]
    pub tags: TagList,
}

/// An activation claim.
pub type ActivationClaims = Claims<Activation>;

impl ClaimPayload for Activation {
    const CLAIM_TYPE: ClaimType = ClaimType::Activation;

    fn expected_issuers() -> &'static [KeyKind] {
        &[KeyKind::Account, KeyKind::Operator]
    }

    fn accepts_subject(subject: &str) -> bool {
        subject == PUBLIC || is_valid_public_key(KeyKind::Account, subject)
    }

    fn subject_description() -> &'static str {
        "account or \"public\""
    }

    fn validate(&self, _data: &ClaimsData, _ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        if !self.import_type.is_valid() {
            vr.add_error(format!(
                "invalid activation import type: {:?}",
                self.import_type.as_str()
            ));
        }
        self.import_subject.validate(vr);
        if !self.issuer_account.is_empty()
            && !is_valid_public_key(KeyKind::Account, &self.issuer_account)
        {
            vr.add_error(format!(
                "activation issuer_account {:?} is not a valid account key",
                self.issuer_account
            ));
        }
    }
}

impl Claims<Activation> {
    /// Returns the account that granted the activation: `issuer_account`
    /// when set, otherwise the issuer.
    #[must_use]
    pub fn issuing_account(&self) -> &str {
        if self.payload.issuer_account.is_empty() {
            &self.data.issuer
        } else {
            &self.payload.issuer_account
        }
    }

    /// Returns a stable identifier for the activation without exposing the token.
    ///
    /// Activations for the same issuer, subject and exported subject family
    /// share an id: wildcard tails are stripped, so `foo.*` and `foo.>` hash
    /// alike while `foo.bar` does not.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::MissingField` if the issuer, subject or exported
    /// subject is empty.
    pub fn hash_id(&self) -> Result<String, ClaimsError> {
        if self.data.issuer.is_empty() {
            return Err(ClaimsError::MissingField { field: "iss" });
        }
        if self.data.subject.is_empty() {
            return Err(ClaimsError::MissingField { field: "sub" });
        }
        if self.payload.import_subject.is_empty() {
            return Err(ClaimsError::MissingField { field: "subject" });
        }
        let base = format!(
            "{}.{}.{}",
            self.data.issuer,
            self.data.subject,
            clean_subject(&self.payload.import_subject)
        );
        Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(base.as_bytes())))
    }
}

fn clean_subject(subject: &Subject) -> String {
    let tokens: Vec<&str> = subject.tokens().collect();
    match tokens.iter().position(|t| *t == "*" || *t == ">") {
        Some(0) => WILDCARD_PLACEHOLDER.to_string(),
        Some(i) => tokens[..i].join("."),
        None => subject.as_str().to_string(),
    }
}
