//! Subjects an account offers to other accounts.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::activation::ActivationClaims;
use crate::encoding::duration_nanos;
use crate::revocation::RevocationList;
use crate::subject::Subject;
use crate::types::Info;
use crate::validation::ValidationResults;

/// Whether an export is a stream (fan-out) or a service (request/reply).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExportType {
    /// Messages published on the subject are delivered to the importer
    Stream,
    /// Requests from the importer are answered by the exporter
    Service,
    /// Anything else; always invalid
    Unknown(String),
}

impl Default for ExportType {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl ExportType {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stream => "stream",
            Self::Service => "service",
            Self::Unknown(s) if s.is_empty() => "unknown",
            Self::Unknown(s) => s,
        }
    }

    /// Returns true for `stream` and `service`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Stream | Self::Service)
    }
}

impl From<String> for ExportType {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "stream" => Self::Stream,
            "service" => Self::Service,
            _ => Self::Unknown(s),
        }
    }
}

impl From<ExportType> for String {
    fn from(t: ExportType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many responses a service sends per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseType {
    /// Exactly one response
    Singleton,
    /// Any number of responses
    Stream,
    /// A response split into chunks
    Chunked,
    /// Unrecognized response type
    Other(String),
}

impl ResponseType {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Singleton => "Singleton",
            Self::Stream => "Stream",
            Self::Chunked => "Chunked",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResponseType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Singleton" => Self::Singleton,
            "Stream" => Self::Stream,
            "Chunked" => Self::Chunked,
            _ => Self::Other(s),
        }
    }
}

impl From<ResponseType> for String {
    fn from(t: ResponseType) -> Self {
        t.as_str().to_string()
    }
}

/// Latency sampling rate for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Sample when the request carries tracing headers
    Headers,
    /// Sample this percentage of requests
    Percent(i64),
}

impl Serialize for Sampling {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Headers => s.serialize_str("headers"),
            Self::Percent(p) => s.serialize_i64(*p),
        }
    }
}

impl<'de> Deserialize<'de> for Sampling {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Percent(i64),
            Text(String),
        }

        match Raw::deserialize(d)? {
            Raw::Percent(p) => Ok(Self::Percent(p)),
            Raw::Text(s) if s.eq_ignore_ascii_case("headers") => Ok(Self::Headers),
            Raw::Text(s) => s
                .trim_end_matches('%')
                .parse()
                .map(Self::Percent)
                .map_err(|_| serde::de::Error::custom(format!("invalid sampling {s:?}"))),
        }
    }
}

/// Latency tracking configuration for a service export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLatency {
    /// Sampling rate
    pub sampling: Sampling,
    /// Subject latency measurements are published to
    pub results: Subject,
}

impl ServiceLatency {
    /// Records errors for an out-of-range rate or a wildcard results subject.
    pub fn validate(&self, vr: &mut ValidationResults) {
        if let Sampling::Percent(p) = self.sampling
            && !(1..=100).contains(&p)
        {
            vr.add_error(format!("sampling percentage {p} needs to be between 1 and 100"));
        }
        self.results.validate(vr);
        if self.results.has_wildcards() {
            vr.add_error("latency tracking results subject cannot contain wildcards");
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

/// A subject offered to other accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Export {
    /// Display name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Exported subject
    pub subject: Subject,
    /// Stream or service
    #[serde(rename = "type")]
    pub kind: ExportType,
    /// Whether importers need an activation token
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub token_req: bool,
    /// Revoked activations, keyed by importing account
    #[serde(skip_serializing_if = "RevocationList::is_empty")]
    pub revocations: RevocationList,
    /// Response cardinality, services only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    /// How long responses are allowed, services only
    #[serde(with = "duration_nanos", skip_serializing_if = "duration_nanos::is_zero")]
    pub response_threshold: Duration,
    /// Latency tracking, services only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_latency: Option<ServiceLatency>,
    /// 1-based position of the `*` token that must hold the importer's key
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub account_token_position: u32,
    /// Whether the export is listed publicly
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub advertise: bool,
    /// Description
    #[serde(flatten)]
    pub info: Info,
}

impl Export {
    /// Creates an export of `kind` on `subject`.
    #[must_use]
    pub fn new(subject: impl Into<Subject>, kind: ExportType) -> Self {
        Self {
            subject: subject.into(),
            kind,
            ..Self::default()
        }
    }

    /// Creates a stream export.
    #[must_use]
    pub fn stream(subject: impl Into<Subject>) -> Self {
        Self::new(subject, ExportType::Stream)
    }

    /// Creates a service export.
    #[must_use]
    pub fn service(subject: impl Into<Subject>) -> Self {
        Self::new(subject, ExportType::Service)
    }

    /// Returns true for service exports.
    #[must_use]
    pub fn is_service(&self) -> bool {
        self.kind == ExportType::Service
    }

    /// Returns true for stream exports.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        self.kind == ExportType::Stream
    }

    /// Records the issues of this export alone.
    pub fn validate(&self, vr: &mut ValidationResults) {
        if !self.kind.is_valid() {
            vr.add_error(format!("invalid export type: {:?}", self.kind.as_str()));
        }
        self.subject.validate(vr);
        if self.is_service() && self.subject.has_wildcards() {
            vr.add_warning(format!(
                "services cannot have wildcard subject: {:?}",
                self.subject.as_str()
            ));
        }
        if let Some(latency) = &self.service_latency {
            if self.is_service() {
                latency.validate(vr);
            } else {
                vr.add_error("latency tracking only permitted for services");
            }
        }
        if self.response_type.is_some() && !self.is_service() {
            vr.add_error("response type only permitted for services");
        }
        if !self.response_threshold.is_zero() && !self.is_service() {
            vr.add_error("response threshold only permitted for services");
        }
        self.validate_account_token_position(vr);
        self.info.validate(vr);
    }

    fn validate_account_token_position(&self, vr: &mut ValidationResults) {
        let position = self.account_token_position;
        if position == 0 {
            return;
        }
        if !self.subject.has_wildcards() {
            vr.add_error(format!(
                "account token position can only be used with wildcard subjects: {:?}",
                self.subject.as_str()
            ));
            return;
        }
        let index = usize::try_from(position - 1).unwrap_or(usize::MAX);
        match self.subject.tokens().nth(index) {
            None => vr.add_error(format!(
                "account token position {position} exceeds length of subject {:?}",
                self.subject.as_str()
            )),
            Some("*") => {}
            Some(token) => vr.add_error(format!(
                "account token position {position} matches {token:?} but must match a '*' in {:?}",
                self.subject.as_str()
            )),
        }
    }

    /// Revokes activations for `account` issued at or before `timestamp`.
    pub fn revoke_at(&mut self, account: impl Into<String>, timestamp: i64) {
        self.revocations.revoke(account, timestamp);
    }

    /// Removes the revocation for `account`.
    pub fn clear_revocation(&mut self, account: &str) {
        self.revocations.clear_revocation(account);
    }

    /// Returns true if activations for `account` issued at `timestamp` are revoked.
    #[must_use]
    pub fn is_revoked_at(&self, account: &str, timestamp: i64) -> bool {
        self.revocations.is_revoked(account, timestamp)
    }

    /// Returns true if the activation is revoked, or too incomplete to check.
    #[must_use]
    pub fn is_claim_revoked(&self, claim: &ActivationClaims) -> bool {
        if claim.data.issued_at == 0 || claim.data.subject.is_empty() {
            return true;
        }
        self.is_revoked_at(&claim.data.subject, claim.data.issued_at)
    }
}

/// The exports of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Exports(Vec<Export>);

impl Exports {
    /// Appends exports.
    pub fn add(&mut self, exports: impl IntoIterator<Item = Export>) {
        self.0.extend(exports);
    }

    /// Returns the number of exports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no exports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the exports.
    pub fn iter(&self) -> std::slice::Iter<'_, Export> {
        self.0.iter()
    }

    /// Iterates mutably over the exports.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Export> {
        self.0.iter_mut()
    }

    /// Sorts by subject so the encoded form is stable.
    pub fn sort(&mut self) {
        self.0
            .sort_by(|a, b| a.subject.cmp(&b.subject).then_with(|| a.kind.cmp(&b.kind)));
    }

    /// Returns true if any export's subject contains `subject`.
    #[must_use]
    pub fn has_export_containing(&self, subject: &Subject) -> bool {
        self.0.iter().any(|e| subject.is_contained_in(&e.subject))
    }

    /// Returns true if any export uses a wildcard subject.
    #[must_use]
    pub fn has_wildcards(&self) -> bool {
        self.0.iter().any(|e| e.subject.has_wildcards())
    }

    /// Validates every export, then reports each export whose subject
    /// contains another export of the same type.
    ///
    /// One issue is raised per containing subject, however many exports it
    /// covers.
    pub fn validate(&self, vr: &mut ValidationResults) {
        for export in &self.0 {
            export.validate(vr);
        }
        for kind in [ExportType::Stream, ExportType::Service] {
            let subjects: Vec<&Subject> = self
                .0
                .iter()
                .filter(|e| e.kind == kind)
                .map(|e| &e.subject)
                .collect();
            let mut containing: BTreeMap<&Subject, &Subject> = BTreeMap::new();
            for (i, inner) in subjects.iter().enumerate() {
                for (j, outer) in subjects.iter().enumerate() {
                    if i != j && inner.is_contained_in(outer) {
                        containing.entry(*outer).or_insert(*inner);
                    }
                }
            }
            for (outer, inner) in containing {
                vr.add_error(format!(
                    "{kind} export subject \"{outer}\" already exports \"{inner}\""
                ));
            }
        }
    }
}

impl<'a> IntoIterator for &'a Exports {
    type Item = &'a Export;
    type IntoIter = std::slice::Iter<'a, Export>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(exports: Vec<Export>) -> ValidationResults {
        let mut list = Exports::default();
        list.add(exports);
        let mut vr = ValidationResults::new();
        list.validate(&mut vr);
        vr
    }

    #[test]
    fn same_type_overlap_is_one_error() {
        let vr = validate(vec![Export::stream("bar.foo"), Export::stream("bar.*")]);
        assert_eq!(vr.len(), 1);
        assert!(vr.is_blocking(false));
        assert!(vr.mentions("already exports"));
    }

    #[test]
    fn one_error_per_containing_subject() {
        let vr = validate(vec![
            Export::stream("bar.foo"),
            Export::stream("bar.baz"),
            Export::stream("bar.*"),
        ]);
        assert_eq!(vr.len(), 1, "{vr:?}");
        assert_eq!(
            vr.issues()[0].description,
            "stream export subject \"bar.*\" already exports \"bar.foo\""
        );

        let vr = validate(vec![Export::stream("bar"), Export::stream("bar")]);
        assert_eq!(vr.len(), 1, "{vr:?}");
    }

    #[test]
    fn different_types_may_overlap() {
        let vr = validate(vec![Export::service("bar.foo"), Export::stream("bar.foo")]);
        assert!(vr.is_empty(), "{vr:?}");
    }

    #[test]
    fn disjoint_exports_are_fine() {
        let vr = validate(vec![Export::stream("a.>"), Export::stream("b.>")]);
        assert!(vr.is_empty());
    }

    #[test]
    fn wildcard_service_is_a_warning() {
        let vr = validate(vec![Export::service("svc.*")]);
        assert_eq!(vr.len(), 1);
        assert!(!vr.is_blocking(true));
    }

    #[test]
    fn invalid_type_is_an_error() {
        let vr = validate(vec![Export::new("a", ExportType::Unknown("queue".into()))]);
        assert!(vr.mentions("invalid export type"));
    }

    #[test]
    fn latency_only_on_services() {
        let latency = ServiceLatency {
            sampling: Sampling::Percent(50),
            results: Subject::from("latency.results"),
        };
        let mut stream = Export::stream("a");
        stream.service_latency = Some(latency.clone());
        assert!(validate(vec![stream]).mentions("only permitted for services"));

        let mut service = Export::service("b");
        service.service_latency = Some(latency);
        assert!(validate(vec![service]).is_empty());
    }

    #[test]
    fn latency_sampling_bounds() {
        for (sampling, ok) in [
            (Sampling::Percent(0), false),
            (Sampling::Percent(1), true),
            (Sampling::Percent(100), true),
            (Sampling::Percent(101), false),
            (Sampling::Headers, true),
        ] {
            let mut vr = ValidationResults::new();
            ServiceLatency {
                sampling,
                results: Subject::from("r"),
            }
            .validate(&mut vr);
            assert_eq!(vr.is_empty(), ok, "{sampling:?}");
        }
    }

    #[test]
    fn sampling_wire_format() {
        assert_eq!(serde_json::to_string(&Sampling::Headers).unwrap(), "\"headers\"");
        assert_eq!(serde_json::to_string(&Sampling::Percent(20)).unwrap(), "20");
        let parsed: Sampling = serde_json::from_str("\"Headers\"").unwrap();
        assert_eq!(parsed, Sampling::Headers);
        let parsed: Sampling = serde_json::from_str("\"35%\"").unwrap();
        assert_eq!(parsed, Sampling::Percent(35));
    }

    #[test]
    fn response_settings_only_on_services() {
        let mut stream = Export::stream("a");
        stream.response_type = Some(ResponseType::Stream);
        stream.response_threshold = Duration::from_secs(1);
        let vr = validate(vec![stream]);
        assert_eq!(vr.errors().len(), 2);
    }

    #[test]
    fn account_token_position() {
        let mut export = Export::service("req.*.data");
        export.account_token_position = 2;
        let vr = validate(vec![export.clone()]);
        assert!(!vr.is_blocking(false), "{vr:?}");

        export.account_token_position = 1;
        assert!(validate(vec![export.clone()]).mentions("must match a '*'"));

        export.account_token_position = 4;
        assert!(validate(vec![export]).mentions("exceeds length"));

        let mut plain = Export::stream("a.b");
        plain.account_token_position = 1;
        assert!(validate(vec![plain]).mentions("wildcard subjects"));
    }

    #[test]
    fn sort_orders_by_subject() {
        let mut exports = Exports::default();
        exports.add([Export::stream("b"), Export::stream("a")]);
        exports.sort();
        let subjects: Vec<_> = exports.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["a", "b"]);
    }

    #[test]
    fn export_wire_format() {
        let mut export = Export::service("svc");
        export.token_req = true;
        export.info.description = "billing".into();
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["type"], "service");
        assert_eq!(json["token_req"], true);
        assert_eq!(json["description"], "billing");
        assert!(json.get("advertise").is_none());
        assert!(json.get("response_threshold").is_none());

        let back: Export = serde_json::from_value(json).unwrap();
        assert_eq!(back, export);
    }

    #[test]
    fn export_revocations() {
        let mut export = Export::stream("a");
        export.revoke_at("ACCT", 100);
        assert!(export.is_revoked_at("ACCT", 100));
        assert!(!export.is_revoked_at("ACCT", 101));
        export.clear_revocation("ACCT");
        assert!(!export.is_revoked_at("ACCT", 0));
    }
}
