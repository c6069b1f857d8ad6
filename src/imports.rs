//! Subjects an account consumes from other accounts.
//!
//! An import names the exporting account and subject and, for exports that
//! require it, carries an activation token: either the token itself or a URL
//! it can be fetched from. Fetching is done through an [`ActivationFetcher`]
//! so validation can run offline or against a test double.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::activation::ActivationClaims;
use crate::claims::ValidationContext;
use crate::config::ValidationConfig;
use crate::constants::PUBLIC;
use crate::exports::ExportType;
use crate::keys::{KeyKind, is_valid_public_key};
use crate::subject::{RenamingSubject, Subject};
use crate::validation::ValidationResults;

/// Errors returned by an [`ActivationFetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The fetcher does not resolve URLs at all.
    #[error("activation fetching is disabled; cannot resolve {url}")]
    Disabled {
        /// The URL that was requested
        url: String,
    },
    /// The request failed or returned an error status.
    #[error("failed to fetch {url}: {reason}")]
    Http {
        /// The URL that was requested
        url: String,
        /// Description of the failure
        reason: String,
    },
    /// The body exceeded the configured size cap.
    #[error("activation body from {url} exceeds {limit} bytes")]
    TooLarge {
        /// The URL that was requested
        url: String,
        /// The configured cap
        limit: usize,
    },
    /// The body is not UTF-8 text.
    #[error("activation body from {url} is not valid text")]
    InvalidBody {
        /// The URL that was requested
        url: String,
    },
}

/// Resolves activation token URLs.
///
/// Implementations are called synchronously from validation and must bound
/// their own running time.
pub trait ActivationFetcher: Send + Sync {
    /// Returns the body served at `url`.
    ///
    /// # Errors
    ///
    /// Returns a `FetchError` if the body cannot be retrieved.
    fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// A fetcher that refuses every URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetch;

impl ActivationFetcher for NoFetch {
    fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        Err(FetchError::Disabled {
            url: url.to_string(),
        })
    }
}

/// Fetches activation tokens over HTTP with a blocking client.
///
/// The client is built once and reused for every fetch. It blocks the
/// calling thread, and reqwest panics if a blocking client is created or
/// used from inside an async runtime; from async code, run validation on a
/// blocking thread (for example `tokio::task::spawn_blocking`).
#[cfg(feature = "http-fetch")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    max_bytes: usize,
}

#[cfg(feature = "http-fetch")]
impl HttpFetcher {
    /// Creates a fetcher bounded by the timeout and size cap in `config`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be initialized.
    pub fn new(config: &ValidationConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                reason: format!("cannot build http client: {e}"),
            })?;
        Ok(Self {
            client,
            max_bytes: config.max_fetch_bytes,
        })
    }
}

#[cfg(feature = "http-fetch")]
impl ActivationFetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        use std::io::Read;

        let http_error = |reason: String| FetchError::Http {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| http_error(e.to_string()))?;

        let limit = u64::try_from(self.max_bytes).unwrap_or(u64::MAX);
        let mut body = Vec::new();
        response
            .take(limit.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|e| http_error(e.to_string()))?;
        if body.len() > self.max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_bytes,
            });
        }
        String::from_utf8(body).map_err(|_| FetchError::InvalidBody {
            url: url.to_string(),
        })
    }
}

/// Returns the fetcher validation uses when none is supplied.
///
/// With the `http-fetch` feature this is an [`HttpFetcher`], falling back to
/// [`NoFetch`] if the client cannot be built; otherwise URLs are never
/// resolved.
#[must_use]
pub fn default_fetcher(config: &ValidationConfig) -> Box<dyn ActivationFetcher> {
    #[cfg(feature = "http-fetch")]
    {
        match HttpFetcher::new(config) {
            Ok(fetcher) => Box::new(fetcher),
            Err(e) => {
                tracing::warn!(error = %e, "activation urls will not be resolved");
                Box::new(NoFetch)
            }
        }
    }
    #[cfg(not(feature = "http-fetch"))]
    {
        let _ = config;
        Box::new(NoFetch)
    }
}

/// A subject imported from another account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Import {
    /// Display name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Subject as exported by the other account
    pub subject: Subject,
    /// Public key of the exporting account
    pub account: String,
    /// Activation token, or a URL serving it
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Deprecated prefix remapping; use `local_subject`
    #[serde(skip_serializing_if = "Subject::is_empty")]
    pub to: Subject,
    /// Local name of the imported subject
    #[serde(skip_serializing_if = "RenamingSubject::is_empty")]
    pub local_subject: RenamingSubject,
    /// Stream or service
    #[serde(rename = "type")]
    pub kind: ExportType,
    /// Share response latency data with the exporter, services only
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub share: bool,
}

impl Import {
    /// Creates an import of `subject` from `account`.
    #[must_use]
    pub fn new(account: impl Into<String>, subject: impl Into<Subject>, kind: ExportType) -> Self {
        Self {
            account: account.into(),
            subject: subject.into(),
            kind,
            ..Self::default()
        }
    }

    /// Returns true for service imports.
    #[must_use]
    pub fn is_service(&self) -> bool {
        self.kind == ExportType::Service
    }

    /// Returns true for stream imports.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        self.kind == ExportType::Stream
    }

    /// Returns the subject the import appears under locally.
    #[must_use]
    pub fn local(&self) -> Subject {
        if self.local_subject.is_empty() {
            if self.to.is_empty() {
                self.subject.clone()
            } else {
                self.to.clone()
            }
        } else {
            self.local_subject.to_subject()
        }
    }

    /// Records the issues of this import for the account `importer`.
    ///
    /// Resolves and checks the activation token, fetching it through
    /// `ctx.fetcher` when it is a URL.
    pub fn validate(&self, importer: &str, ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        if !self.kind.is_valid() {
            vr.add_error(format!("invalid import type: {:?}", self.kind.as_str()));
        }
        if self.account.is_empty() {
            vr.add_warning("account to import from is not specified");
        } else if !is_valid_public_key(KeyKind::Account, &self.account) {
            vr.add_error(format!(
                "account to import from {:?} is not a valid account key",
                self.account
            ));
        }

        self.subject.validate(vr);
        if self.is_service() && self.subject.has_wildcards() {
            vr.add_error(format!(
                "services cannot import wildcard subject: {:?}",
                self.subject.as_str()
            ));
        }
        if !self.to.is_empty() {
            if self.is_service() {
                vr.add_error("service imports cannot use 'to'; use local_subject");
            } else {
                vr.add_warning("'to' is deprecated; use local_subject");
                if self.to.has_wildcards() {
                    vr.add_error(format!(
                        "stream import 'to' cannot contain wildcards: {:?}",
                        self.to.as_str()
                    ));
                }
            }
            if !self.local_subject.is_empty() {
                vr.add_error("'to' and local_subject are mutually exclusive");
            }
        }
        if !self.local_subject.is_empty() {
            self.local_subject.validate(&self.subject, vr);
        }
        if self.share && !self.is_service() {
            vr.add_error("only service imports may share response latency");
        }

        if let Some(activation) = self.resolve_activation(ctx, vr) {
            self.check_activation(&activation, importer, vr);
        }
    }

    fn resolve_activation(
        &self,
        ctx: &ValidationContext<'_>,
        vr: &mut ValidationResults,
    ) -> Option<ActivationClaims> {
        let token = self.token.trim();
        if token.is_empty() {
            return None;
        }

        let fetched;
        let token = if token.starts_with("http://") || token.starts_with("https://") {
            let url = match Url::parse(token) {
                Ok(url) => url,
                Err(e) => {
                    vr.add_warning(format!(
                        "import {:?} contains an unparsable token URL {token:?}: {e}",
                        self.subject.as_str()
                    ));
                    return None;
                }
            };
            match ctx.fetcher.fetch(&url) {
                Ok(body) => {
                    fetched = body;
                    fetched.trim()
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "activation token unreachable");
                    vr.add_warning(format!(
                        "import {:?} contains an unreachable token URL: {e}",
                        self.subject.as_str()
                    ));
                    return None;
                }
            }
        } else {
            token
        };

        let decoded = if ctx.time_checks {
            ActivationClaims::decode_at(token, ctx.now)
        } else {
            ActivationClaims::decode_without_time_checks(token)
        };
        decoded
            .inspect_err(|e| {
                vr.add_warning(format!(
                    "import {:?} contains an invalid activation token: {e}",
                    self.subject.as_str()
                ));
            })
            .ok()
    }

    fn check_activation(&self, activation: &ActivationClaims, importer: &str, vr: &mut ValidationResults) {
        let issuing_account = activation.issuing_account();
        if issuing_account != self.account {
            vr.add_error(format!(
                "activation token issuer {issuing_account:?} does not match import account {:?}",
                self.account
            ));
        }
        let subject = activation.data.subject.as_str();
        if subject != importer && subject != PUBLIC {
            vr.add_error(format!(
                "activation token subject {subject:?} does not match importing account {importer:?}"
            ));
        }
        if activation.payload.import_type != self.kind {
            vr.add_error(format!(
                "activation token type {} does not match import type {}",
                activation.payload.import_type, self.kind
            ));
        }
        if !self.subject.is_contained_in(&activation.payload.import_subject) {
            vr.add_error(format!(
                "activation token import subject {:?} does not contain import subject {:?}",
                activation.payload.import_subject.as_str(),
                self.subject.as_str()
            ));
        }
    }
}

/// The imports of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Imports(Vec<Import>);

impl Imports {
    /// Appends imports.
    pub fn add(&mut self, imports: impl IntoIterator<Item = Import>) {
        self.0.extend(imports);
    }

    /// Returns the number of imports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no imports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the imports.
    pub fn iter(&self) -> std::slice::Iter<'_, Import> {
        self.0.iter()
    }

    /// Sorts by subject so the encoded form is stable.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| {
            a.subject
                .cmp(&b.subject)
                .then_with(|| a.account.cmp(&b.account))
        });
    }

    /// Validates every import and reports service imports whose local
    /// subjects overlap.
    pub fn validate(&self, importer: &str, ctx: &ValidationContext<'_>, vr: &mut ValidationResults) {
        let mut locals: Vec<Subject> = Vec::new();
        for import in &self.0 {
            if import.is_service() {
                let local = import.local();
                for seen in &locals {
                    if local.overlaps(seen) {
                        vr.add_error(format!(
                            "overlapping subject namespace for \"{local}\" and \"{seen}\""
                        ));
                    }
                }
                locals.push(local);
            }
            import.validate(importer, ctx, vr);
        }
    }
}

impl<'a> IntoIterator for &'a Imports {
    type Item = &'a Import;
    type IntoIter = std::slice::Iter<'a, Import>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
