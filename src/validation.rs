//! Collector for semantic validation issues.
//!
//! Decoding a token only proves it is well formed, signed by the issuer it
//! names and inside its validity window. Policy checks (overlapping exports,
//! malformed CIDR blocks, limit overruns, ...) are reported here instead, so
//! the caller decides which issues matter.

use std::fmt;

/// A single problem found while validating claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Human-readable description
    pub description: String,
    /// Whether the issue invalidates the claim
    pub blocking: bool,
    /// Whether the issue concerns the claim's validity window
    pub time_check: bool,
}

impl ValidationIssue {
    /// Creates a blocking issue.
    #[must_use]
    pub fn error(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            blocking: true,
            time_check: false,
        }
    }

    /// Creates a non-blocking issue.
    #[must_use]
    pub fn warning(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            blocking: false,
            time_check: false,
        }
    }

    /// Creates a time-window issue, blocking only when time checks are requested.
    #[must_use]
    pub fn time_check(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            blocking: false,
            time_check: true,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl std::error::Error for ValidationIssue {}

/// Ordered list of validation issues.
///
/// # Example
///
/// ```
/// use broker_claims::ValidationResults;
///
/// let mut vr = ValidationResults::new();
/// vr.add_time_check("claim is expired");
/// assert!(!vr.is_blocking(false));
/// assert!(vr.is_blocking(true));
///
/// vr.add_error("invalid cidr");
/// assert!(vr.is_blocking(false));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResults {
    issues: Vec<ValidationIssue>,
}

impl ValidationResults {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an issue.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Appends a blocking issue.
    pub fn add_error(&mut self, description: impl Into<String>) {
        self.add(ValidationIssue::error(description));
    }

    /// Appends a non-blocking issue.
    pub fn add_warning(&mut self, description: impl Into<String>) {
        self.add(ValidationIssue::warning(description));
    }

    /// Appends a time-window issue.
    pub fn add_time_check(&mut self, description: impl Into<String>) {
        self.add(ValidationIssue::time_check(description));
    }

    /// Returns true if no issues were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns the number of recorded issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns all issues in the order they were recorded.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Returns true if any issue is blocking, or if `include_time_checks` is
    /// set and any issue concerns the validity window.
    #[must_use]
    pub fn is_blocking(&self, include_time_checks: bool) -> bool {
        self.issues
            .iter()
            .any(|i| i.blocking || (include_time_checks && i.time_check))
    }

    /// Returns the blocking issues.
    #[must_use]
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.blocking).collect()
    }

    /// Returns the descriptions of non-blocking issues, time checks included.
    #[must_use]
    pub fn warnings(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| !i.blocking)
            .map(|i| i.description.as_str())
            .collect()
    }

    /// Returns true if any issue description contains `needle`.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.issues.iter().any(|i| i.description.contains(needle))
    }
}

impl<'a> IntoIterator for &'a ValidationResults {
    type Item = &'a ValidationIssue;
    type IntoIter = std::slice::Iter<'a, ValidationIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_results_do_not_block() {
        let vr = ValidationResults::new();
        assert!(vr.is_empty());
        assert!(!vr.is_blocking(true));
        assert!(!vr.is_blocking(false));
    }

    #[test]
    fn warnings_never_block() {
        let mut vr = ValidationResults::new();
        vr.add_warning("services cannot have wildcard subject");
        assert!(!vr.is_blocking(true));
        assert_eq!(vr.warnings(), vec!["services cannot have wildcard subject"]);
        assert!(vr.errors().is_empty());
    }

    #[test]
    fn time_checks_block_only_when_requested() {
        let mut vr = ValidationResults::new();
        vr.add_time_check("claim is expired");
        assert!(vr.is_blocking(true));
        assert!(!vr.is_blocking(false));
    }

    #[test]
    fn errors_always_block() {
        let mut vr = ValidationResults::new();
        vr.add_error("bad cidr");
        assert!(vr.is_blocking(false));
        assert_eq!(vr.errors().len(), 1);
        assert_eq!(vr.errors()[0].to_string(), "bad cidr");
    }

    #[test]
    fn issues_keep_insertion_order() {
        let mut vr = ValidationResults::new();
        vr.add_warning("first");
        vr.add_error("second");
        vr.add_time_check("third");
        let descriptions: Vec<_> = vr.into_iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["first", "second", "third"]);
        assert_eq!(vr.len(), 3);
        assert!(vr.mentions("sec"));
    }
}
