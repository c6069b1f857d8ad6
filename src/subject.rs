//! Hierarchical messaging subjects and wildcard matching.
//!
//! A subject is a `.`-separated list of tokens. Patterns may use `*` to match
//! exactly one token and a trailing `>` to match one or more remaining tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationResults;

const SEPARATOR: char = '.';
const SINGLE_WILDCARD: &str = "*";
const FULL_WILDCARD: &str = ">";

/// A subject or subject pattern.
///
/// # Example
///
/// ```
/// use broker_claims::Subject;
///
/// let subject = Subject::from("one.two.three");
/// assert!(subject.is_contained_in(&Subject::from("one.*.three")));
/// assert!(subject.is_contained_in(&Subject::from("one.>")));
/// assert!(!subject.is_contained_in(&Subject::from("one.two")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    /// Wraps a subject string without validating it.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    /// Returns the subject string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the subject is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the `.`-separated tokens.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Records an error in `vr` if the subject is not well formed.
    ///
    /// A subject must be non-empty, contain no whitespace and no empty
    /// tokens. Wildcards must stand alone as a token and `>` may only be
    /// the last token. At most one issue is reported per subject.
    pub fn validate(&self, vr: &mut ValidationResults) {
        let s = self.as_str();
        if s.is_empty() {
            vr.add_error("subject cannot be empty");
            return;
        }
        if s.chars().any(char::is_whitespace) {
            vr.add_error(format!("subject {s:?} cannot contain spaces"));
            return;
        }
        let tokens: Vec<&str> = self.tokens().collect();
        let last = tokens.len() - 1;
        for (i, token) in tokens.iter().enumerate() {
            if token.is_empty() {
                vr.add_error(format!("subject {s:?} contains an empty token"));
                return;
            }
            if token.len() > 1 && (token.contains('*') || token.contains('>')) {
                vr.add_error(format!(
                    "subject {s:?} has a wildcard inside token {token:?}"
                ));
                return;
            }
            if *token == FULL_WILDCARD && i != last {
                vr.add_error(format!(
                    "subject {s:?} may only use '>' as the last token"
                ));
                return;
            }
        }
    }

    /// Returns true if any token is a wildcard.
    #[must_use]
    pub fn has_wildcards(&self) -> bool {
        self.tokens()
            .any(|t| t == SINGLE_WILDCARD || t == FULL_WILDCARD)
    }

    /// Returns true if every subject matched by `self` is also matched by
    /// `pattern`.
    ///
    /// Tokens are compared positionally: a `*` in the pattern matches any
    /// single token and a trailing `>` matches everything from its position
    /// on. A pattern with more tokens than `self` never contains it.
    #[must_use]
    pub fn is_contained_in(&self, pattern: &Subject) -> bool {
        let mine: Vec<&str> = self.tokens().collect();
        let theirs: Vec<&str> = pattern.tokens().collect();
        let ends_with_full = theirs.last() == Some(&FULL_WILDCARD);

        if mine.len() > theirs.len() && !ends_with_full {
            return false;
        }
        if mine.len() < theirs.len() {
            return false;
        }
        let last = theirs.len() - 1;
        for (i, token) in theirs.iter().enumerate() {
            if i == last && *token == FULL_WILDCARD {
                return true;
            }
            if mine[i] == FULL_WILDCARD {
                return false;
            }
            if *token != mine[i] && *token != SINGLE_WILDCARD {
                return false;
            }
        }
        true
    }

    /// Returns true if either subject contains the other.
    #[must_use]
    pub fn overlaps(&self, other: &Subject) -> bool {
        self.is_contained_in(other) || other.is_contained_in(self)
    }

    /// Returns the number of `*` tokens.
    #[must_use]
    pub fn count_single_wildcards(&self) -> usize {
        self.tokens().filter(|t| *t == SINGLE_WILDCARD).count()
    }

    /// Returns true if the subject is `>` or ends in `.>`.
    #[must_use]
    pub fn ends_with_full_wildcard(&self) -> bool {
        self.0.rsplit(SEPARATOR).next() == Some(FULL_WILDCARD)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Subject {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A local subject that renames an imported subject.
///
/// Each `*` of the imported subject is referenced either by a `*` in the
/// same position or by `$N` (1-based) anywhere in the renaming subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenamingSubject(String);

impl RenamingSubject {
    /// Wraps a renaming subject string without validating it.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    /// Returns the renaming subject string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the renaming subject is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records errors in `vr` if this is not a valid renaming of `from`.
    pub fn validate(&self, from: &Subject, vr: &mut ValidationResults) {
        let me = self.to_subject();
        me.validate(vr);
        if from.is_empty() {
            vr.add_error("subject cannot be empty");
        }

        if me.has_wildcards() && from.ends_with_full_wildcard() != me.ends_with_full_wildcard() {
            vr.add_error(format!(
                "both renaming subject {:?} and subject \"{from}\" need to end or not end in '>'",
                self.0
            ));
        }

        let available = from.count_single_wildcards();
        let mut referenced = 0usize;
        for token in self.0.split(SEPARATOR) {
            if token == SINGLE_WILDCARD {
                referenced += 1;
                continue;
            }
            let Some(index) = token.strip_prefix('$') else {
                continue;
            };
            match index.parse::<usize>() {
                Ok(n) if (1..=available).contains(&n) => referenced += 1,
                Ok(_) => vr.add_error(format!(
                    "{:?} contains out of bounds reference {token:?}",
                    self.0
                )),
                Err(_) => vr.add_error(format!(
                    "{:?} contains non-numeric reference {token:?}",
                    self.0
                )),
            }
        }
        if referenced != available {
            vr.add_error(format!(
                "renaming subject {:?} must reference each of the {available} '*' wildcards of \"{from}\"",
                self.0
            ));
        }
    }

    /// Returns the subject with each `$N` reference replaced by `*`.
    #[must_use]
    pub fn to_subject(&self) -> Subject {
        let tokens: Vec<&str> = self
            .0
            .split(SEPARATOR)
            .map(|t| {
                if t.len() > 1 && t.starts_with('$') && t[1..].bytes().all(|b| b.is_ascii_digit()) {
                    SINGLE_WILDCARD
                } else {
                    t
                }
            })
            .collect();
        Subject(tokens.join("."))
    }
}

impl fmt::Display for RenamingSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RenamingSubject {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Subject {
        Subject::from(v)
    }

    fn issues(subject: &str) -> ValidationResults {
        let mut vr = ValidationResults::new();
        s(subject).validate(&mut vr);
        vr
    }

    #[test]
    fn valid_subjects() {
        for subject in ["foo", "foo.bar", "foo.*", "foo.>", ">", "*", "*.bar.>"] {
            assert!(issues(subject).is_empty(), "{subject} should be valid");
        }
    }

    #[test]
    fn invalid_subjects() {
        for subject in ["", "foo bar", "foo\tbar", "foo..bar", ".foo", "foo.", "foo.>.bar", "foo*", "fo>o.bar"] {
            let vr = issues(subject);
            assert_eq!(vr.len(), 1, "{subject:?} should have one issue");
            assert!(vr.is_blocking(false));
        }
    }

    #[test]
    fn wildcard_detection() {
        assert!(s("foo.*").has_wildcards());
        assert!(s("foo.>").has_wildcards());
        assert!(s("*").has_wildcards());
        assert!(s(">").has_wildcards());
        assert!(s("*.bar").has_wildcards());
        assert!(!s("foo.bar").has_wildcards());
        assert!(!s("foo*.bar").has_wildcards());
    }

    #[test]
    fn containment_table() {
        let subject = s("one.two.three");
        for pattern in ["one.*.three", "one.>", "*.two.three", ">", "one.two.three", "*.*.*"] {
            assert!(subject.is_contained_in(&s(pattern)), "in {pattern}");
        }
        for pattern in ["one.two", "one.two.three.four", "one.*.four", "two.>", "*.*"] {
            assert!(!subject.is_contained_in(&s(pattern)), "not in {pattern}");
        }
    }

    #[test]
    fn wildcard_patterns_contain_narrower_patterns() {
        assert!(s("foo.*").is_contained_in(&s("foo.>")));
        assert!(s("foo.bar.>").is_contained_in(&s("foo.>")));
        assert!(!s("foo.>").is_contained_in(&s("foo.*")));
        assert!(!s("foo.*").is_contained_in(&s("foo.bar")));
    }

    #[test]
    fn overlap_is_symmetric() {
        assert!(s("bar.foo").overlaps(&s("bar.*")));
        assert!(s("bar.*").overlaps(&s("bar.foo")));
        assert!(!s("bar.foo").overlaps(&s("baz.*")));
        assert!(s("a.b").overlaps(&s("a.b")));
    }

    #[test]
    fn renaming_with_references() {
        let mut vr = ValidationResults::new();
        RenamingSubject::from("local.$2.$1").validate(&s("remote.*.*"), &mut vr);
        assert!(vr.is_empty(), "{vr:?}");
        assert_eq!(RenamingSubject::from("local.$2.$1").to_subject(), s("local.*.*"));
    }

    #[test]
    fn renaming_with_positional_wildcards() {
        let mut vr = ValidationResults::new();
        RenamingSubject::from("local.*").validate(&s("remote.*"), &mut vr);
        assert!(vr.is_empty(), "{vr:?}");
    }

    #[test]
    fn renaming_must_reference_every_wildcard() {
        let mut vr = ValidationResults::new();
        RenamingSubject::from("local.$1").validate(&s("remote.*.*"), &mut vr);
        assert!(vr.is_blocking(false));
    }

    #[test]
    fn renaming_rejects_bad_references() {
        let mut vr = ValidationResults::new();
        RenamingSubject::from("local.$3").validate(&s("remote.*"), &mut vr);
        assert!(vr.mentions("out of bounds"));

        let mut vr = ValidationResults::new();
        RenamingSubject::from("local.$x").validate(&s("remote.*"), &mut vr);
        assert!(vr.mentions("non-numeric"));
    }

    #[test]
    fn renaming_full_wildcard_must_agree() {
        let mut vr = ValidationResults::new();
        RenamingSubject::from("local.>").validate(&s("remote.bar"), &mut vr);
        assert!(vr.mentions("end or not end"));

        let mut vr = ValidationResults::new();
        RenamingSubject::from("local.>").validate(&s("remote.>"), &mut vr);
        assert!(vr.is_empty(), "{vr:?}");
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&s("a.b")).unwrap();
        assert_eq!(json, "\"a.b\"");
        let back: Subject = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s("a.b"));
    }
}
