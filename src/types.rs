//! Small value types shared by several claim payloads.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::validation::ValidationResults;

/// Free-form description attached to accounts and exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Link to further documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub info_url: String,
}

impl Info {
    /// Records an error if `info_url` is set but is not an absolute http(s) URL.
    pub fn validate(&self, vr: &mut ValidationResults) {
        if self.info_url.is_empty() {
            return;
        }
        match Url::parse(&self.info_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => vr.add_error(format!(
                "info url {:?} has unsupported scheme {:?}",
                self.info_url,
                url.scheme()
            )),
            Err(e) => vr.add_error(format!("error parsing info url {:?}: {e}", self.info_url)),
        }
    }

    /// Returns true if neither field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_empty() && self.info_url.is_empty()
    }
}

/// A proof of identity attached to operators and accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Identifier of the proven identity
    #[serde(default)]
    pub id: String,
    /// The proof itself
    #[serde(default)]
    pub proof: String,
}

impl Identity {
    /// Records an error if either field is empty.
    pub fn validate(&self, vr: &mut ValidationResults) {
        if self.id.is_empty() {
            vr.add_error("identity requires an id");
        }
        if self.proof.is_empty() {
            vr.add_error(format!("identity {:?} requires a proof", self.id));
        }
    }
}

/// Lower-cased, de-duplicated list of tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagList(Vec<String>);

impl TagList {
    /// Creates an empty tag list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds tags, trimming and lower-casing them. Empty and duplicate tags are skipped.
    pub fn add<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim().to_lowercase();
            if !tag.is_empty() && !self.0.contains(&tag) {
                self.0.push(tag);
            }
        }
    }

    /// Removes tags, compared case-insensitively.
    pub fn remove<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim().to_lowercase();
            self.0.retain(|t| *t != tag);
        }
    }

    /// Returns true if the list holds `tag`, compared case-insensitively.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.0.contains(&tag)
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the tags.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
