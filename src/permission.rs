//! Publish/subscribe permissions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encoding::duration_nanos;
use crate::subject::Subject;
use crate::validation::ValidationResults;

/// Allow and deny lists for one direction (publish or subscribe).
///
/// Entries may carry a queue group after a single space: `"orders.* workers"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Subjects explicitly allowed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<Subject>,
    /// Subjects explicitly denied
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<Subject>,
}

impl Permission {
    /// Adds subjects to the allow list, skipping duplicates.
    pub fn allow<I, S>(&mut self, subjects: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Subject>,
    {
        push_unique(&mut self.allow, subjects);
    }

    /// Adds subjects to the deny list, skipping duplicates.
    pub fn deny<I, S>(&mut self, subjects: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Subject>,
    {
        push_unique(&mut self.deny, subjects);
    }

    /// Returns true if both lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    /// Records an error for every malformed entry.
    pub fn validate(&self, vr: &mut ValidationResults) {
        for entry in self.allow.iter().chain(&self.deny) {
            validate_entry(entry, vr);
        }
    }
}

fn push_unique<I, S>(list: &mut Vec<Subject>, subjects: I)
where
    I: IntoIterator<Item = S>,
    S: Into<Subject>,
{
    for subject in subjects {
        let subject = subject.into();
        if !list.contains(&subject) {
            list.push(subject);
        }
    }
}

fn validate_entry(entry: &Subject, vr: &mut ValidationResults) {
    let raw = entry.as_str();
    let Some((subject, queue)) = raw.split_once(' ') else {
        entry.validate(vr);
        return;
    };
    if queue.contains(' ') {
        vr.add_error(format!("permission subject {raw:?} contains too many spaces"));
        return;
    }
    if queue.is_empty() {
        vr.add_error(format!("permission subject {raw:?} has an empty queue"));
        return;
    }
    Subject::from(subject).validate(vr);
}

/// Allows a subscriber to publish replies to the requester's reply subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePermission {
    /// Maximum number of replies per request
    #[serde(default)]
    pub max: i64,
    /// How long the reply subject stays writable
    #[serde(default, with = "duration_nanos")]
    pub ttl: Duration,
}

/// Publish, subscribe and response permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// Publish permissions
    #[serde(rename = "pub", default, skip_serializing_if = "Permission::is_empty")]
    pub publish: Permission,
    /// Subscribe permissions
    #[serde(rename = "sub", default, skip_serializing_if = "Permission::is_empty")]
    pub subscribe: Permission,
    /// Response permission, if replies are allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp: Option<ResponsePermission>,
}

impl Permissions {
    /// Returns true if nothing is restricted or granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.publish.is_empty() && self.subscribe.is_empty() && self.resp.is_none()
    }

    /// Validates both directions.
    pub fn validate(&self, vr: &mut ValidationResults) {
        self.publish.validate(vr);
        self.subscribe.validate(vr);
        if let Some(resp) = &self.resp
            && resp.max < -1
        {
            vr.add_error(format!("response permission max {} is invalid", resp.max));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(entries: &[&str]) -> ValidationResults {
        let mut permission = Permission::default();
        permission.allow(entries.iter().copied());
        let mut vr = ValidationResults::new();
        permission.validate(&mut vr);
        vr
    }

    #[test]
    fn plain_and_queue_entries() {
        assert!(validate(&["foo.>", "bar.* workers"]).is_empty());
    }

    #[test]
    fn too_many_spaces() {
        let vr = validate(&["foo.bar q extra"]);
        assert!(vr.mentions("too many spaces"));
    }

    #[test]
    fn bad_subject_before_queue() {
        let vr = validate(&["foo..bar q"]);
        assert!(vr.is_blocking(false));
    }

    #[test]
    fn allow_skips_duplicates() {
        let mut permission = Permission::default();
        permission.allow(["a", "b", "a"]);
        permission.deny(["c"]);
        assert_eq!(permission.allow.len(), 2);
        assert!(!permission.is_empty());
    }

    #[test]
    fn wire_names() {
        let mut permissions = Permissions::default();
        permissions.publish.allow(["foo"]);
        permissions.resp = Some(ResponsePermission {
            max: 1,
            ttl: Duration::from_secs(1),
        });
        let json = serde_json::to_value(&permissions).unwrap();
        assert_eq!(json["pub"]["allow"][0], "foo");
        assert!(json.get("sub").is_none());
        assert_eq!(json["resp"]["ttl"], 1_000_000_000u64);
    }
}
