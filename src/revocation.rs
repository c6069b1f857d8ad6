//! Time-keyed revocation lists.
//!
//! A revocation maps a public key to a Unix timestamp: any claim for that key
//! issued at or before the timestamp is revoked. The key `*` revokes every
//! principal at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::ALL;

/// A single revocation, as returned by [`RevocationList::maybe_compact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    /// The revoked public key, or `*`
    pub public_key: String,
    /// Claims issued at or before this Unix time are revoked
    pub timestamp: i64,
}

/// Map from public key (or `*`) to revocation time.
///
/// Revocations are monotonic: a later call can extend a revocation forward
/// but never move it earlier.
///
/// # Example
///
/// ```
/// use broker_claims::RevocationList;
///
/// let mut list = RevocationList::default();
/// list.revoke("UABC", 100);
/// list.revoke("UABC", 50);
/// assert!(list.is_revoked("UABC", 100));
/// assert!(!list.is_revoked("UABC", 101));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevocationList(BTreeMap<String, i64>);

impl RevocationList {
    /// Revokes `public_key` for everything issued at or before `timestamp`.
    ///
    /// An existing later revocation is kept.
    pub fn revoke(&mut self, public_key: impl Into<String>, timestamp: i64) {
        let current = self.0.entry(public_key.into()).or_insert(timestamp);
        if timestamp > *current {
            *current = timestamp;
        }
    }

    /// Revokes every principal for everything issued at or before `timestamp`.
    pub fn revoke_all(&mut self, timestamp: i64) {
        self.revoke(ALL, timestamp);
    }

    /// Removes the revocation for `public_key`, if any.
    pub fn clear_revocation(&mut self, public_key: &str) {
        self.0.remove(public_key);
    }

    /// Returns true if a claim for `public_key` issued at `timestamp` is revoked,
    /// either directly or through the `*` entry.
    #[must_use]
    pub fn is_revoked(&self, public_key: &str, timestamp: i64) -> bool {
        let covers = |key: &str| self.0.get(key).is_some_and(|ts| *ts >= timestamp);
        covers(ALL) || covers(public_key)
    }

    /// Returns the revocation time for `public_key`.
    #[must_use]
    pub fn get(&self, public_key: &str) -> Option<i64> {
        self.0.get(public_key).copied()
    }

    /// Returns the number of entries, including `*`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is revoked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(public_key, timestamp)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Drops per-key entries already covered by the `*` entry and returns them.
    pub fn maybe_compact(&mut self) -> Vec<RevocationEntry> {
        let Some(all) = self.get(ALL) else {
            return Vec::new();
        };
        let mut pruned = Vec::new();
        self.0.retain(|key, ts| {
            if key != ALL && *ts <= all {
                pruned.push(RevocationEntry {
                    public_key: key.clone(),
                    timestamp: *ts,
                });
                false
            } else {
                true
            }
        });
        if !pruned.is_empty() {
            tracing::debug!(pruned = pruned.len(), all, "compacted revocation list");
        }
        pruned
    }
}
