//! Alternate keys authorized to sign on behalf of an account or operator.
//!
//! A signing key is either unscoped, in which case it may sign anything the
//! principal could, or bound to a [`UserScope`] whose template fixes the
//! permissions and limits of every user it issues.

use std::collections::BTreeMap;

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::keys::{KeyKind, is_valid_public_key};
use crate::user::{UserClaims, UserPermissionLimits};
use crate::validation::ValidationResults;

/// A signing key bound to a permission template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename = "user_scope")]
pub struct UserScope {
    /// The scoped signing key
    pub key: String,
    /// Role name for the scope
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// Permissions and limits applied to every user signed by `key`
    #[serde(default)]
    pub template: UserPermissionLimits,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl UserScope {
    /// Creates a scope for `key` with an empty template.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Validates the key and the template.
    pub fn validate(&self, vr: &mut ValidationResults) {
        if !is_valid_public_key(KeyKind::Account, &self.key) {
            vr.add_error(format!("scope key {:?} is not a valid account key", self.key));
        }
        self.template.validate(vr);
    }

    /// Records errors if `user` was not issued by this scope's key, or sets
    /// permissions of its own.
    ///
    /// A scoped user must carry either no permissions at all or exactly the
    /// scope's template; the server applies the template regardless.
    pub fn validate_user(&self, user: &UserClaims, vr: &mut ValidationResults) {
        if user.data.issuer != self.key {
            vr.add_error(format!(
                "user issuer {:?} is not the scoped signer {:?}",
                user.data.issuer, self.key
            ));
        }
        let limits = &user.payload.permission_limits;
        if !user.has_empty_permissions() && *limits != self.template {
            vr.add_error("scoped users require no permissions or limits set");
        }
    }
}

/// Registry of signing keys, each optionally scoped.
///
/// Serialized as an array whose entries are either a bare public key or a
/// [`UserScope`] object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningKeys(BTreeMap<String, Option<UserScope>>);

impl SigningKeys {
    /// Adds unscoped signing keys. An existing scope for the key is dropped.
    pub fn add<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            self.0.insert(key.into(), None);
        }
    }

    /// Adds or replaces a scoped signing key.
    pub fn add_scope(&mut self, scope: UserScope) {
        self.0.insert(scope.key.clone(), Some(scope));
    }

    /// Removes a signing key.
    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// Returns true if `key` is registered, scoped or not.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the scope bound to `key`, if it is scoped.
    #[must_use]
    pub fn scope(&self, key: &str) -> Option<&UserScope> {
        self.0.get(key).and_then(Option::as_ref)
    }

    /// Iterates over the registered keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no keys are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validates every key against `kind`. Scopes are only allowed on
    /// account signing keys.
    pub fn validate(&self, kind: KeyKind, vr: &mut ValidationResults) {
        for (key, scope) in &self.0 {
            if !is_valid_public_key(kind, key) {
                vr.add_error(format!("signing key {key:?} is not a valid {kind} key"));
            }
            let Some(scope) = scope else {
                continue;
            };
            if kind != KeyKind::Account {
                vr.add_error(format!("{kind} signing key {key:?} cannot be scoped"));
                continue;
            }
            if scope.key != *key {
                vr.add_error(format!(
                    "scope key {:?} does not match signing key {key:?}",
                    scope.key
                ));
            }
            scope.validate(vr);
        }
    }
}

impl Serialize for SigningKeys {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (key, scope) in &self.0 {
            match scope {
                Some(scope) => seq.serialize_element(scope)?,
                None => seq.serialize_element(key)?,
            }
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SigningKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Entry {
            Key(String),
            Scope(UserScope),
        }

        let mut keys = Self::default();
        for entry in Vec::<Entry>::deserialize(deserializer)? {
            match entry {
                Entry::Key(key) => keys.add([key]),
                Entry::Scope(scope) => keys.add_scope(scope),
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn mixed_wire_format() {
        let plain = KeyPair::generate(KeyKind::Account).public_key();
        let scoped = KeyPair::generate(KeyKind::Account).public_key();
        let mut keys = SigningKeys::default();
        keys.add([plain.clone()]);
        let mut scope = UserScope::new(scoped.clone());
        scope.role = "dev".into();
        keys.add_scope(scope);

        let json = serde_json::to_value(&keys).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e == &serde_json::Value::String(plain.clone())));
        assert!(
            entries
                .iter()
                .any(|e| e["kind"] == "user_scope" && e["key"] == scoped.as_str())
        );

        let back: SigningKeys = serde_json::from_value(json).unwrap();
        assert_eq!(back, keys);
        assert!(back.scope(&scoped).is_some());
        assert!(back.scope(&plain).is_none());
        assert!(back.contains(&plain));
    }

    #[test]
    fn keys_must_match_kind() {
        let mut keys = SigningKeys::default();
        keys.add([KeyPair::generate(KeyKind::User).public_key()]);
        let mut vr = ValidationResults::new();
        keys.validate(KeyKind::Account, &mut vr);
        assert!(vr.mentions("is not a valid account key"));
    }

    #[test]
    fn operator_keys_cannot_be_scoped() {
        let key = KeyPair::generate(KeyKind::Operator).public_key();
        let mut keys = SigningKeys::default();
        keys.add_scope(UserScope::new(key));
        let mut vr = ValidationResults::new();
        keys.validate(KeyKind::Operator, &mut vr);
        assert!(vr.mentions("cannot be scoped"));
    }

    #[test]
    fn scoped_user_with_own_permissions_is_rejected() {
        let signer = KeyPair::generate(KeyKind::Account);
        let user = KeyPair::generate(KeyKind::User);
        let mut scope = UserScope::new(signer.public_key());
        scope.template.permissions.publish.allow(["tmpl.>"]);

        let mut claims = UserClaims::new(user.public_key());
        claims.data.issuer = signer.public_key();

        let mut vr = ValidationResults::new();
        scope.validate_user(&claims, &mut vr);
        assert!(vr.is_empty(), "{vr:?}");

        claims.payload.permission_limits.permissions.publish.allow(["other.>"]);
        scope.validate_user(&claims, &mut vr);
        assert!(vr.mentions("no permissions or limits"));
    }

    #[test]
    fn scoped_user_must_come_from_scope_key() {
        let signer = KeyPair::generate(KeyKind::Account);
        let scope = UserScope::new(signer.public_key());
        let mut claims = UserClaims::new(KeyPair::generate(KeyKind::User).public_key());
        claims.data.issuer = KeyPair::generate(KeyKind::Account).public_key();
        let mut vr = ValidationResults::new();
        scope.validate_user(&claims, &mut vr);
        assert!(vr.mentions("is not the scoped signer"));
    }
}
