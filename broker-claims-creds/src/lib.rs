//! Credential files for `broker-claims` users.
//!
//! A credential file bundles a user token with the user's seed, each wrapped
//! in banner lines, so that a client can both present the token and sign the
//! server's nonce:
//!
//! ```text
//! -----BEGIN NATS USER JWT-----
//! eyJ0eXAiOiJqd3QiLCJhbGciOiJlZDI1NTE5In0...
//! ------END NATS USER JWT------
//!
//! ************************* IMPORTANT *************************
//! NKEY Seed printed below can be used to sign and prove identity.
//! NKEYs are sensitive and should be treated as secrets.
//!
//! -----BEGIN USER NKEY SEED-----
//! SUAM...
//! ------END USER NKEY SEED------
//!
//! *************************************************************
//! ```
//!
//! Parsing tolerates CRLF line endings and prose around the blocks.
//!
//! ```rust
//! use broker_claims::{KeyKind, KeyPair, UserClaims};
//! use broker_claims_creds::{format_user_config, parse_decorated_user_config};
//!
//! let account = KeyPair::generate(KeyKind::Account);
//! let user = KeyPair::generate(KeyKind::User);
//! let jwt = UserClaims::new(user.public_key()).encode(&account).unwrap();
//!
//! let creds = format_user_config(&jwt, &user.seed().unwrap()).unwrap();
//! let parsed = parse_decorated_user_config(&creds).unwrap();
//! assert_eq!(parsed.jwt, jwt);
//! assert_eq!(parsed.key_pair.public_key(), user.public_key());
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod error;

use std::fmt;

use broker_claims::{ClaimType, KeyKind, KeyPair, peek_claim_type};

pub use error::CredsError;

const SEED_WARNING: &str = "\
************************* IMPORTANT *************************
NKEY Seed printed below can be used to sign and prove identity.
NKEYs are sensitive and should be treated as secrets.
";

const FOOTER: &str = "*************************************************************\n";

/// A user token together with the key pair that owns it.
pub struct UserConfig {
    /// The user token
    pub jwt: String,
    /// The user key pair, restored from the seed
    pub key_pair: KeyPair,
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("jwt", &self.jwt)
            .field("key_pair", &self.key_pair)
            .finish()
    }
}

fn banner_label(claim_type: &ClaimType) -> String {
    format!("NATS {} JWT", claim_type.as_str().to_uppercase())
}

fn seed_label(kind: KeyKind) -> String {
    format!("{} NKEY SEED", kind.as_str().to_uppercase())
}

fn block(label: &str, body: &str) -> String {
    format!("-----BEGIN {label}-----\n{body}\n------END {label}------\n")
}

/// Wraps `jwt` in banner lines naming its claim kind.
///
/// # Errors
///
/// Returns `CredsError::Claims` if the kind cannot be read from the token.
pub fn decorate_jwt(jwt: &str) -> Result<String, CredsError> {
    let claim_type = peek_claim_type(jwt)?;
    Ok(block(&banner_label(&claim_type), jwt))
}

/// Wraps `seed` in banner lines naming its key class.
///
/// # Errors
///
/// Returns `CredsError::InvalidSeed` for unreadable seeds and
/// `CredsError::WrongSeedKind` for seeds other than operator, account or user.
pub fn decorate_seed(seed: &str) -> Result<String, CredsError> {
    let (kind, _) = restore_seed(seed)?;
    Ok(block(&seed_label(kind), seed))
}

fn restore_seed(seed: &str) -> Result<(KeyKind, KeyPair), CredsError> {
    let key_pair =
        KeyPair::from_seed(seed).map_err(|e| CredsError::InvalidSeed { reason: e.to_string() })?;
    match key_pair.kind() {
        Some(kind @ (KeyKind::Operator | KeyKind::Account | KeyKind::User)) => Ok((kind, key_pair)),
        _ => Err(CredsError::WrongSeedKind {
            expected: "operator, account or user",
        }),
    }
}

/// Builds the credential file for a user token and its seed.
///
/// # Errors
///
/// Returns `CredsError::NotUserJwt` unless `jwt` is a user claim and
/// `CredsError::WrongSeedKind` unless `seed` is a user seed.
pub fn format_user_config(jwt: &str, seed: &str) -> Result<String, CredsError> {
    let claim_type = peek_claim_type(jwt)?;
    if claim_type != ClaimType::User {
        return Err(CredsError::NotUserJwt {
            found: claim_type.to_string(),
        });
    }
    if restore_seed(seed)?.0 != KeyKind::User {
        return Err(CredsError::WrongSeedKind { expected: "user" });
    }

    let mut out = block(&banner_label(&claim_type), jwt);
    out.push('\n');
    out.push_str(SEED_WARNING);
    out.push('\n');
    out.push_str(&block(&seed_label(KeyKind::User), seed));
    out.push('\n');
    out.push_str(FOOTER);
    Ok(out)
}

fn is_banner(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 6 && line.starts_with("---") && line.ends_with("---")
}

fn is_block_body(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '='))
}

/// Returns the bodies of all `banner / body / banner` blocks in order.
fn blocks(contents: &str) -> Vec<&str> {
    let lines: Vec<&str> = contents.lines().collect();
    let mut found = Vec::new();
    let mut i = 0;
    while i + 2 < lines.len() {
        let body = lines[i + 1].trim();
        if is_banner(lines[i]) && is_block_body(body) && is_banner(lines[i + 2]) {
            found.push(body);
            i += 3;
        } else {
            i += 1;
        }
    }
    found
}

/// Extracts the token from a decorated credential.
///
/// Input without any banner blocks is taken to be a bare token.
///
/// # Errors
///
/// Returns `CredsError::MissingJwt` if the input is empty.
pub fn parse_decorated_jwt(contents: &str) -> Result<String, CredsError> {
    if let Some(jwt) = blocks(contents).first() {
        return Ok((*jwt).to_string());
    }
    let bare = contents.trim();
    if bare.is_empty() {
        return Err(CredsError::MissingJwt);
    }
    Ok(bare.to_string())
}

/// Extracts the seed from a decorated credential and restores its key pair.
///
/// The seed is the second block; without blocks, the first line that looks
/// like an operator, account or user seed is used.
///
/// # Errors
///
/// Returns `CredsError::MissingSeed` if no seed is found, or the errors of
/// an unreadable or unsupported seed.
pub fn parse_decorated_seed(contents: &str) -> Result<KeyPair, CredsError> {
    let seed = blocks(contents).get(1).copied().or_else(|| {
        contents
            .lines()
            .map(str::trim)
            .find(|line| ["SO", "SA", "SU"].iter().any(|p| line.starts_with(p)))
    });
    let Some(seed) = seed else {
        tracing::debug!("credentials contain no seed");
        return Err(CredsError::MissingSeed);
    };
    restore_seed(seed).map(|(_, key_pair)| key_pair)
}

/// Parses a credential file into a user token and key pair.
///
/// # Errors
///
/// Returns `CredsError::WrongSeedKind` if the seed is not a user seed, or
/// the errors of [`parse_decorated_jwt`] and [`parse_decorated_seed`].
pub fn parse_decorated_user_config(contents: &str) -> Result<UserConfig, CredsError> {
    let jwt = parse_decorated_jwt(contents)?;
    let key_pair = parse_decorated_seed(contents)?;
    if key_pair.kind() != Some(KeyKind::User) {
        return Err(CredsError::WrongSeedKind { expected: "user" });
    }
    Ok(UserConfig { jwt, key_pair })
}
