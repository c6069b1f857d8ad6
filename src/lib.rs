//! Signed identity and authorization claims for operator/account/user trust
//! hierarchies.
//!
//! A claim is a JSON document signed with an ed25519 key and packed into a
//! compact `header.payload.signature` token. Operators sign accounts,
//! accounts sign users, and every token carries enough to be verified
//! offline: the signer's public key is the `iss` field.
//!
//! # Quick Start
//!
//! ```rust
//! use broker_claims::{AccountClaims, KeyKind, KeyPair, UserClaims, ValidationResults};
//!
//! let operator = KeyPair::generate(KeyKind::Operator);
//! let account = KeyPair::generate(KeyKind::Account);
//! let user = KeyPair::generate(KeyKind::User);
//!
//! // The operator vouches for the account.
//! let account_jwt = AccountClaims::new(account.public_key())
//!     .with_name("billing")
//!     .encode(&operator)
//!     .unwrap();
//!
//! // The account issues a user that may only publish under `billing.>`.
//! let mut claims = UserClaims::new(user.public_key()).with_name("worker");
//! claims.payload.permission_limits.permissions.publish.allow(["billing.>"]);
//! let user_jwt = claims.encode(&account).unwrap();
//!
//! let decoded = UserClaims::decode(&user_jwt).unwrap();
//! assert_eq!(decoded.data.issuer, account.public_key());
//!
//! let mut vr = ValidationResults::new();
//! decoded.validate(&mut vr);
//! assert!(vr.is_empty());
//! # let _ = account_jwt;
//! ```
//!
//! # Claim kinds
//!
//! | Kind | Subject | Signed by |
//! |------|---------|-----------|
//! | [`OperatorClaims`] | operator key | operator |
//! | [`AccountClaims`] | account key | operator, account |
//! | [`UserClaims`] | user key | account |
//! | [`ServerClaims`] | server key | operator, cluster |
//! | [`ClusterClaims`] | cluster key | operator |
//! | [`ActivationClaims`] | account key or `public` | account, operator |
//! | [`RevocationClaims`] | any public key | operator, account |
//! | [`GenericClaims`] | anything | anyone |
//! | [`AuthorizationRequestClaims`] | user key | server |
//! | [`AuthorizationResponseClaims`] | user key | account |
//!
//! Decoding checks structure, the validity window, the signature and the
//! signer's key class, and fails with a [`ClaimsError`]. Semantic problems,
//! such as overlapping exports or an import whose activation does not match,
//! never fail decoding; [`Claims::validate`] collects them in a
//! [`ValidationResults`].
//!
//! # Features
//!
//! - `http-fetch` (default): resolve activation tokens given as URLs with a
//!   blocking HTTP client. Without it, URL activations are reported as
//!   unreachable.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod account;
mod activation;
mod authorization;
mod claims;
mod cluster;
mod config;
mod constants;
mod encoding;
mod error;
mod exports;
mod generic;
mod header;
mod imports;
mod keys;
mod limits;
mod operator;
mod permission;
pub mod prelude;
mod revocation;
mod revocation_claims;
mod server;
mod signing_keys;
mod subject;
mod types;
mod user;
mod validation;

pub use account::{Account, AccountClaims, ExternalAuthorization, Mappings, WeightedMapping};
pub use activation::{Activation, ActivationClaims};
pub use authorization::{
    AuthorizationRequest, AuthorizationRequestClaims, AuthorizationResponse,
    AuthorizationResponseClaims, ClientInformation, ConnectOptions, ServerId,
};
pub use claims::{ClaimPayload, ClaimType, Claims, ClaimsData, ValidationContext, unix_now};
pub use cluster::{Cluster, ClusterClaims};
pub use config::ValidationConfig;
pub use constants::{
    ALGORITHM, ALL, CONNECTION_TYPES, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_FETCH_BYTES,
    NO_LIMIT, PUBLIC, TOKEN_TYPE,
};
pub use encoding::{decode_segment, encode_segment};
pub use error::ClaimsError;
pub use exports::{Export, ExportType, Exports, ResponseType, Sampling, ServiceLatency};
pub use generic::{
    AnyClaims, GenericClaims, GenericPayload, decode_any, decode_generic, peek_claim_type,
};
pub use header::Header;
#[cfg(feature = "http-fetch")]
pub use imports::HttpFetcher;
pub use imports::{ActivationFetcher, FetchError, Import, Imports, NoFetch, default_fetcher};
pub use keys::{KeyKind, KeyPair, is_valid_public_key, verify_signature};
pub use limits::{
    AccountLimits, CidrList, JetStreamLimits, Limits, NatsLimits, OperatorLimits, TimeRange,
    UserLimits,
};
pub use operator::{Operator, OperatorClaims};
pub use permission::{Permission, Permissions, ResponsePermission};
pub use revocation::{RevocationEntry, RevocationList};
pub use revocation_claims::{Revocation, RevocationClaims};
pub use server::{Server, ServerClaims};
pub use signing_keys::{SigningKeys, UserScope};
pub use subject::{RenamingSubject, Subject};
pub use types::{Identity, Info, TagList};
pub use user::{User, UserClaims, UserPermissionLimits};
pub use validation::{ValidationIssue, ValidationResults};
