//! Convenient re-exports for glob imports.
//!
//! ```rust
//! use broker_claims::prelude::*;
//!
//! let operator = KeyPair::generate(KeyKind::Operator);
//! let token = OperatorClaims::new(operator.public_key())
//!     .encode(&operator)
//!     .unwrap();
//! assert!(matches!(decode_any(&token).unwrap(), AnyClaims::Operator(_)));
//! ```

pub use crate::{
    // Claim kinds
    AccountClaims, ActivationClaims, AuthorizationRequestClaims, AuthorizationResponseClaims,
    ClusterClaims, GenericClaims, OperatorClaims, RevocationClaims, ServerClaims, UserClaims,
    // Envelope
    AnyClaims, ClaimPayload, ClaimType, Claims, ClaimsData, decode_any,
    // Building blocks
    Export, ExportType, Import, Permission, Permissions, Subject,
    // Keys
    KeyKind, KeyPair,
    // Validation
    ValidationConfig, ValidationContext, ValidationResults,
    // Errors
    ClaimsError,
};
