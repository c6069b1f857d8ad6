//! Constants for claim encoding and validation.

/// Token type carried in the header `typ` field.
pub const TOKEN_TYPE: &str = "jwt";

/// The single supported signing algorithm, carried in the header `alg` field.
pub const ALGORITHM: &str = "ed25519";

/// Revocation-list key that revokes every principal at once.
pub const ALL: &str = "*";

/// Activation subject that authorizes any importing account.
pub const PUBLIC: &str = "public";

/// Numeric limit value meaning "unlimited".
pub const NO_LIMIT: i64 = -1;

/// Default bound on a single activation URL fetch, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;

/// Default cap on the number of bytes read from an activation URL.
pub const DEFAULT_MAX_FETCH_BYTES: usize = 64 * 1024;

/// Connection types a user claim may restrict itself to.
pub const CONNECTION_TYPES: &[&str] = &[
    "STANDARD",
    "WEBSOCKET",
    "LEAFNODE",
    "LEAFNODE_WS",
    "MQTT",
    "MQTT_WS",
    "IN_PROCESS",
];

/// Placeholder used by activation hashing when a subject starts with a wildcard.
pub const WILDCARD_PLACEHOLDER: &str = "_";
