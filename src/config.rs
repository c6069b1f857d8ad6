//! Configuration for claim validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_FETCH_BYTES};

/// Configuration for [`Claims::validate_with`](crate::Claims::validate_with).
///
/// Controls activation fetching and whether time checks are performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Upper bound on a single activation URL fetch.
    ///
    /// Default: 5 seconds
    pub fetch_timeout: Duration,

    /// Maximum number of bytes read from an activation URL.
    ///
    /// Default: 65536 bytes
    pub max_fetch_bytes: usize,

    /// Whether expiry and not-before are checked during validation.
    ///
    /// Set to false when drafting claims ahead of their validity window.
    /// Default: true
    pub time_checks: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_fetch_bytes: DEFAULT_MAX_FETCH_BYTES,
            time_checks: true,
        }
    }
}

impl ValidationConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the activation fetch timeout.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets the activation fetch size cap.
    #[must_use]
    pub const fn with_max_fetch_bytes(mut self, max: usize) -> Self {
        self.max_fetch_bytes = max;
        self
    }

    /// Enables or disables time checks.
    #[must_use]
    pub const fn with_time_checks(mut self, enabled: bool) -> Self {
        self.time_checks = enabled;
        self
    }
}
