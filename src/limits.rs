//! Resource limits and connection restrictions.
//!
//! Numeric limits use `-1` for "unlimited". The broker-level limits
//! ([`NatsLimits`]) are always serialized so a decoder never confuses a
//! missing field with an explicit zero.

use std::net::IpAddr;

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::NO_LIMIT;
use crate::validation::ValidationResults;

fn check_limit(name: &str, value: i64, vr: &mut ValidationResults) {
    if value < NO_LIMIT {
        vr.add_error(format!("limit {name} is {value}; use -1 for unlimited"));
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(v: &i64) -> bool {
    *v == 0
}

const fn default_true() -> bool {
    true
}

/// Message-level limits enforced by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsLimits {
    /// Maximum subscriptions
    pub subs: i64,
    /// Maximum bytes in flight
    pub data: i64,
    /// Maximum message payload size
    pub payload: i64,
}

impl Default for NatsLimits {
    fn default() -> Self {
        Self {
            subs: NO_LIMIT,
            data: NO_LIMIT,
            payload: NO_LIMIT,
        }
    }
}

impl NatsLimits {
    /// Returns true if every limit is unlimited.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        *self == Self::default()
    }

    /// Records an error for every limit below `-1`.
    pub fn validate(&self, vr: &mut ValidationResults) {
        check_limit("subs", self.subs, vr);
        check_limit("data", self.data, vr);
        check_limit("payload", self.payload, vr);
    }
}

/// Account-wide limits set by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountLimits {
    /// Maximum number of imports
    pub imports: i64,
    /// Maximum number of exports
    pub exports: i64,
    /// Whether exports may use wildcard subjects
    #[serde(default = "default_true")]
    pub wildcards: bool,
    /// Rejects users that connect with bearer tokens
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disallow_bearer: bool,
    /// Maximum client connections
    pub conn: i64,
    /// Maximum leaf-node connections
    pub leaf: i64,
}

impl Default for AccountLimits {
    fn default() -> Self {
        Self {
            imports: NO_LIMIT,
            exports: NO_LIMIT,
            wildcards: true,
            disallow_bearer: false,
            conn: NO_LIMIT,
            leaf: NO_LIMIT,
        }
    }
}

impl AccountLimits {
    /// Returns true if nothing is restricted.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        *self == Self::default()
    }

    /// Records an error for every limit below `-1`.
    pub fn validate(&self, vr: &mut ValidationResults) {
        check_limit("imports", self.imports, vr);
        check_limit("exports", self.exports, vr);
        check_limit("conn", self.conn, vr);
        check_limit("leaf", self.leaf, vr);
    }
}

/// Persistent-stream limits. All zero means streams are disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JetStreamLimits {
    /// Maximum in-memory storage in bytes
    #[serde(skip_serializing_if = "is_zero")]
    pub mem_storage: i64,
    /// Maximum disk storage in bytes
    #[serde(skip_serializing_if = "is_zero")]
    pub disk_storage: i64,
    /// Maximum number of streams
    #[serde(skip_serializing_if = "is_zero")]
    pub streams: i64,
    /// Maximum number of consumers
    #[serde(skip_serializing_if = "is_zero")]
    pub consumer: i64,
    /// Maximum pending acknowledgements per consumer
    #[serde(skip_serializing_if = "is_zero")]
    pub max_ack_pending: i64,
    /// Maximum bytes of a single in-memory stream
    #[serde(skip_serializing_if = "is_zero")]
    pub mem_max_stream_bytes: i64,
    /// Maximum bytes of a single disk stream
    #[serde(skip_serializing_if = "is_zero")]
    pub disk_max_stream_bytes: i64,
    /// Streams must declare a maximum size
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub max_bytes_required: bool,
}

impl JetStreamLimits {
    /// Returns true if every numeric limit is unlimited.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        [
            self.mem_storage,
            self.disk_storage,
            self.streams,
            self.consumer,
            self.max_ack_pending,
            self.mem_max_stream_bytes,
            self.disk_max_stream_bytes,
        ]
        .iter()
        .all(|v| *v == NO_LIMIT)
    }

    /// Returns true if streams are disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        *self == Self::default()
    }

    /// Records an error for every limit below `-1`.
    pub fn validate(&self, vr: &mut ValidationResults) {
        check_limit("mem_storage", self.mem_storage, vr);
        check_limit("disk_storage", self.disk_storage, vr);
        check_limit("streams", self.streams, vr);
        check_limit("consumer", self.consumer, vr);
        check_limit("max_ack_pending", self.max_ack_pending, vr);
        check_limit("mem_max_stream_bytes", self.mem_max_stream_bytes, vr);
        check_limit("disk_max_stream_bytes", self.disk_max_stream_bytes, vr);
    }
}

/// All limits an operator places on an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorLimits {
    /// Broker message limits
    #[serde(flatten)]
    pub nats: NatsLimits,
    /// Account-wide limits
    #[serde(flatten)]
    pub account: AccountLimits,
    /// Persistent-stream limits
    #[serde(flatten)]
    pub jetstream: JetStreamLimits,
}

impl OperatorLimits {
    /// Returns true if the limits equal the defaults.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        *self == Self::default()
    }

    /// Validates every group of limits.
    pub fn validate(&self, vr: &mut ValidationResults) {
        self.nats.validate(vr);
        self.account.validate(vr);
        self.jetstream.validate(vr);
    }
}

/// A daily window during which a user may connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the window, `HH:MM:SS`
    #[serde(default)]
    pub start: String,
    /// End of the window, `HH:MM:SS`
    #[serde(default)]
    pub end: String,
}

impl TimeRange {
    /// Creates a time range.
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Records errors if either bound is not `HH:MM:SS` or start is not before end.
    pub fn validate(&self, vr: &mut ValidationResults) {
        let start = parse_time("start", &self.start, vr);
        let end = parse_time("end", &self.end, vr);
        if let (Some(start), Some(end)) = (start, end)
            && start >= end
        {
            vr.add_error(format!(
                "time range start {:?} must be before end {:?}",
                self.start, self.end
            ));
        }
    }
}

fn parse_time(which: &str, value: &str, vr: &mut ValidationResults) -> Option<NaiveTime> {
    if value.is_empty() {
        vr.add_error(format!("time range {which} is not set"));
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .inspect_err(|e| {
            vr.add_error(format!(
                "time range {which} {value:?} is not a valid HH:MM:SS time: {e}"
            ));
        })
        .ok()
}

/// Source networks a user may connect from.
///
/// Decodes from either a JSON array or a comma-separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CidrList(Vec<String>);

impl CidrList {
    /// Adds CIDR blocks; each argument may itself be comma-separated.
    pub fn add<I, S>(&mut self, blocks: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for block in blocks {
            for part in block.as_ref().split(',') {
                let part = part.trim();
                if !part.is_empty() && !self.0.iter().any(|b| b == part) {
                    self.0.push(part.to_string());
                }
            }
        }
    }

    /// Returns true if no networks are listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the CIDR blocks.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Records an error for every entry that is not `address/prefix`.
    pub fn validate(&self, vr: &mut ValidationResults) {
        for block in &self.0 {
            if let Err(reason) = parse_cidr(block) {
                vr.add_error(format!("invalid cidr {block:?}: {reason}"));
            }
        }
    }
}

fn parse_cidr(block: &str) -> Result<(IpAddr, u8), String> {
    let (addr, prefix) = block
        .split_once('/')
        .ok_or_else(|| "missing prefix length".to_string())?;
    let addr: IpAddr = addr.parse().map_err(|e: std::net::AddrParseError| e.to_string())?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| format!("prefix {prefix:?} is not a number"))?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(format!("prefix {prefix} exceeds {max}"));
    }
    Ok((addr, prefix))
}

impl<'de> Deserialize<'de> for CidrList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Joined(String),
            List(Vec<String>),
        }

        let mut list = Self::default();
        match Raw::deserialize(deserializer)? {
            Raw::Joined(s) => list.add([s]),
            Raw::List(v) => list.add(v),
        }
        Ok(list)
    }
}

/// Connection restrictions for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserLimits {
    /// Allowed source networks
    #[serde(skip_serializing_if = "CidrList::is_empty")]
    pub src: CidrList,
    /// Allowed daily connection windows
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub times: Vec<TimeRange>,
    /// Time zone the windows are expressed in; passed through unvalidated
    #[serde(rename = "times_location", skip_serializing_if = "String::is_empty")]
    pub locale: String,
}

impl UserLimits {
    /// Returns true if nothing is restricted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.src.is_empty() && self.times.is_empty() && self.locale.is_empty()
    }

    /// Validates source networks and time windows.
    pub fn validate(&self, vr: &mut ValidationResults) {
        self.src.validate(vr);
        for range in &self.times {
            range.validate(vr);
        }
    }
}

/// Limits carried by a user claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Connection restrictions
    #[serde(flatten)]
    pub user: UserLimits,
    /// Message limits
    #[serde(flatten)]
    pub nats: NatsLimits,
}

impl Limits {
    /// Returns true if nothing is restricted.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.user.is_empty() && self.nats.is_unlimited()
    }

    /// Validates all limits.
    pub fn validate(&self, vr: &mut ValidationResults) {
        self.user.validate(vr);
        self.nats.validate(vr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unlimited() {
        assert!(NatsLimits::default().is_unlimited());
        assert!(AccountLimits::default().is_unlimited());
        assert!(OperatorLimits::default().is_unlimited());
        assert!(Limits::default().is_unlimited());
        assert!(JetStreamLimits::default().is_disabled());
    }

    #[test]
    fn limits_below_minus_one_are_errors() {
        let mut limits = OperatorLimits::default();
        limits.nats.subs = -2;
        limits.account.conn = 10;
        let mut vr = ValidationResults::new();
        limits.validate(&mut vr);
        assert_eq!(vr.errors().len(), 1);
        assert!(vr.mentions("subs"));
    }

    #[test]
    fn nats_limits_are_always_serialized() {
        let json = serde_json::to_value(Limits::default()).unwrap();
        assert_eq!(json["subs"], -1);
        assert_eq!(json["data"], -1);
        assert_eq!(json["payload"], -1);
        assert!(json.get("src").is_none());
    }

    #[test]
    fn operator_limits_flatten_and_fill_defaults() {
        let limits: OperatorLimits = serde_json::from_str(r#"{"conn":5,"mem_storage":1024}"#).unwrap();
        assert_eq!(limits.account.conn, 5);
        assert_eq!(limits.jetstream.mem_storage, 1024);
        assert_eq!(limits.nats.subs, -1);
        assert!(limits.account.wildcards);
        assert!(!limits.is_unlimited());
    }

    #[test]
    fn time_ranges() {
        let mut vr = ValidationResults::new();
        TimeRange::new("08:00:00", "17:00:00").validate(&mut vr);
        assert!(vr.is_empty());

        TimeRange::new("17:00:00", "08:00:00").validate(&mut vr);
        assert!(vr.mentions("must be before end"));

        let mut vr = ValidationResults::new();
        TimeRange::new("08:00:00", "08:00:00").validate(&mut vr);
        assert_eq!(vr.len(), 1);

        let mut vr = ValidationResults::new();
        TimeRange::new("8am", "25:00:00").validate(&mut vr);
        assert_eq!(vr.errors().len(), 2);
    }

    #[test]
    fn cidr_list_accepts_string_or_array() {
        let joined: CidrList = serde_json::from_str(r#""192.168.1.0/24, 10.0.0.0/8""#).unwrap();
        let list: CidrList = serde_json::from_str(r#"["192.168.1.0/24","10.0.0.0/8"]"#).unwrap();
        assert_eq!(joined, list);
        assert_eq!(joined.iter().count(), 2);
    }

    #[test]
    fn cidr_validation() {
        let mut src = CidrList::default();
        src.add(["127.0.0.1/32,::1/128"]);
        let mut vr = ValidationResults::new();
        src.validate(&mut vr);
        assert!(vr.is_empty());

        src.add(["10.0.0.1", "10.0.0.0/33", "nope/8"]);
        src.validate(&mut vr);
        assert_eq!(vr.errors().len(), 3);
    }
}
