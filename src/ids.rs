//! Identifier types used throughout the broker core.
//!
//! Every identifier here is a small newtype over a primitive so the type
//! system keeps endpoint ids, group ids, instance numbers, and the two wire
//! id formats from being interchanged by accident.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A Service's globally unique endpoint identifier.
///
/// Carried as an opaque string; the wire protocol treats endpoint ids as
/// strings and the core never interprets their contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EndpointId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EndpointId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A group identifier, allocated from the Broker's small fixed space and
/// used to tag every schema node with its owning Service (§3, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(u16);

impl GroupId {
    /// Sentinel meaning "no group", i.e. owned by the Broker's own schema.
    pub const NONE: GroupId = GroupId(0);

    pub fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Service's monotonically allocated instance number (§3: "stable while
/// the Service is connected", never reused while any record exists).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceInstance(u32);

impl ServiceInstance {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Broker-generated USP message id.
///
/// Follows the wire format mandated by spec §6: `BROKER-<monotonic>-<unix-seconds>`.
/// The literal substring `BROKER` is load-bearing: subscription reconciliation
/// (§4.5) uses it to recognize Broker-created rows, so it must never be
/// reformatted away.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Builds a message id from its components. Exposed for response
    /// correlation, where an incoming id must be compared without minting
    /// a new counter value.
    pub fn from_parts(monotonic: u64, unix_seconds: u64) -> Self {
        Self(format!("BROKER-{monotonic}-{unix_seconds}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this id carries the Broker discriminator, as used by
    /// subscription synchronization to recognize Broker-created rows.
    pub fn is_broker_originated(id: &str) -> bool {
        id.contains("BROKER")
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Broker-chosen subscription id string.
///
/// Follows the wire format mandated by spec §6: `<hex-counter>-<hex-unix-seconds>-BROKER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn from_parts(counter: u64, unix_seconds: u64) -> Self {
        Self(format!("{counter:x}-{unix_seconds:x}-BROKER"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic generator for message and subscription ids.
///
/// One instance lives on the `Broker`; its counter is a plain `AtomicU64`
/// rather than loop-local state purely so `MessageId`/`SubscriptionId` can be
/// minted from contexts (e.g. deep inside the Operation Adapter) without
/// threading a `&mut` counter through every call. The cooperative loop is
/// still the only thread that ever calls `next_*`, so the atomic never sees
/// contention; it is not a concurrency primitive.
#[derive(Debug)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    fn unix_seconds() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn next_message_id(&self) -> MessageId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        MessageId::from_parts(n, Self::unix_seconds())
    }

    pub fn next_subscription_id(&self) -> SubscriptionId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        SubscriptionId::from_parts(n, Self::unix_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_format_carries_broker_discriminator() {
        let id = MessageId::from_parts(7, 1_700_000_000);
        assert_eq!(id.as_str(), "BROKER-7-1700000000");
        assert!(MessageId::is_broker_originated(id.as_str()));
    }

    #[test]
    fn subscription_id_format_is_hex_counter_then_hex_time_then_broker() {
        let id = SubscriptionId::from_parts(255, 16);
        assert_eq!(id.as_str(), "ff-10-BROKER");
    }

    #[test]
    fn id_generator_never_repeats_within_one_instance() {
        let gen = IdGenerator::new();
        let a = gen.next_message_id();
        let b = gen.next_message_id();
        assert_ne!(a, b);
    }

    #[test]
    fn group_id_none_is_zero() {
        assert!(GroupId::NONE.is_none());
        assert!(!GroupId::new(1).is_none());
    }
}
