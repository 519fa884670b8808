//! Monitoring event types and configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::traits::{EventSeverity, MonitoringEvent};
use crate::ids::{EndpointId, GroupId};

/// Configuration for monitoring behavior.
///
/// Controls how events are recorded, filtered, and stored in the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringConfig {
    /// Whether monitoring is enabled
    pub enabled: bool,

    /// Maximum number of events to keep in history
    pub max_history_size: usize,

    /// Minimum severity level to record (events below this are filtered)
    pub severity_filter: EventSeverity,

    /// Interval for snapshot generation (if using background snapshots)
    #[serde(with = "crate::util::duration_serde")]
    pub snapshot_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history_size: 1000,
            severity_filter: EventSeverity::Info,
            snapshot_interval: Duration::from_secs(60),
        }
    }
}

/// Snapshot of monitoring state at a point in time.
///
/// Provides queryable access to monitoring counters and recent event history.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSnapshot<E: MonitoringEvent> {
    /// Timestamp when snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Total number of events recorded
    pub total_events: u64,

    /// Number of trace-level events
    pub trace_count: u64,

    /// Number of debug-level events
    pub debug_count: u64,

    /// Number of info-level events
    pub info_count: u64,

    /// Number of warning-level events
    pub warning_count: u64,

    /// Number of error-level events
    pub error_count: u64,

    /// Number of critical-level events
    pub critical_count: u64,

    /// Recent events (up to max_history_size)
    pub recent_events: Vec<E>,
}

// ============================================================================
// Service lifecycle events (§4.1, §4.8 connect/register/deregister/disconnect)
// ============================================================================

/// Events related to a Service's lifecycle in the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceEvent {
    pub timestamp: DateTime<Utc>,

    /// Endpoint of the Service this event concerns.
    pub endpoint: EndpointId,

    pub event_kind: ServiceEventKind,

    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for ServiceEvent {
    const EVENT_TYPE: &'static str = "service";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            ServiceEventKind::Connected { .. } => EventSeverity::Info,
            ServiceEventKind::TransportUpdated { .. } => EventSeverity::Debug,
            ServiceEventKind::TransportLost { .. } => EventSeverity::Warning,
            ServiceEventKind::Destroyed => EventSeverity::Info,
            ServiceEventKind::AddRejected { .. } => EventSeverity::Error,
        }
    }
}

/// Specific Service Registry lifecycle events (§4.1).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServiceEventKind {
    /// A new Service record was created via `Add` (§4.1).
    Connected { group: GroupId },

    /// `UpdateTransport` replaced a transport handle.
    TransportUpdated { controller_side: bool },

    /// `HandleDisconnect` cleared a transport handle.
    TransportLost { controller_side: bool },

    /// The record was destroyed because both transport handles are absent.
    Destroyed,

    /// `Add` failed: registry capacity or group-id space exhausted.
    AddRejected { reason: String },
}

// ============================================================================
// Registration protocol events (§4.2)
// ============================================================================

/// Events related to Register/Deregister processing and schema import.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationEvent {
    pub timestamp: DateTime<Utc>,

    pub endpoint: EndpointId,

    pub event_kind: RegistrationEventKind,

    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for RegistrationEvent {
    const EVENT_TYPE: &'static str = "registration";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            RegistrationEventKind::PrefixAccepted { .. } => EventSeverity::Info,
            RegistrationEventKind::PrefixRejected { .. } => EventSeverity::Warning,
            RegistrationEventKind::SchemaImported { .. } => EventSeverity::Info,
            RegistrationEventKind::SubscriptionSyncCompleted { .. } => EventSeverity::Info,
            RegistrationEventKind::PrefixDeregistered { .. } => EventSeverity::Info,
        }
    }
}

/// Specific registration-protocol events (§4.2, §4.5).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RegistrationEventKind {
    /// A requested prefix passed validation and ownership checks.
    PrefixAccepted { prefix: String },

    /// A requested prefix failed validation or was already owned.
    PrefixRejected { prefix: String, reason: String },

    /// `GetSupportedDM` response was imported into the schema tree.
    SchemaImported { object_count: usize },

    /// Subscription Synchronization (§4.5) finished reconciling a Service's
    /// subscription table.
    SubscriptionSyncCompleted {
        paired: usize,
        deleted: usize,
    },

    /// A prefix was removed via `Deregister`.
    PrefixDeregistered { prefix: String },
}

// ============================================================================
// Operation Adapter events (§4.4)
// ============================================================================

/// Events related to unified data-model operation round-trips.
#[derive(Debug, Clone, Serialize)]
pub struct OperationEvent {
    pub timestamp: DateTime<Utc>,

    pub endpoint: EndpointId,

    pub event_kind: OperationEventKind,

    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for OperationEvent {
    const EVENT_TYPE: &'static str = "operation";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            OperationEventKind::RoundTripStarted { .. } => EventSeverity::Trace,
            OperationEventKind::RoundTripCompleted { .. } => EventSeverity::Trace,
            OperationEventKind::RoundTripTimedOut { .. } => EventSeverity::Error,
            OperationEventKind::AsyncCommandStarted { .. } => EventSeverity::Info,
            OperationEventKind::AsyncCommandCompleted { .. } => EventSeverity::Info,
            OperationEventKind::AsyncCommandFailed { .. } => EventSeverity::Warning,
        }
    }
}

/// Specific operation-adapter events (§4.4).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OperationEventKind {
    /// A request/response round-trip was submitted to the transport layer.
    RoundTripStarted { operation: String },

    /// The round-trip's response arrived and was decoded.
    RoundTripCompleted {
        operation: String,
        duration_micros: u64,
    },

    /// The 30-second deadline elapsed with no typed response (§4.4, §5).
    RoundTripTimedOut { operation: String },

    /// An async Operate's ReqMap entry was inserted before sending (§4.4).
    AsyncCommandStarted { command_path: String, command_key: String },

    /// A ReqMap entry was resolved by a matching OperationComplete (§4.6).
    AsyncCommandCompleted { command_path: String, command_key: String },

    /// A ReqMap entry was resolved by synthesized CommandFailure (§4.8).
    AsyncCommandFailed {
        command_path: String,
        command_key: String,
        reason: String,
    },
}

// ============================================================================
// Passthrough Router events (§4.7)
// ============================================================================

/// Events related to passthrough eligibility decisions and wire forwarding.
#[derive(Debug, Clone, Serialize)]
pub struct PassthroughEvent {
    pub timestamp: DateTime<Utc>,

    pub endpoint: EndpointId,

    pub event_kind: PassthroughEventKind,

    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for PassthroughEvent {
    const EVENT_TYPE: &'static str = "passthrough";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            PassthroughEventKind::Accepted { .. } => EventSeverity::Trace,
            PassthroughEventKind::Declined { .. } => EventSeverity::Trace,
            PassthroughEventKind::ResponseMatched { .. } => EventSeverity::Trace,
            PassthroughEventKind::ResponseUnmatched { .. } => EventSeverity::Warning,
        }
    }
}

/// Specific passthrough-router events (§4.7).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum PassthroughEventKind {
    /// A request qualified for passthrough and was forwarded unchanged.
    Accepted { broker_msg_id: String },

    /// A request failed an eligibility check; normal handlers took over.
    Declined { reason: String },

    /// A response was matched against a MsgMap entry and delivered back.
    ResponseMatched { broker_msg_id: String },

    /// A response's `msg_id` had no MsgMap entry (originator already timed out).
    ResponseUnmatched { msg_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> EndpointId {
        EndpointId::new("urn:dev:test-service")
    }

    #[test]
    fn test_monitoring_config_default() {
        let config = MonitoringConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_history_size, 1000);
        assert_eq!(config.severity_filter, EventSeverity::Info);
        assert_eq!(config.snapshot_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_service_event_severity() {
        let event = ServiceEvent {
            timestamp: Utc::now(),
            endpoint: endpoint(),
            event_kind: ServiceEventKind::TransportLost {
                controller_side: true,
            },
            metadata: HashMap::new(),
        };

        assert_eq!(event.severity(), EventSeverity::Warning);
        assert_eq!(ServiceEvent::EVENT_TYPE, "service");
    }

    #[test]
    fn test_registration_event_severity() {
        let event = RegistrationEvent {
            timestamp: Utc::now(),
            endpoint: endpoint(),
            event_kind: RegistrationEventKind::PrefixRejected {
                prefix: "Device.Wi-Fi.".to_string(),
                reason: "already registered".to_string(),
            },
            metadata: HashMap::new(),
        };

        assert_eq!(event.severity(), EventSeverity::Warning);
        assert_eq!(RegistrationEvent::EVENT_TYPE, "registration");
    }

    #[test]
    fn test_operation_event_timeout_is_error() {
        let event = OperationEvent {
            timestamp: Utc::now(),
            endpoint: endpoint(),
            event_kind: OperationEventKind::RoundTripTimedOut {
                operation: "Get".to_string(),
            },
            metadata: HashMap::new(),
        };

        assert_eq!(event.severity(), EventSeverity::Error);
        assert_eq!(OperationEvent::EVENT_TYPE, "operation");
    }

    #[test]
    fn test_passthrough_event_unmatched_is_warning() {
        let event = PassthroughEvent {
            timestamp: Utc::now(),
            endpoint: endpoint(),
            event_kind: PassthroughEventKind::ResponseUnmatched {
                msg_id: "BROKER-9-1".to_string(),
            },
            metadata: HashMap::new(),
        };

        assert_eq!(event.severity(), EventSeverity::Warning);
        assert_eq!(PassthroughEvent::EVENT_TYPE, "passthrough");
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_registration_event_kind_serialization() {
        let kind = RegistrationEventKind::PrefixRejected {
            prefix: "Device.X.".to_string(),
            reason: "conflict".to_string(),
        };

        let json = serde_json::to_string(&kind).expect("Serialization should succeed");
        assert!(json.contains("PrefixRejected"));
        assert!(json.contains("conflict"));
    }

    #[test]
    fn test_monitoring_snapshot_creation() {
        let snapshot = MonitoringSnapshot::<ServiceEvent> {
            timestamp: Utc::now(),
            total_events: 100,
            trace_count: 10,
            debug_count: 20,
            info_count: 30,
            warning_count: 25,
            error_count: 10,
            critical_count: 5,
            recent_events: vec![],
        };

        assert_eq!(snapshot.total_events, 100);
        assert_eq!(snapshot.trace_count, 10);
        assert_eq!(snapshot.critical_count, 5);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_event_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("custom_key".to_string(), "custom_value".to_string());

        let event = ServiceEvent {
            timestamp: Utc::now(),
            endpoint: endpoint(),
            event_kind: ServiceEventKind::Destroyed,
            metadata,
        };

        assert_eq!(
            event.metadata.get("custom_key").expect("Key should exist"),
            "custom_value"
        );
    }
}
