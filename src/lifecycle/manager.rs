//! Connect/disconnect and Failure Propagation (§4.1, §4.8).
//!
//! Register/Deregister live in [`crate::lifecycle::registration`]; this
//! module owns the Service Registry's two other lifecycle edges: bringing a
//! transport up (`connect`) and tearing one down (`disconnect`), including
//! the failure-propagation sweep that fires when a Service's
//! Broker-as-Controller handle is lost.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use chrono::Utc;

use crate::ids::{EndpointId, GroupId};
use crate::monitoring::{Monitor, ServiceEvent, ServiceEventKind};
use crate::operation::collaborators::{RequestTable, RequestTableOutcome, SubscriptionTable};
use crate::registry::{DisconnectOutcome, ServiceRecord, ServiceRegistry, TransportRole};
use crate::schema::SchemaTree;

/// Brings a transport handle up for `endpoint`, creating a new Service
/// record if none exists yet or replacing the indicated handle on an
/// existing one (§4.1 `Add`/`UpdateTransport`).
pub async fn connect<H, Mon>(
    registry: &mut ServiceRegistry<H>,
    monitor: &Mon,
    endpoint: EndpointId,
    handle: H,
    role: TransportRole,
) -> Result<GroupId, crate::error::BrokerError>
where
    H: Clone + Eq + Hash + Debug,
    Mon: Monitor<ServiceEvent>,
{
    if let Some(record) = registry.find_by_endpoint(&endpoint) {
        let group = record.group;
        registry.update_transport(&endpoint, handle, role)?;
        let _ = monitor
            .record(ServiceEvent {
                timestamp: Utc::now(),
                endpoint,
                event_kind: ServiceEventKind::TransportUpdated {
                    controller_side: matches!(role, TransportRole::ControllerSide | TransportRole::Both),
                },
                metadata: HashMap::new(),
            })
            .await;
        return Ok(group);
    }

    match registry.add(endpoint.clone(), handle, role) {
        Ok(record) => {
            let group = record.group;
            let _ = monitor
                .record(ServiceEvent {
                    timestamp: Utc::now(),
                    endpoint,
                    event_kind: ServiceEventKind::Connected { group },
                    metadata: HashMap::new(),
                })
                .await;
            Ok(group)
        }
        Err(e) => {
            let _ = monitor
                .record(ServiceEvent {
                    timestamp: Utc::now(),
                    endpoint,
                    event_kind: ServiceEventKind::AddRejected {
                        reason: e.to_string(),
                    },
                    metadata: HashMap::new(),
                })
                .await;
            Err(e)
        }
    }
}

/// Clears a transport handle for `endpoint` and, if that handle was the
/// Service's Broker-as-Controller side, runs Failure Propagation before the
/// registry potentially destroys the record (§4.1, §4.8).
///
/// Failure Propagation must run *before* `ServiceRegistry::handle_disconnect`
/// when both handles are about to become absent: `handle_disconnect`
/// destroys the record outright in that case, and a destroyed record's
/// correlation tables are gone — there would be nothing left to signal
/// `CommandFailure` against or read registered prefixes from.
///
/// Returns `None` if `endpoint` names no known Service (tolerated, not an
/// error — a disconnect racing a teardown already in progress is normal).
pub async fn disconnect<H, Mon>(
    registry: &mut ServiceRegistry<H>,
    schema: &mut SchemaTree,
    request_table: &dyn RequestTable,
    subscription_table: &dyn SubscriptionTable,
    monitor: &Mon,
    endpoint: &EndpointId,
    role: TransportRole,
) -> Option<DisconnectOutcome>
where
    H: Clone + Eq + Hash + Debug,
    Mon: Monitor<ServiceEvent>,
{
    let loses_controller_side = matches!(role, TransportRole::ControllerSide | TransportRole::Both);

    if loses_controller_side {
        if let Some(record) = registry.find_by_endpoint_mut(endpoint) {
            propagate_failure(record, schema, request_table, subscription_table);
        }
    }

    let outcome = registry.handle_disconnect(endpoint, role)?;

    let _ = monitor
        .record(ServiceEvent {
            timestamp: Utc::now(),
            endpoint: endpoint.clone(),
            event_kind: ServiceEventKind::TransportLost {
                controller_side: outcome.lost_controller_side,
            },
            metadata: HashMap::new(),
        })
        .await;

    if outcome.record_destroyed {
        let _ = monitor
            .record(ServiceEvent {
                timestamp: Utc::now(),
                endpoint: endpoint.clone(),
                event_kind: ServiceEventKind::Destroyed,
                metadata: HashMap::new(),
            })
            .await;
    }

    Some(outcome)
}

/// Failure Propagation (§4.8): every vendor-layer subscription pairing for
/// the Service is demoted to core delivery and the SubsMap is destroyed,
/// every outstanding command in ReqMap is failed synthetically and removed,
/// MsgMap is destroyed, and every prefix the Service registered is pulled
/// from the schema. The record itself is left for `handle_disconnect` to
/// decide whether to keep (Broker-as-Agent side may still be connected) or
/// destroy.
fn propagate_failure<H: Clone + Eq + Hash + Debug>(
    record: &mut ServiceRecord<H>,
    schema: &mut SchemaTree,
    request_table: &dyn RequestTable,
    subscription_table: &dyn SubscriptionTable,
) {
    subscription_table.demote_vendor_layer_subscriptions(record.group);
    record.subs_map.clear();

    for entry in record.req_map.clear() {
        request_table.signal_operation_complete(
            entry.broker_request_instance,
            RequestTableOutcome::CommandFailure {
                code: "7000".to_string(),
                message: format!(
                    "command {} aborted: Service transport lost before completion",
                    entry.command_path
                ),
            },
        );
    }

    record.msg_map.clear();

    for prefix in record.registered_prefixes.drain(..) {
        schema.remove_subtree(&prefix);
    }
}
