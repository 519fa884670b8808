//! The Notification Router: validates incoming NOTIFY messages and routes
//! them to the local Subscription table, resolving ReqMap entries for
//! OperationComplete along the way (§4.6).

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::BrokerError;
use crate::ids::EndpointId;
use crate::message::{Notify, OperationCompleteOutcome};
use crate::operation::collaborators::{RequestTable, RequestTableOutcome};
use crate::registry::ServiceRegistry;

/// What happened to an incoming notification after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Routed to the local Subscription table for delivery to the
    /// Controller that created the Broker-side subscription.
    Routed,

    /// An OperationComplete additionally resolved a ReqMap entry and its
    /// Request-table row.
    OperationCompleteResolved { broker_request_instance: u32 },

    /// An OperationComplete matched no ReqMap entry; tolerated, logged and
    /// discarded rather than treated as an error (§4.6).
    UnmatchedOperationComplete,
}

/// Validates and routes one incoming notification (§4.6).
///
/// Returns `Err` only for protocol violations that must be answered with a
/// USP ERROR on the receiving MTP: `send_resp=true`, an unknown originator,
/// or a `subscription_id` with no SubsMap entry.
pub fn route_notification<H: Clone + Eq + Hash + Debug>(
    registry: &mut ServiceRegistry<H>,
    request_table: &dyn RequestTable,
    originator: &EndpointId,
    subscription_id: &str,
    send_resp: bool,
    notify: &Notify,
) -> Result<NotificationOutcome, BrokerError> {
    if send_resp {
        return Err(BrokerError::message_not_understood(
            "NOTIFY must not request a response (§4.6)",
        ));
    }

    let record = registry.find_by_endpoint_mut(originator).ok_or_else(|| {
        BrokerError::message_not_understood(format!("unknown originator {originator}"))
    })?;

    if record
        .subs_map
        .find_by_subscription_id(subscription_id)
        .is_none()
    {
        return Err(BrokerError::message_not_understood(format!(
            "subscription id {subscription_id} has no SubsMap entry"
        )));
    }

    if let Notify::OperationComplete {
        object_path,
        command_name,
        command_key,
        outcome,
    } = notify
    {
        let full_path = format!("{object_path}{command_name}");
        let Some(entry) = record.req_map.find_by_path_and_key(&full_path, command_key) else {
            return Ok(NotificationOutcome::UnmatchedOperationComplete);
        };
        let broker_request_instance = entry.broker_request_instance;
        record
            .req_map
            .remove_by_path_and_key(&full_path, command_key);

        let table_outcome = match outcome {
            OperationCompleteOutcome::Success { output_args } => RequestTableOutcome::Success {
                output_args: output_args
                    .iter()
                    .map(|p| (p.path.clone(), p.value.clone()))
                    .collect(),
            },
            OperationCompleteOutcome::CommandFailure { code, message } => {
                RequestTableOutcome::CommandFailure {
                    code: code.clone(),
                    message: message.clone(),
                }
            }
        };
        request_table.signal_operation_complete(broker_request_instance, table_outcome);

        return Ok(NotificationOutcome::OperationCompleteResolved {
            broker_request_instance,
        });
    }

    Ok(NotificationOutcome::Routed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SubscriptionId;
    use crate::operation::adapter::pending_req_entry;
    use crate::operation::collaborators::fakes::FakeRequestTable;
    use crate::registry::{ServiceRecord, SubsEntry};

    fn record_with_sub_and_req() -> (ServiceRegistry<u64>, EndpointId, SubscriptionId) {
        let mut registry: ServiceRegistry<u64> = ServiceRegistry::new(1);
        let endpoint = EndpointId::new("svc-1");
        let record: &mut ServiceRecord<u64> = registry
            .add(endpoint.clone(), 1, crate::registry::TransportRole::Both)
            .unwrap();
        let sub_id = SubscriptionId::from_parts(1, 1);
        record.subs_map.insert(SubsEntry {
            broker_instance: 1,
            service_instance: 1,
            subscription_id: sub_id.clone(),
            path: "Device.X.Run()".to_string(),
        });
        record
            .req_map
            .try_insert(pending_req_entry(1, "Device.X.Run()", "K1"));
        (registry, endpoint, sub_id)
    }

    #[test]
    fn rejects_notify_with_send_resp_true() {
        let (mut registry, endpoint, sub_id) = record_with_sub_and_req();
        let request_table = FakeRequestTable::default();
        let notify = Notify::ObjectCreation {
            instantiated_path: "Device.X.1.".to_string(),
        };
        let result = route_notification(
            &mut registry,
            &request_table,
            &endpoint,
            sub_id.as_str(),
            true,
            &notify,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_subscription_id() {
        let (mut registry, endpoint, _sub_id) = record_with_sub_and_req();
        let request_table = FakeRequestTable::default();
        let notify = Notify::ObjectCreation {
            instantiated_path: "Device.X.1.".to_string(),
        };
        let result = route_notification(
            &mut registry,
            &request_table,
            &endpoint,
            "no-such-id",
            false,
            &notify,
        );
        assert!(result.is_err());
    }

    #[test]
    fn operation_complete_resolves_req_map_and_request_table() {
        let (mut registry, endpoint, sub_id) = record_with_sub_and_req();
        let request_table = FakeRequestTable::default();
        let notify = Notify::OperationComplete {
            object_path: "Device.X.".to_string(),
            command_name: "Run()".to_string(),
            command_key: "K1".to_string(),
            outcome: OperationCompleteOutcome::Success { output_args: vec![] },
        };
        let outcome = route_notification(
            &mut registry,
            &request_table,
            &endpoint,
            sub_id.as_str(),
            false,
            &notify,
        )
        .unwrap();
        assert_eq!(
            outcome,
            NotificationOutcome::OperationCompleteResolved {
                broker_request_instance: 1
            }
        );
        assert!(request_table.completed.lock().unwrap().len() == 1);

        let record = registry.find_by_endpoint(&endpoint).unwrap();
        assert!(record.req_map.is_empty());
    }

    #[test]
    fn unmatched_operation_complete_is_tolerated() {
        let (mut registry, endpoint, sub_id) = record_with_sub_and_req();
        let request_table = FakeRequestTable::default();
        let notify = Notify::OperationComplete {
            object_path: "Device.Other.".to_string(),
            command_name: "Run()".to_string(),
            command_key: "K9".to_string(),
            outcome: OperationCompleteOutcome::CommandFailure {
                code: "7000".to_string(),
                message: "nope".to_string(),
            },
        };
        let outcome = route_notification(
            &mut registry,
            &request_table,
            &endpoint,
            sub_id.as_str(),
            false,
            &notify,
        )
        .unwrap();
        assert_eq!(outcome, NotificationOutcome::UnmatchedOperationComplete);
    }

    #[test]
    fn ordinary_notify_is_just_routed() {
        let (mut registry, endpoint, sub_id) = record_with_sub_and_req();
        let request_table = FakeRequestTable::default();
        let notify = Notify::ValueChange {
            path: "Device.X.Y".to_string(),
            value: "1".to_string(),
        };
        let outcome = route_notification(
            &mut registry,
            &request_table,
            &endpoint,
            sub_id.as_str(),
            false,
            &notify,
        )
        .unwrap();
        assert_eq!(outcome, NotificationOutcome::Routed);
    }
}
