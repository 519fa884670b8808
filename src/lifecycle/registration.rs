//! The Registration Protocol: Register/Deregister, schema import, and the
//! subscription reconciliation pass that follows a successful Register
//! (§4.2, §4.3, §4.5).

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use chrono::Utc;

use crate::error::BrokerError;
use crate::ids::{EndpointId, GroupId, IdGenerator};
use crate::message::{
    DeregisterRequest, DeregisterResponse, DeregisterResultEntry, RegisterOutcome, RegisterRequest,
    RegisterResponse, RegisterResultEntry,
};
use crate::monitoring::{Monitor, OperationEvent, RegistrationEvent, RegistrationEventKind};
use crate::operation::adapter::OperationAdapter;
use crate::operation::collaborators::{RequestTable, RequestTableOutcome, SubscriptionTable};
use crate::operation::subscription_sync::sync_subscriptions;
use crate::registry::ServiceRegistry;
use crate::schema::{import_response, validate_register_prefix, SchemaTree};
use crate::transport::Mtp;

/// Classifies one requested prefix against path validation (§4.3) and
/// cross-Service ownership (§4.2, §8 "Path ownership invariant").
fn classify_prefix<H: Clone + Eq + Hash + Debug>(
    path: &str,
    registry: &ServiceRegistry<H>,
) -> RegisterOutcome {
    if let Err(e) = validate_register_prefix(path) {
        return RegisterOutcome::Rejected {
            reason: e.to_string(),
        };
    }
    if registry.iter().any(|record| record.owns_prefix(path)) {
        return RegisterOutcome::PathAlreadyRegistered;
    }
    RegisterOutcome::Accepted
}

async fn emit_registration_event<RegMon: Monitor<RegistrationEvent>>(
    monitor: &RegMon,
    endpoint: &EndpointId,
    event_kind: RegistrationEventKind,
) {
    let event = RegistrationEvent {
        timestamp: Utc::now(),
        endpoint: endpoint.clone(),
        event_kind,
        metadata: HashMap::new(),
    };
    let _ = monitor.record(event).await;
}

/// Processes a Register request for a single Service (§4.2).
///
/// A Service may register exactly once; a second Register from an endpoint
/// that already owns at least one prefix is refused outright. Within one
/// call, `allow_partial=false` makes the whole set atomic: any prefix that
/// fails classification voids every prefix in the batch, and nothing is
/// committed. `allow_partial=true` commits whichever prefixes were accepted
/// and reports the rest.
///
/// Every accepted prefix gets a placeholder schema node immediately, so a
/// Get arriving before GetSupportedDM resolves still finds something there
/// (§4.2). The GetSupportedDM round-trip and Subscription Synchronization
/// that follow a non-empty acceptance are best-effort: a failure there is
/// logged (via a monitoring event rather than propagated) and leaves the
/// placeholder in place rather than failing Register itself, since the
/// Service is registered either way and a later retry can still resolve it.
#[allow(clippy::too_many_arguments)]
pub async fn register<T, OpMon, RegMon>(
    adapter: &OperationAdapter<T, OpMon>,
    registry: &mut ServiceRegistry<T::Handle>,
    schema: &mut SchemaTree,
    subscription_table: &dyn SubscriptionTable,
    monitor: &RegMon,
    id_gen: &IdGenerator,
    endpoint: &EndpointId,
    request: RegisterRequest,
) -> Result<RegisterResponse, BrokerError>
where
    T: Mtp,
    OpMon: Monitor<OperationEvent>,
    RegMon: Monitor<RegistrationEvent>,
{
    let (group, already_registered) = {
        let record = registry
            .find_by_endpoint(endpoint)
            .ok_or_else(|| BrokerError::internal(format!("no Service record for {endpoint}")))?;
        (record.group, record.has_registered_anything())
    };

    if already_registered {
        return Err(BrokerError::register_failure(
            endpoint.as_str(),
            "Service has already completed registration",
        ));
    }

    let mut outcomes: Vec<(String, RegisterOutcome)> = request
        .requested_paths
        .iter()
        .map(|path| (path.clone(), classify_prefix(path, registry)))
        .collect();

    let all_accepted = outcomes
        .iter()
        .all(|(_, outcome)| matches!(outcome, RegisterOutcome::Accepted));

    if !request.allow_partial && !all_accepted {
        for (_, outcome) in outcomes.iter_mut() {
            if matches!(outcome, RegisterOutcome::Accepted) {
                *outcome = RegisterOutcome::Rejected {
                    reason: "registration aborted: another requested path in this batch failed \
                             and allow_partial is false"
                        .to_string(),
                };
            }
        }
    }

    for (path, outcome) in &outcomes {
        match outcome {
            RegisterOutcome::Accepted => {
                emit_registration_event(
                    monitor,
                    endpoint,
                    RegistrationEventKind::PrefixAccepted {
                        prefix: path.clone(),
                    },
                )
                .await;
            }
            RegisterOutcome::Rejected { reason } => {
                emit_registration_event(
                    monitor,
                    endpoint,
                    RegistrationEventKind::PrefixRejected {
                        prefix: path.clone(),
                        reason: reason.clone(),
                    },
                )
                .await;
            }
            RegisterOutcome::PathAlreadyRegistered => {
                emit_registration_event(
                    monitor,
                    endpoint,
                    RegistrationEventKind::PrefixRejected {
                        prefix: path.clone(),
                        reason: "path already registered".to_string(),
                    },
                )
                .await;
            }
        }
    }

    let accepted_paths: Vec<String> = outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, RegisterOutcome::Accepted))
        .map(|(path, _)| path.clone())
        .collect();

    let results = outcomes
        .into_iter()
        .map(|(path, outcome)| RegisterResultEntry { path, outcome })
        .collect();

    if accepted_paths.is_empty() {
        return Ok(RegisterResponse { results });
    }

    {
        let record = registry
            .find_by_endpoint_mut(endpoint)
            .ok_or_else(|| BrokerError::internal(format!("no Service record for {endpoint}")))?;
        for path in &accepted_paths {
            schema.insert_placeholder(path, group);
            record.registered_prefixes.push(path.clone());
        }
    }

    resolve_schema_and_subscriptions(
        adapter,
        registry,
        schema,
        subscription_table,
        monitor,
        id_gen,
        endpoint,
        group,
        accepted_paths,
    )
    .await;

    Ok(RegisterResponse { results })
}

/// GetSupportedDM + import + refresh-instances + Subscription
/// Synchronization, run after at least one prefix was accepted (§4.2, §4.5).
/// Every step here is best-effort: failures are swallowed per §7(iii) rather
/// than failing the Register call that already succeeded.
#[allow(clippy::too_many_arguments)]
async fn resolve_schema_and_subscriptions<T, OpMon, RegMon>(
    adapter: &OperationAdapter<T, OpMon>,
    registry: &mut ServiceRegistry<T::Handle>,
    schema: &mut SchemaTree,
    subscription_table: &dyn SubscriptionTable,
    monitor: &RegMon,
    id_gen: &IdGenerator,
    endpoint: &EndpointId,
    group: GroupId,
    accepted_paths: Vec<String>,
) where
    T: Mtp,
    OpMon: Monitor<OperationEvent>,
    RegMon: Monitor<RegistrationEvent>,
{
    let dm_msg_id = id_gen.next_message_id();
    let dm_response = match adapter
        .get_supported_dm(registry, group, dm_msg_id, accepted_paths)
        .await
    {
        Ok(resp) => resp,
        Err(_) => return,
    };

    let refresh_targets = import_response(schema, group, &dm_response);
    emit_registration_event(
        monitor,
        endpoint,
        RegistrationEventKind::SchemaImported {
            object_count: dm_response.objects.len(),
        },
    )
    .await;

    for target in refresh_targets {
        let refresh_msg_id = id_gen.next_message_id();
        let _ = adapter
            .get_instances(registry, group, refresh_msg_id, vec![target])
            .await;
    }

    if let Ok(outcome) = sync_subscriptions(adapter, registry, schema, group, subscription_table, id_gen).await {
        emit_registration_event(
            monitor,
            endpoint,
            RegistrationEventKind::SubscriptionSyncCompleted {
                paired: outcome.paired,
                deleted: outcome.deleted.len(),
            },
        )
        .await;
    }
}

/// Tears down every subscription and in-flight command under `prefix`
/// before the prefix itself is pulled from the schema (§4.2 "A successful
/// deregister tears down every subscription and every in-flight command
/// whose path is a descendant of the prefix").
fn teardown_prefix<H: Clone + Eq + Hash + Debug>(
    record: &mut crate::registry::ServiceRecord<H>,
    schema: &mut SchemaTree,
    request_table: &dyn RequestTable,
    prefix: &str,
) {
    record.subs_map.remove_by_path_prefix(prefix);

    for entry in record.req_map.remove_by_path_prefix(prefix) {
        request_table.signal_operation_complete(
            entry.broker_request_instance,
            RequestTableOutcome::CommandFailure {
                code: "7000".to_string(),
                message: format!(
                    "command {} aborted: Service deregistered prefix {prefix}",
                    entry.command_path
                ),
            },
        );
    }

    schema.remove_subtree(prefix);
}

/// Processes a Deregister request (§4.2).
///
/// An empty path list (or a single empty-string path) means "every prefix
/// this Service owns": every owned prefix is removed and reported as one
/// bulk success entry. An explicit path list is evaluated per-prefix
/// instead — a path this Service doesn't own fails independently of its
/// siblings, matching the Register response shape where each requested
/// path gets its own outcome. Either way, every subscription and in-flight
/// command hanging off a removed prefix is torn down with it.
pub async fn deregister<H, RegMon>(
    registry: &mut ServiceRegistry<H>,
    schema: &mut SchemaTree,
    request_table: &dyn RequestTable,
    monitor: &RegMon,
    endpoint: &EndpointId,
    request: DeregisterRequest,
) -> Result<DeregisterResponse, BrokerError>
where
    H: Clone + Eq + Hash + Debug,
    RegMon: Monitor<RegistrationEvent>,
{
    let is_all_paths = request.paths.is_empty()
        || (request.paths.len() == 1 && request.paths[0].is_empty());

    let record = registry
        .find_by_endpoint_mut(endpoint)
        .ok_or_else(|| BrokerError::internal(format!("no Service record for {endpoint}")))?;

    if is_all_paths {
        let removed = std::mem::take(&mut record.registered_prefixes);
        for prefix in &removed {
            teardown_prefix(record, schema, request_table, prefix);
        }
        for prefix in &removed {
            emit_registration_event(
                monitor,
                endpoint,
                RegistrationEventKind::PrefixDeregistered {
                    prefix: prefix.clone(),
                },
            )
            .await;
        }
        return Ok(DeregisterResponse {
            results: vec![DeregisterResultEntry::Success { paths: removed }],
        });
    }

    let mut succeeded = Vec::with_capacity(request.paths.len());
    let mut failures = Vec::new();
    for path in request.paths {
        if record.owns_prefix(&path) {
            teardown_prefix(record, schema, request_table, &path);
            record.registered_prefixes.retain(|owned| owned != &path);
            emit_registration_event(
                monitor,
                endpoint,
                RegistrationEventKind::PrefixDeregistered {
                    prefix: path.clone(),
                },
            )
            .await;
            succeeded.push(path);
        } else {
            failures.push(DeregisterResultEntry::Failure {
                path: path.clone(),
                reason: "prefix not owned by this Service".to_string(),
            });
        }
    }

    // A single success entry lists every path successfully deregistered;
    // failures are still reported one entry per path (§4.2).
    let mut results = Vec::with_capacity(1 + failures.len());
    if !succeeded.is_empty() {
        results.push(DeregisterResultEntry::Success { paths: succeeded });
    }
    results.extend(failures);

    Ok(DeregisterResponse { results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::ids::EndpointId;
    use crate::monitoring::NoopMonitor;
    use crate::operation::collaborators::fakes::{FakeRequestTable, FakeSubscriptionTable};
    use crate::registry::TransportRole;
    use crate::transport::FakeMtp;

    fn registry_with_service() -> (ServiceRegistry<u64>, EndpointId) {
        let mut registry: ServiceRegistry<u64> = ServiceRegistry::new(4);
        let endpoint = EndpointId::new("svc-1");
        registry
            .add(endpoint.clone(), 1u64, TransportRole::Both)
            .unwrap();
        (registry, endpoint)
    }

    #[test]
    fn classify_prefix_accepts_well_formed_unowned_path() {
        let (registry, _endpoint) = registry_with_service();
        let outcome = classify_prefix("Device.WiFi.Radio.", &registry);
        assert_eq!(outcome, RegisterOutcome::Accepted);
    }

    #[test]
    fn classify_prefix_rejects_malformed_path() {
        let (registry, _endpoint) = registry_with_service();
        let outcome = classify_prefix("WiFi.Radio.", &registry);
        assert!(matches!(outcome, RegisterOutcome::Rejected { .. }));
    }

    #[test]
    fn classify_prefix_rejects_instance_number_in_prefix() {
        let (registry, _endpoint) = registry_with_service();
        let outcome = classify_prefix("Device.WiFi.Radio.1.", &registry);
        assert!(matches!(outcome, RegisterOutcome::Rejected { .. }));
    }

    #[test]
    fn classify_prefix_detects_existing_owner() {
        let (mut registry, endpoint) = registry_with_service();
        registry
            .find_by_endpoint_mut(&endpoint)
            .unwrap()
            .registered_prefixes
            .push("Device.WiFi.".to_string());
        let outcome = classify_prefix("Device.WiFi.", &registry);
        assert_eq!(outcome, RegisterOutcome::PathAlreadyRegistered);
    }

    #[tokio::test]
    async fn register_rejects_second_call_from_same_service() {
        let (mut registry, endpoint) = registry_with_service();
        registry
            .find_by_endpoint_mut(&endpoint)
            .unwrap()
            .registered_prefixes
            .push("Device.X.".to_string());

        let mut schema = SchemaTree::new();
        let subs = FakeSubscriptionTable::default();
        let mtp = FakeMtp::new();
        let adapter = OperationAdapter::new(
            mtp,
            NoopMonitor::<OperationEvent>::new(),
            BrokerConfig::default(),
        );
        let monitor = NoopMonitor::<RegistrationEvent>::new();
        let id_gen = IdGenerator::new();

        let result = register(
            &adapter,
            &mut registry,
            &mut schema,
            &subs,
            &monitor,
            &id_gen,
            &endpoint,
            RegisterRequest {
                requested_paths: vec!["Device.Y.".to_string()],
                allow_partial: true,
            },
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn register_atomic_batch_aborts_every_accepted_path_on_one_failure() {
        let (mut registry, endpoint) = registry_with_service();
        let mut schema = SchemaTree::new();
        let subs = FakeSubscriptionTable::default();
        let mtp = FakeMtp::new();
        let adapter = OperationAdapter::new(
            mtp,
            NoopMonitor::<OperationEvent>::new(),
            BrokerConfig::default(),
        );
        let monitor = NoopMonitor::<RegistrationEvent>::new();
        let id_gen = IdGenerator::new();

        let response = register(
            &adapter,
            &mut registry,
            &mut schema,
            &subs,
            &monitor,
            &id_gen,
            &endpoint,
            RegisterRequest {
                requested_paths: vec!["Device.Good.".to_string(), "bad-path".to_string()],
                allow_partial: false,
            },
        )
        .await
        .unwrap();

        assert!(response
            .results
            .iter()
            .all(|entry| matches!(entry.outcome, RegisterOutcome::Rejected { .. })));
        assert!(schema.is_empty());
        assert!(registry
            .find_by_endpoint(&endpoint)
            .unwrap()
            .registered_prefixes
            .is_empty());
    }

    #[tokio::test]
    async fn register_partial_batch_commits_accepted_paths_only() {
        let (mut registry, endpoint) = registry_with_service();
        let mut schema = SchemaTree::new();
        let subs = FakeSubscriptionTable::default();
        let mtp = FakeMtp::new();
        let mut config = BrokerConfig::default();
        config.response_timeout = std::time::Duration::from_millis(20);
        let adapter = OperationAdapter::new(mtp, NoopMonitor::<OperationEvent>::new(), config);
        let monitor = NoopMonitor::<RegistrationEvent>::new();
        let id_gen = IdGenerator::new();

        let response = register(
            &adapter,
            &mut registry,
            &mut schema,
            &subs,
            &monitor,
            &id_gen,
            &endpoint,
            RegisterRequest {
                requested_paths: vec!["Device.Good.".to_string(), "bad-path".to_string()],
                allow_partial: true,
            },
        )
        .await
        .unwrap();

        let good = response
            .results
            .iter()
            .find(|entry| entry.path == "Device.Good.")
            .unwrap();
        assert_eq!(good.outcome, RegisterOutcome::Accepted);
        assert!(schema.contains("Device.Good."));
        assert!(registry
            .find_by_endpoint(&endpoint)
            .unwrap()
            .owns_prefix("Device.Good."));
    }

    #[tokio::test]
    async fn deregister_all_paths_clears_every_owned_prefix() {
        let (mut registry, endpoint) = registry_with_service();
        {
            let record = registry.find_by_endpoint_mut(&endpoint).unwrap();
            record.registered_prefixes.push("Device.X.".to_string());
            record.registered_prefixes.push("Device.Y.".to_string());
        }
        let mut schema = SchemaTree::new();
        schema.insert_placeholder("Device.X.", GroupId::new(1));
        schema.insert_placeholder("Device.Y.", GroupId::new(1));
        {
            let record = registry.find_by_endpoint_mut(&endpoint).unwrap();
            record
                .req_map
                .try_insert(crate::operation::adapter::pending_req_entry(1, "Device.X.Run()", "K1"));
            record.subs_map.insert(crate::registry::SubsEntry {
                broker_instance: 1,
                service_instance: 1,
                subscription_id: crate::ids::SubscriptionId::from_parts(1, 1),
                path: "Device.X.".to_string(),
            });
        }
        let request_table = FakeRequestTable::default();
        let monitor = NoopMonitor::<RegistrationEvent>::new();

        let response = deregister(
            &mut registry,
            &mut schema,
            &request_table,
            &monitor,
            &endpoint,
            DeregisterRequest { paths: vec![] },
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 1);
        assert!(matches!(
            &response.results[0],
            DeregisterResultEntry::Success { paths } if paths.len() == 2
        ));
        assert!(registry
            .find_by_endpoint(&endpoint)
            .unwrap()
            .registered_prefixes
            .is_empty());
        assert!(schema.is_empty());
        assert!(registry.find_by_endpoint(&endpoint).unwrap().subs_map.is_empty());
        assert!(registry.find_by_endpoint(&endpoint).unwrap().req_map.is_empty());
        let completed = request_table.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(matches!(completed[0].1, RequestTableOutcome::CommandFailure { .. }));
    }

    #[tokio::test]
    async fn deregister_explicit_path_not_owned_fails_independently() {
        let (mut registry, endpoint) = registry_with_service();
        registry
            .find_by_endpoint_mut(&endpoint)
            .unwrap()
            .registered_prefixes
            .push("Device.X.".to_string());
        let mut schema = SchemaTree::new();
        schema.insert_placeholder("Device.X.", GroupId::new(1));
        let request_table = FakeRequestTable::default();
        let monitor = NoopMonitor::<RegistrationEvent>::new();

        let response = deregister(
            &mut registry,
            &mut schema,
            &request_table,
            &monitor,
            &endpoint,
            DeregisterRequest {
                paths: vec!["Device.X.".to_string(), "Device.Unowned.".to_string()],
            },
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 2);
        assert!(matches!(
            response.results[0],
            DeregisterResultEntry::Success { .. }
        ));
        assert!(matches!(
            response.results[1],
            DeregisterResultEntry::Failure { .. }
        ));
    }

    #[tokio::test]
    async fn deregister_explicit_paths_aggregate_into_one_success_entry() {
        let (mut registry, endpoint) = registry_with_service();
        {
            let record = registry.find_by_endpoint_mut(&endpoint).unwrap();
            record.registered_prefixes.push("Device.X.".to_string());
            record.registered_prefixes.push("Device.Y.".to_string());
        }
        let mut schema = SchemaTree::new();
        schema.insert_placeholder("Device.X.", GroupId::new(1));
        schema.insert_placeholder("Device.Y.", GroupId::new(1));
        let request_table = FakeRequestTable::default();
        let monitor = NoopMonitor::<RegistrationEvent>::new();

        let response = deregister(
            &mut registry,
            &mut schema,
            &request_table,
            &monitor,
            &endpoint,
            DeregisterRequest {
                paths: vec![
                    "Device.X.".to_string(),
                    "Device.Y.".to_string(),
                    "Device.Unowned.".to_string(),
                ],
            },
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 2);
        match &response.results[0] {
            DeregisterResultEntry::Success { paths } => {
                assert_eq!(
                    paths,
                    &vec!["Device.X.".to_string(), "Device.Y.".to_string()]
                );
            }
            other => panic!("expected a single aggregated Success entry, got {other:?}"),
        }
        assert!(matches!(
            response.results[1],
            DeregisterResultEntry::Failure { .. }
        ));
    }
}
