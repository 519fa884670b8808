//! Subscription Synchronization: reconciles a Service's own subscription
//! table with the Broker's subscription state immediately after schema
//! import (§4.5).

use crate::error::BrokerError;
use crate::ids::{GroupId, IdGenerator, SubscriptionId};
use crate::message::GetResult;
use crate::monitoring::Monitor;
use crate::operation::adapter::OperationAdapter;
use crate::operation::collaborators::SubscriptionTable;
use crate::registry::{ServiceRegistry, SubsEntry};
use crate::schema::SchemaTree;
use crate::transport::Mtp;

const SUBSCRIPTION_TABLE_PREFIX: &str = "Device.LocalAgent.Subscription.";

/// One decoded row of the Service's own `Device.LocalAgent.Subscription.`
/// table (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRow {
    pub service_instance: u32,
    pub id: String,
    pub enable: Option<bool>,
    pub reference_list: String,
}

/// Groups the flat Get results from `Device.LocalAgent.Subscription.` into
/// per-row structures, keyed by the instance segment immediately after the
/// table prefix.
fn parse_subscription_table(results: &[GetResult]) -> Vec<SubscriptionRow> {
    use std::collections::BTreeMap;

    let mut by_instance: BTreeMap<u32, SubscriptionRow> = BTreeMap::new();

    for result in results {
        let GetResult::Value { resolved_path, value } = result else {
            continue;
        };
        let Some(rest) = resolved_path.strip_prefix(SUBSCRIPTION_TABLE_PREFIX) else {
            continue;
        };
        let mut parts = rest.splitn(2, '.');
        let Some(instance_str) = parts.next() else {
            continue;
        };
        let Ok(instance) = instance_str.parse::<u32>() else {
            continue;
        };
        let Some(field) = parts.next() else {
            continue;
        };

        let row = by_instance.entry(instance).or_insert_with(|| SubscriptionRow {
            service_instance: instance,
            id: String::new(),
            enable: None,
            reference_list: String::new(),
        });

        match field {
            "ID" => row.id = value.clone(),
            "Enable" => row.enable = value.parse::<bool>().ok(),
            "ReferenceList" => row.reference_list = value.clone(),
            _ => {}
        }
    }

    by_instance.into_values().collect()
}

/// What to do with one reconciled row (§4.5's five-way decision tree).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    Delete,
    Skip,
    Pair { broker_instance: u32 },
}

fn decide(
    row: &SubscriptionRow,
    schema: &SchemaTree,
    group: GroupId,
    already_paired: bool,
    subscription_table: &dyn SubscriptionTable,
) -> Decision {
    if row.enable != Some(true) {
        return Decision::Delete;
    }
    let Some(node) = schema.get(&row.reference_list) else {
        return Decision::Skip;
    };
    if node.group != group {
        return Decision::Delete;
    }
    if already_paired {
        return Decision::Skip;
    }
    match subscription_table.bind_first_unbound_matching(group, &row.reference_list) {
        Some(broker_instance) => Decision::Pair { broker_instance },
        None => Decision::Delete,
    }
}

/// Outcome of a completed reconciliation pass, for logging and for §8's
/// convergence property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub paired: usize,
    pub deleted: Vec<u32>,
}

/// Runs Subscription Synchronization for `group` against `registry`'s
/// Service record, using `subscription_table` as the Broker's own
/// Subscription-table collaborator (§4.5).
pub async fn sync_subscriptions<T, Mon>(
    adapter: &OperationAdapter<T, Mon>,
    registry: &mut ServiceRegistry<T::Handle>,
    schema: &SchemaTree,
    group: GroupId,
    subscription_table: &dyn SubscriptionTable,
    id_gen: &IdGenerator,
) -> Result<SyncOutcome, BrokerError>
where
    T: Mtp,
    Mon: Monitor<crate::monitoring::OperationEvent>,
{
    let msg_id = id_gen.next_message_id();
    let results = adapter
        .get(
            registry,
            group,
            msg_id,
            vec![SUBSCRIPTION_TABLE_PREFIX.to_string()],
        )
        .await?;
    let rows = parse_subscription_table(&results);
    // §4.5: only rows whose ID carries the Broker-unique marker are Broker
    // rows at all; everything else belongs to the Service itself and must
    // be left completely untouched.
    let broker_rows: Vec<&SubscriptionRow> = rows
        .iter()
        .filter(|row| crate::ids::MessageId::is_broker_originated(&row.id))
        .collect();

    let mut outcome = SyncOutcome::default();
    let mut to_delete: Vec<u32> = Vec::new();

    let record = registry
        .find_by_group_mut(group)
        .ok_or_else(|| BrokerError::internal(format!("no Service owns group {group}")))?;

    for row in broker_rows {
        let already_paired = record
            .subs_map
            .entries()
            .iter()
            .any(|e| e.subscription_id.as_str() == row.id);

        match decide(row, schema, group, already_paired, subscription_table) {
            Decision::Delete => to_delete.push(row.service_instance),
            Decision::Skip => {}
            Decision::Pair { broker_instance } => {
                record.subs_map.insert(SubsEntry {
                    broker_instance,
                    service_instance: row.service_instance,
                    subscription_id: SubscriptionId::from_parts(
                        broker_instance as u64,
                        0,
                    ),
                    path: row.reference_list.clone(),
                });
                outcome.paired += 1;
            }
        }
    }

    for instance in &to_delete {
        let delete_msg_id = id_gen.next_message_id();
        let path = format!("{SUBSCRIPTION_TABLE_PREFIX}{instance}.");
        // §7(iii): reconciliation deletion errors are logged and swallowed.
        let _ = adapter
            .delete(registry, group, delete_msg_id, vec![path], false)
            .await;
    }
    outcome.deleted = to_delete;

    subscription_table.start_all_vendor_layer_subs(group);

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamError;
    use crate::message::GetResult;
    use crate::schema::{ObjectKind, SchemaNode};

    #[test]
    fn non_broker_row_would_pair_if_reached_but_must_be_filtered_first() {
        let row = SubscriptionRow {
            service_instance: 9,
            id: "vendor-native-sub-1".to_string(),
            enable: Some(true),
            reference_list: "Device.X.".to_string(),
        };
        let mut schema = SchemaTree::new();
        schema.insert(SchemaNode {
            path: "Device.X.".to_string(),
            kind: ObjectKind::SingleInstance,
            group: GroupId::new(1),
            params: vec![],
            events: vec![],
            commands: vec![],
        });
        let subs = crate::operation::collaborators::fakes::FakeSubscriptionTable::default();
        subs.unbound_candidates
            .lock()
            .unwrap()
            .push((GroupId::new(1), "Device.X.".to_string(), 7));

        // decide() alone has no way to know this row isn't Broker-owned —
        // it would happily pair it.
        assert_eq!(
            decide(&row, &schema, GroupId::new(1), false, &subs),
            Decision::Pair { broker_instance: 7 }
        );
        // sync_subscriptions's row filter is what actually protects a
        // Service's own non-Broker-originated rows (§4.5): this row never
        // reaches decide() in practice because it carries no marker.
        assert!(!crate::ids::MessageId::is_broker_originated(&row.id));
    }

    #[test]
    fn parses_flat_get_results_into_rows() {
        let results = vec![
            GetResult::Value {
                resolved_path: "Device.LocalAgent.Subscription.3.ID".to_string(),
                value: "ff-10-BROKER".to_string(),
            },
            GetResult::Value {
                resolved_path: "Device.LocalAgent.Subscription.3.Enable".to_string(),
                value: "true".to_string(),
            },
            GetResult::Value {
                resolved_path: "Device.LocalAgent.Subscription.3.ReferenceList".to_string(),
                value: "Device.X.".to_string(),
            },
            GetResult::Error(ParamError::new("Device.LocalAgent.Subscription.4.ID", "9005", "gone")),
        ];
        let rows = parse_subscription_table(&results);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service_instance, 3);
        assert_eq!(rows[0].enable, Some(true));
        assert_eq!(rows[0].reference_list, "Device.X.");
    }

    #[test]
    fn decide_deletes_disabled_broker_rows() {
        let row = SubscriptionRow {
            service_instance: 1,
            id: "x-BROKER".to_string(),
            enable: Some(false),
            reference_list: "Device.X.".to_string(),
        };
        let schema = SchemaTree::new();
        let subs = crate::operation::collaborators::fakes::FakeSubscriptionTable::default();
        assert_eq!(
            decide(&row, &schema, GroupId::new(1), false, &subs),
            Decision::Delete
        );
    }

    #[test]
    fn decide_skips_when_reference_path_not_yet_known() {
        let row = SubscriptionRow {
            service_instance: 1,
            id: "x-BROKER".to_string(),
            enable: Some(true),
            reference_list: "Device.Unknown.".to_string(),
        };
        let schema = SchemaTree::new();
        let subs = crate::operation::collaborators::fakes::FakeSubscriptionTable::default();
        assert_eq!(
            decide(&row, &schema, GroupId::new(1), false, &subs),
            Decision::Skip
        );
    }

    #[test]
    fn decide_deletes_when_path_owned_by_different_group() {
        let row = SubscriptionRow {
            service_instance: 1,
            id: "x-BROKER".to_string(),
            enable: Some(true),
            reference_list: "Device.X.".to_string(),
        };
        let mut schema = SchemaTree::new();
        schema.insert(SchemaNode {
            path: "Device.X.".to_string(),
            kind: ObjectKind::SingleInstance,
            group: GroupId::new(99),
            params: vec![],
            events: vec![],
            commands: vec![],
        });
        let subs = crate::operation::collaborators::fakes::FakeSubscriptionTable::default();
        assert_eq!(
            decide(&row, &schema, GroupId::new(1), false, &subs),
            Decision::Delete
        );
    }

    #[test]
    fn decide_pairs_when_binding_candidate_exists() {
        let row = SubscriptionRow {
            service_instance: 1,
            id: "x-BROKER".to_string(),
            enable: Some(true),
            reference_list: "Device.X.".to_string(),
        };
        let mut schema = SchemaTree::new();
        schema.insert(SchemaNode {
            path: "Device.X.".to_string(),
            kind: ObjectKind::SingleInstance,
            group: GroupId::new(1),
            params: vec![],
            events: vec![],
            commands: vec![],
        });
        let subs = crate::operation::collaborators::fakes::FakeSubscriptionTable::default();
        subs.unbound_candidates
            .lock()
            .unwrap()
            .push((GroupId::new(1), "Device.X.".to_string(), 7));
        assert_eq!(
            decide(&row, &schema, GroupId::new(1), false, &subs),
            Decision::Pair { broker_instance: 7 }
        );
    }
}
