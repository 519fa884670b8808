//! The Passthrough Router: forwards eligible whole request messages to a
//! single owning Service unchanged except for message-id remapping (§4.7).

use std::fmt::Debug;
use std::hash::Hash;

use crate::ids::{EndpointId, GroupId, IdGenerator};
use crate::message::{UspMessage, UspMessageBody, UspRequest};
use crate::operation::collaborators::PermissionStore;
use crate::registry::{MsgEntry, ServiceRegistry};
use crate::schema::SchemaTree;

/// Why a request was declined for passthrough, surfaced for logging
/// (§4.7: "If any check fails, passthrough declines and the normal
/// handlers take over").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decline {
    WrongKind,
    PathDoesNotResolve { path: String },
    MixedOrUnownedGroups,
    PermissionDenied { path: String },
}

/// Every path a request touches, for eligibility resolution. Get/Delete
/// carry possibly many; Add and Set each resolve to the paths their params
/// target plus (for Add) the object path itself.
fn touched_paths(request: &UspRequest) -> Vec<String> {
    match request {
        UspRequest::Get(r) => r.paths.clone(),
        UspRequest::Set(r) => r.params.iter().map(|p| p.path.clone()).collect(),
        UspRequest::Add(r) => vec![r.object_path.clone()],
        UspRequest::Delete(r) => r.object_paths.clone(),
        _ => Vec::new(),
    }
}

fn permits(permissions: &dyn PermissionStore, originator: &str, request: &UspRequest, path: &str) -> bool {
    match request {
        UspRequest::Get(_) => permissions.permits_get(originator, path),
        UspRequest::Set(_) => permissions.permits_set(originator, path),
        UspRequest::Add(_) => permissions.permits_add(originator, path),
        UspRequest::Delete(_) => permissions.permits_delete(originator, path),
        _ => false,
    }
}

/// Checks whether `request` qualifies for passthrough, returning the single
/// owning group id on success (§4.7). `recursive_depth` bounds how many
/// levels of child object a Get is checked against below each touched path,
/// since a Get on a parent prefix implicitly reaches into its descendants.
pub fn check_eligibility(
    request: &UspRequest,
    schema: &SchemaTree,
    originator: &str,
    permissions: &dyn PermissionStore,
    recursive_depth: u32,
) -> Result<GroupId, Decline> {
    if !request.is_passthrough_eligible_kind() {
        return Err(Decline::WrongKind);
    }

    let paths = touched_paths(request);
    let mut owning_group: Option<GroupId> = None;

    for path in &paths {
        let node = schema
            .resolve_owning_object(path)
            .ok_or_else(|| Decline::PathDoesNotResolve { path: path.clone() })?;

        if node.group.is_none() {
            return Err(Decline::MixedOrUnownedGroups);
        }
        match owning_group {
            None => owning_group = Some(node.group),
            Some(g) if g == node.group => {}
            Some(_) => return Err(Decline::MixedOrUnownedGroups),
        }

        if !permits(permissions, originator, request, path) {
            return Err(Decline::PermissionDenied { path: path.clone() });
        }

        if matches!(request, UspRequest::Get(_)) {
            for descendant in schema.descendant_object_paths(&node.path, recursive_depth) {
                if !permissions.permits_get(originator, &descendant) {
                    return Err(Decline::PermissionDenied { path: descendant });
                }
            }
        }
    }

    owning_group.ok_or(Decline::MixedOrUnownedGroups)
}

/// Remaps the incoming message's id and records the MsgMap entry needed to
/// deliver the eventual response back to its true originator (§4.7 "Wire
/// transformation"). Returns the mutated message to send on the Service's
/// controller-side transport.
pub fn forward<H: Clone + Eq + Hash + Debug>(
    registry: &mut ServiceRegistry<H>,
    group: GroupId,
    id_gen: &IdGenerator,
    original: &UspMessage,
    originator_endpoint: EndpointId,
    originator_handle: H,
) -> Option<UspMessage> {
    let record = registry.find_by_group_mut(group)?;
    let broker_msg_id = id_gen.next_message_id();
    let remapped = original.with_remapped_id(broker_msg_id.clone());

    record.msg_map.insert(MsgEntry {
        broker_msg_id,
        original_msg_id: original.msg_id.clone(),
        originator_endpoint,
        originator_handle,
    });

    Some(remapped)
}

/// Outcome of matching a Service's response against a Service's MsgMap
/// (§4.7 "Response matching").
#[derive(Debug, Clone)]
pub struct MatchedResponse<H> {
    pub restored_message: UspMessage,
    pub originator_endpoint: EndpointId,
    pub originator_handle: H,
}

/// Consults `group`'s MsgMap for `response`'s `msg_id`; on a hit, restores
/// the original `msg_id` and returns everything needed to deliver it back.
/// The MsgMap entry is removed either way it's found (§8 "MsgMap
/// idempotence").
pub fn match_response<H: Clone + Eq + Hash + Debug>(
    registry: &mut ServiceRegistry<H>,
    group: GroupId,
    response: UspMessage,
) -> Option<MatchedResponse<H>> {
    let record = registry.find_by_group_mut(group)?;
    let entry = record
        .msg_map
        .remove_by_broker_msg_id(response.msg_id.as_str())?;

    let restored = response.with_remapped_id(entry.original_msg_id);
    Some(MatchedResponse {
        restored_message: restored,
        originator_endpoint: entry.originator_endpoint,
        originator_handle: entry.originator_handle,
    })
}

/// Whether an incoming NOTIFY qualifies for notification passthrough: not
/// excluded by kind, and matches a SubsMap entry on `group` (§4.7
/// "Notification passthrough").
pub fn notify_eligible_for_passthrough<H: Clone + Eq + Hash + Debug>(
    registry: &ServiceRegistry<H>,
    group: GroupId,
    body: &UspMessageBody,
) -> bool {
    let UspMessageBody::Notify {
        notify,
        subscription_id,
        ..
    } = body
    else {
        return false;
    };
    if notify.is_excluded_from_passthrough() {
        return false;
    }
    let Some(sub_id) = subscription_id else {
        return false;
    };
    registry
        .find_by_group(group)
        .is_some_and(|record| record.subs_map.find_by_subscription_id(sub_id.as_str()).is_some())
}
