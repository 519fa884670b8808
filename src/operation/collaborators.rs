//! Thin trait seams for the external collaborators §1 names explicitly:
//! the Subscription table, the Request table, and the role/permission
//! store. The core consumes these; it does not implement them.

use crate::ids::GroupId;

/// The Broker's own Subscription table (out of scope per §1; consumed here
/// only through the two operations §4.4's async-Operate precondition and
/// §4.5's reconciliation pass need).
pub trait SubscriptionTable: Send + Sync {
    /// Whether the Broker currently holds an enabled OperationComplete
    /// subscription whose reference list covers `command_path` (§4.4 "Async
    /// Operate precondition").
    fn has_operation_complete_subscription(&self, command_path: &str) -> bool;

    /// Binds the first unbound, enabled Broker-side subscription matching
    /// `path` under `group` to a Service row, returning its Broker instance
    /// number (§4.5 "ask the Broker Subscription table to bind..."). `None`
    /// if no candidate exists.
    fn bind_first_unbound_matching(&self, group: GroupId, path: &str) -> Option<u32>;

    /// Every Broker subscription instance currently enabled for `group`,
    /// used to compute `M \ B` in §8's convergence property.
    fn enabled_instances_for_group(&self, group: GroupId) -> Vec<u32>;

    /// Kicks vendor-layer subscription creation on the Service for every
    /// enabled Broker subscription in `group` that has no SubsMap pairing
    /// yet (§4.5 "StartAllVendorLayerSubs").
    fn start_all_vendor_layer_subs(&self, group: GroupId);

    /// Reverts every vendor-layer subscription for `group` back to core
    /// (Broker-internal) delivery, called as part of Failure Propagation
    /// when the Service's Broker-as-Controller transport is lost (§4.8).
    fn demote_vendor_layer_subscriptions(&self, group: GroupId);
}

/// Outcome reported back to the Broker Request table for an async command
/// (§4.4, §4.6, §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTableOutcome {
    Success { output_args: Vec<(String, String)> },
    CommandFailure { code: String, message: String },
}

/// The Broker's own Request table (out of scope per §1), tracking
/// asynchronous command status for Controllers.
pub trait RequestTable: Send + Sync {
    fn mark_active(&self, broker_request_instance: u32);
    fn signal_operation_complete(&self, broker_request_instance: u32, outcome: RequestTableOutcome);
}

/// The role/permission store (out of scope per §1), consulted by the
/// Passthrough Router (§4.7) and by the Operation Adapter's permission
/// checks on normal (non-passthrough) paths.
pub trait PermissionStore: Send + Sync {
    fn permits_get(&self, originator: &str, path: &str) -> bool;
    fn permits_set(&self, originator: &str, path: &str) -> bool;
    fn permits_add(&self, originator: &str, path: &str) -> bool;
    fn permits_delete(&self, originator: &str, path: &str) -> bool;
}
