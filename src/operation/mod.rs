//! The operation layer: the Operation Adapter (§4.4), Subscription
//! Synchronization (§4.5), the Notification Router (§4.6), the Passthrough
//! Router (§4.7), and the thin collaborator traits §1 carves out of scope.

pub mod adapter;
pub mod collaborators;
pub mod notification_router;
pub mod passthrough;
pub mod subscription_sync;

pub use adapter::{get_result_to_param_error, pending_req_entry, OperationAdapter};
pub use collaborators::{PermissionStore, RequestTable, RequestTableOutcome, SubscriptionTable};
pub use notification_router::{route_notification, NotificationOutcome};
pub use passthrough::{
    check_eligibility, forward, match_response, notify_eligible_for_passthrough, Decline,
    MatchedResponse,
};
pub use subscription_sync::{sync_subscriptions, SubscriptionRow, SyncOutcome};
