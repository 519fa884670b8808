//! NOTIFY message variants (§4.6 Notification Router, §4.7 notification
//! passthrough).

use serde::{Deserialize, Serialize};

use crate::message::request::SetParam;

/// Every notification kind the core recognizes. `send_resp` is carried on
/// the envelope rather than here since it is a property of the wire
/// message, not of the notification's meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Notify {
    /// Completion of a previously started async Operate (§4.4, §4.6).
    OperationComplete {
        object_path: String,
        command_name: String,
        command_key: String,
        outcome: OperationCompleteOutcome,
    },

    /// A new object instance was created (§4.7: suppressed from passthrough
    /// mid-Add, §5 re-entrancy hazard).
    ObjectCreation { instantiated_path: String },

    /// An object instance was deleted (§4.7).
    ObjectDeletion { instance_path: String },

    /// A Service's agent-side connection request (§4.7: excluded from
    /// notification passthrough).
    OnBoardRequest { endpoint: String },

    /// A subscribed parameter's value changed.
    ValueChange { path: String, value: String },

    /// A subscribed event fired.
    Event {
        object_path: String,
        event_name: String,
        args: Vec<SetParam>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationCompleteOutcome {
    Success { output_args: Vec<SetParam> },
    CommandFailure { code: String, message: String },
}

impl Notify {
    /// The Broker-chosen subscription id this notification is tagged with,
    /// used to look up the owning SubsMap entry (§4.6). Kinds that are not
    /// subscription-driven (OnBoardRequest) have none.
    pub fn is_operation_complete(&self) -> bool {
        matches!(self, Self::OperationComplete { .. })
    }

    /// True for the notification kinds §4.7 excludes from passthrough while
    /// an Add is in progress or unconditionally (OperationComplete,
    /// OnBoardRequest, ObjectCreation, ObjectDeletion).
    pub fn is_excluded_from_passthrough(&self) -> bool {
        matches!(
            self,
            Self::OperationComplete { .. }
                | Self::OnBoardRequest { .. }
                | Self::ObjectCreation { .. }
                | Self::ObjectDeletion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_complete_is_excluded_from_passthrough() {
        let notify = Notify::OperationComplete {
            object_path: "Device.X.".to_string(),
            command_name: "Run".to_string(),
            command_key: "K1".to_string(),
            outcome: OperationCompleteOutcome::Success { output_args: vec![] },
        };
        assert!(notify.is_operation_complete());
        assert!(notify.is_excluded_from_passthrough());
    }

    #[test]
    fn value_change_is_eligible_for_passthrough() {
        let notify = Notify::ValueChange {
            path: "Device.X.Y".to_string(),
            value: "1".to_string(),
        };
        assert!(!notify.is_excluded_from_passthrough());
    }
}
