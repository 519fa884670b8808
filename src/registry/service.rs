//! The Service record (§3 "Service record").

use std::fmt::Debug;
use std::hash::Hash;

use crate::ids::{EndpointId, GroupId, MessageId, ServiceInstance};
use crate::registry::correlation::{MsgMap, ReqMap, SubsMap};

/// One connected USP Service, generic over the MTP's opaque handle type.
#[derive(Debug)]
pub struct ServiceRecord<H> {
    pub endpoint: EndpointId,
    pub instance: ServiceInstance,
    pub group: GroupId,

    /// Broker-as-Controller outbound handle, used to send requests to this
    /// Service (§3).
    pub controller_handle: Option<H>,

    /// Broker-as-Agent outbound handle, used to send notifications/responses
    /// back to this Service when it plays the Controller role (§3).
    pub agent_handle: Option<H>,

    /// Set once the Service itself has opened an agent-side connection to
    /// the Broker (§3 "has-controller flag").
    pub has_controller: bool,

    /// The message id of an outstanding GetSupportedDM request, used to
    /// correlate the eventual response and drop mismatches (§4.2).
    pub pending_get_supported_dm: Option<MessageId>,

    /// Top-level path prefixes this Service currently owns (§3).
    pub registered_prefixes: Vec<String>,

    pub subs_map: SubsMap,
    pub req_map: ReqMap,
    pub msg_map: MsgMap<H>,
}

impl<H: Clone + Eq + Hash + Debug> ServiceRecord<H> {
    pub fn new(endpoint: EndpointId, instance: ServiceInstance, group: GroupId) -> Self {
        Self {
            endpoint,
            instance,
            group,
            controller_handle: None,
            agent_handle: None,
            has_controller: false,
            pending_get_supported_dm: None,
            registered_prefixes: Vec::new(),
            subs_map: SubsMap::new(),
            req_map: ReqMap::new(),
            msg_map: MsgMap::new(),
        }
    }

    /// Both transport handles absent: the record is eligible for
    /// destruction (§3 "Lifecycles").
    pub fn is_fully_disconnected(&self) -> bool {
        self.controller_handle.is_none() && self.agent_handle.is_none()
    }

    pub fn owns_prefix(&self, prefix: &str) -> bool {
        self.registered_prefixes.iter().any(|p| p == prefix)
    }

    /// True if `path` falls under any prefix this Service owns (§8 "Path
    /// ownership").
    pub fn owns_path(&self, path: &str) -> bool {
        self.registered_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Single-registration policy: once any prefix has been accepted, a
    /// later Register from the same Service is refused (§4.2).
    pub fn has_registered_anything(&self) -> bool {
        !self.registered_prefixes.is_empty()
    }

    /// Releases every correlation-table entry and registered prefix, as
    /// performed during Failure Propagation (§4.8) and final destruction
    /// (§3).
    pub fn clear_state(&mut self) {
        self.subs_map.clear();
        self.req_map.clear();
        self.msg_map.clear();
        self.registered_prefixes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record() -> ServiceRecord<u64> {
        ServiceRecord::new(
            EndpointId::new("svc-1"),
            ServiceInstance::new(1),
            GroupId::new(1),
        )
    }

    #[test]
    fn fresh_record_is_fully_disconnected() {
        let record = new_record();
        assert!(record.is_fully_disconnected());
    }

    #[test]
    fn record_with_one_handle_is_not_fully_disconnected() {
        let mut record = new_record();
        record.controller_handle = Some(7u64);
        assert!(!record.is_fully_disconnected());
    }

    #[test]
    fn owns_path_matches_registered_prefix() {
        let mut record = new_record();
        record.registered_prefixes.push("Device.X.".to_string());
        assert!(record.owns_path("Device.X.Y"));
        assert!(!record.owns_path("Device.Z.Y"));
    }

    #[test]
    fn clear_state_empties_correlation_tables_and_prefixes() {
        let mut record = new_record();
        record.registered_prefixes.push("Device.X.".to_string());
        record.clear_state();
        assert!(record.registered_prefixes.is_empty());
        assert!(record.subs_map.is_empty());
        assert!(record.req_map.is_empty());
        assert!(record.msg_map.is_empty());
    }
}
