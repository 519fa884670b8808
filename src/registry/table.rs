//! The Service Registry: a fixed-capacity table of connected Services
//! (§4.1). An explicit struct passed through operations rather than a
//! global, per §9's "prefer an explicit container... the C source's static
//! array is an implementation artifact, not a design requirement".

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::BrokerError;
use crate::ids::{EndpointId, GroupId, ServiceInstance};
use crate::registry::service::ServiceRecord;

/// Which of a Service's two transport handles an operation addresses.
///
/// Naming follows the *Broker's* role on that handle (§3): `ControllerSide`
/// is the handle the Broker uses to act as Controller toward this Service
/// (the Service's own Agent-role connection); `AgentSide` is the handle the
/// Broker uses to act as Agent back toward it. Losing `ControllerSide` is
/// what §4.1 calls losing "the Service's agent side" and is what triggers
/// Failure Propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportRole {
    ControllerSide,
    AgentSide,
    /// Transports that don't distinguish Controller/Agent role hand out the
    /// same handle for both (§4.1 `UpdateTransport`).
    Both,
}

/// Outcome of a disconnect, telling the caller (the Lifecycle Manager)
/// whether to run Failure Propagation and whether the record is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectOutcome {
    pub lost_controller_side: bool,
    pub record_destroyed: bool,
}

pub struct ServiceRegistry<H> {
    records: HashMap<EndpointId, ServiceRecord<H>>,
    max_services: usize,
    free_groups: Vec<GroupId>,
    next_instance: u32,
}

impl<H: Clone + Eq + Hash + Debug> ServiceRegistry<H> {
    pub fn new(max_services: usize) -> Self {
        let mut free_groups: Vec<GroupId> = (1..=max_services as u16).map(GroupId::new).collect();
        free_groups.reverse();
        Self {
            records: HashMap::new(),
            max_services,
            free_groups,
            next_instance: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Creates a new Service record if capacity and a free group id allow
    /// it. `handle`/`role` seed whichever transport handle the connection
    /// arrived on (§4.1 "Add(endpoint, transport-handle)").
    pub fn add(
        &mut self,
        endpoint: EndpointId,
        handle: H,
        role: TransportRole,
    ) -> Result<&mut ServiceRecord<H>, BrokerError> {
        if self.records.contains_key(&endpoint) {
            return Err(BrokerError::resources_exceeded(format!(
                "a Service record already exists for endpoint {endpoint}"
            )));
        }
        if self.records.len() >= self.max_services {
            return Err(BrokerError::resources_exceeded(
                "Service Registry is at capacity",
            ));
        }
        let group = self
            .free_groups
            .pop()
            .ok_or_else(|| BrokerError::resources_exceeded("no free group id"))?;

        let instance = ServiceInstance::new(self.next_instance);
        self.next_instance += 1;

        let mut record = ServiceRecord::new(endpoint.clone(), instance, group);
        Self::assign_handle(&mut record, handle, role);

        self.records.insert(endpoint.clone(), record);
        Ok(self
            .records
            .get_mut(&endpoint)
            .expect("just inserted"))
    }

    fn assign_handle(record: &mut ServiceRecord<H>, handle: H, role: TransportRole) {
        match role {
            TransportRole::ControllerSide => record.controller_handle = Some(handle),
            TransportRole::AgentSide => record.agent_handle = Some(handle),
            TransportRole::Both => {
                record.controller_handle = Some(handle.clone());
                record.agent_handle = Some(handle);
            }
        }
    }

    /// Replaces the indicated handle(s), releasing any prior handle first
    /// (§4.1 "Replacing a live handle releases the prior one first").
    pub fn update_transport(
        &mut self,
        endpoint: &EndpointId,
        handle: H,
        role: TransportRole,
    ) -> Result<(), BrokerError> {
        let record = self
            .records
            .get_mut(endpoint)
            .ok_or_else(|| BrokerError::internal(format!("no Service record for {endpoint}")))?;
        Self::assign_handle(record, handle, role);
        Ok(())
    }

    /// Clears the indicated handle and destroys the record if both are now
    /// absent. Returns whether the controller-side handle specifically was
    /// lost, so the caller can decide whether to run Failure Propagation
    /// (§4.1, §4.8).
    pub fn handle_disconnect(
        &mut self,
        endpoint: &EndpointId,
        role: TransportRole,
    ) -> Option<DisconnectOutcome> {
        let record = self.records.get_mut(endpoint)?;
        let lost_controller_side = match role {
            TransportRole::ControllerSide => {
                record.controller_handle = None;
                true
            }
            TransportRole::AgentSide => {
                record.agent_handle = None;
                false
            }
            TransportRole::Both => {
                record.controller_handle = None;
                record.agent_handle = None;
                true
            }
        };

        let record_destroyed = if record.is_fully_disconnected() {
            self.destroy(endpoint);
            true
        } else {
            false
        };

        Some(DisconnectOutcome {
            lost_controller_side,
            record_destroyed,
        })
    }

    /// Removes a record outright, releasing its group id. Used both by
    /// `handle_disconnect` and directly when a Service is torn down for
    /// other reasons.
    pub fn destroy(&mut self, endpoint: &EndpointId) -> Option<ServiceRecord<H>> {
        let record = self.records.remove(endpoint)?;
        self.free_groups.push(record.group);
        Some(record)
    }

    pub fn find_by_endpoint(&self, endpoint: &EndpointId) -> Option<&ServiceRecord<H>> {
        self.records.get(endpoint)
    }

    pub fn find_by_endpoint_mut(&mut self, endpoint: &EndpointId) -> Option<&mut ServiceRecord<H>> {
        self.records.get_mut(endpoint)
    }

    pub fn find_by_group(&self, group: GroupId) -> Option<&ServiceRecord<H>> {
        self.records.values().find(|r| r.group == group)
    }

    pub fn find_by_group_mut(&mut self, group: GroupId) -> Option<&mut ServiceRecord<H>> {
        self.records.values_mut().find(|r| r.group == group)
    }

    pub fn find_by_instance(&self, instance: ServiceInstance) -> Option<&ServiceRecord<H>> {
        self.records.values().find(|r| r.instance == instance)
    }

    /// Service owning `path` via its registered-prefix list, if any (§8
    /// "Path ownership").
    pub fn find_owner_of_path(&self, path: &str) -> Option<&ServiceRecord<H>> {
        self.records.values().find(|r| r.owns_path(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceRecord<H>> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ServiceRecord<H>> {
        self.records.values_mut()
    }
}
