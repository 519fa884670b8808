//! The `Device.USPServices.` read model (§6 "Unified data model
//! (Controller-facing)"), projected live from the registry rather than
//! stored — it has no state of its own beyond what the registry already
//! tracks.

use std::fmt::Debug;
use std::hash::Hash;

use crate::registry::service::ServiceRecord;
use crate::registry::table::ServiceRegistry;

/// One row of `Device.USPServices.USPService.{i}` (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UspServiceRow {
    pub instance: u32,
    pub endpoint_id: String,
    pub protocol: String,
    pub data_model_paths: String,
    pub has_controller: bool,
}

impl<H> From<&ServiceRecord<H>> for UspServiceRow {
    fn from(record: &ServiceRecord<H>) -> Self {
        Self {
            instance: record.instance.get(),
            endpoint_id: record.endpoint.as_str().to_string(),
            protocol: "USP".to_string(),
            data_model_paths: record.registered_prefixes.join(","),
            has_controller: record.has_controller,
        }
    }
}

/// `Device.USPServices.USPServiceNumberOfEntries` (read-only).
pub fn number_of_entries<H: Clone + Eq + Hash + Debug>(registry: &ServiceRegistry<H>) -> usize {
    registry.len()
}

/// The full `Device.USPServices.USPService.{i}` table, unique-keyed by
/// `EndpointID`. Instance add/delete is denied externally (§6); the table
/// only ever changes as a side effect of registry mutation.
pub fn rows<H: Clone + Eq + Hash + Debug>(registry: &ServiceRegistry<H>) -> Vec<UspServiceRow> {
    registry.iter().map(UspServiceRow::from).collect()
}
