//! The Service Registry, the Service record, the three per-Service
//! correlation tables, and the `Device.USPServices.` read model built on
//! top of them (§3, §4.1, §6).

pub mod correlation;
pub mod service;
pub mod table;
pub mod usp_services_view;

pub use correlation::{MsgEntry, MsgMap, ReqEntry, ReqMap, SubsEntry, SubsMap};
pub use service::ServiceRecord;
pub use table::{DisconnectOutcome, ServiceRegistry, TransportRole};
pub use usp_services_view::{number_of_entries, rows, UspServiceRow};
