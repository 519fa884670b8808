//! The Service lifecycle: connect/disconnect and Failure Propagation
//! (§4.1, §4.8, this module's [`manager`]) and the Registration Protocol
//! (§4.2, §4.3, §4.5, this module's [`registration`]).

pub mod manager;
pub mod registration;

pub use manager::{connect, disconnect};
pub use registration::{deregister, register};
