//! Convenience re-exports for embedders wiring up a [`crate::Broker`].
//!
//! ```
//! use usp_broker::prelude::*;
//! ```

pub use crate::broker::{Broker, RoutingOutcome};
pub use crate::config::{BrokerConfig, BrokerConfigBuilder};
pub use crate::error::BrokerError;
pub use crate::ids::{EndpointId, GroupId, IdGenerator, MessageId, ServiceInstance, SubscriptionId};
pub use crate::message::{
    DeregisterRequest, DeregisterResponse, Notify, RegisterRequest, RegisterResponse, UspMessage,
    UspMessageBody, UspRequest, UspResponse,
};
pub use crate::monitoring::{Monitor, MonitoringEvent, NoopMonitor};
pub use crate::registry::{ServiceRegistry, TransportRole, UspServiceRow};
pub use crate::schema::SchemaTree;
pub use crate::transport::Mtp;
