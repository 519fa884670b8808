//! # Monitoring Module
//!
//! Universal monitoring infrastructure for observing and tracking events across
//! every broker component.
//!
//! ## Features
//! - **Generic Monitor<E> Trait**: Universal monitoring for any entity type
//! - **Zero-Cost Abstraction**: NoopMonitor compiles away when disabled
//! - **Lock-Free Recording**: Atomic counters for concurrent event tracking
//! - **Type Safety**: MonitoringEvent trait ensures compile-time correctness
//!
//! ## Event Types
//! - `ServiceEvent`: Service Registry connect/transport/destroy events (§4.1, §4.8)
//! - `RegistrationEvent`: Register/Deregister and schema import events (§4.2, §4.5)
//! - `OperationEvent`: Operation Adapter round-trips and async commands (§4.4)
//! - `PassthroughEvent`: Passthrough Router eligibility and response matching (§4.7)
//!
//! ## Examples
//! ```
//! use usp_broker::monitoring::{InMemoryMonitor, MonitoringConfig, ServiceEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitoringConfig::default();
//! let monitor = InMemoryMonitor::<ServiceEvent>::new(config);
//!
//! let snapshot = monitor.snapshot().await?;
//! assert_eq!(snapshot.total_events, 0);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod in_memory;
pub mod noop;
pub mod traits;
pub mod types;

pub use error::MonitoringError;
pub use in_memory::InMemoryMonitor;
pub use noop::NoopMonitor;
pub use traits::{EventSeverity, Monitor, MonitoringEvent};
pub use types::{
    MonitoringConfig, MonitoringSnapshot, OperationEvent, OperationEventKind, PassthroughEvent,
    PassthroughEventKind, RegistrationEvent, RegistrationEventKind, ServiceEvent, ServiceEventKind,
};
