//! # USP Broker Core
//!
//! A single-threaded core implementing the USP Broker role (§3 OVERVIEW):
//! a registry of connected Services exposed under one unified `Device.`
//! data model to Controllers, with translation, passthrough, and lifecycle
//! management layered on top.
//!
//! ## Module Organization
//!
//! - [`ids`] — newtyped identifiers (endpoint, group, instance, message,
//!   subscription) and the Broker's id generator.
//! - [`error`] — the `BrokerError` taxonomy (§7).
//! - [`config`] — `BrokerConfig` and its builder (§6).
//! - [`message`] — the wire request/response/notify sum types (§6).
//! - [`transport`] — the `Mtp` transport seam and its in-process fake.
//! - [`schema`] — the unified schema tree, path validation, and the Schema
//!   Importer (§3, §4.2, §4.3).
//! - [`registry`] — the Service Registry, Service record, correlation
//!   tables, and the `Device.USPServices.` read model (§3, §4.1, §6).
//! - [`operation`] — the Operation Adapter, Subscription Synchronization,
//!   the Notification Router, the Passthrough Router, and the collaborator
//!   trait seams (§4.4-§4.7).
//! - [`lifecycle`] — connect/disconnect, Failure Propagation, and the
//!   Registration Protocol (§4.1, §4.2, §4.8).
//! - [`monitoring`] — the generic `Monitor<E>` observability layer.
//! - [`broker`] — the top-level `Broker` wiring everything above together.
//! - [`util`] — small shared serialization helpers.
//! - [`prelude`] — the common import set for embedders.

pub mod broker;
pub mod config;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod message;
pub mod monitoring;
pub mod operation;
pub mod prelude;
pub mod registry;
pub mod schema;
pub mod transport;
pub mod util;

pub use broker::{Broker, RoutingOutcome};
pub use config::BrokerConfig;
pub use error::BrokerError;
