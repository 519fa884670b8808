//! Small serialization helpers shared across the crate.

pub mod serde_helpers;

pub use serde_helpers::duration_serde;
