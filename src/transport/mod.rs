//! The MTP transport seam (§6 "Transport collaborator contract") and an
//! in-process fake used by tests.

pub mod fake;
pub mod traits;

pub use fake::FakeMtp;
pub use traits::{ExpectedResponseKind, Mtp};
