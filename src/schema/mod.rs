//! The unified `Device.` schema tree, path validation (§4.3), and the
//! Schema Importer that projects GetSupportedDM responses onto it (§4.2).

pub mod importer;
pub mod tree;
pub mod types;

pub use importer::{import_object, import_response};
pub use tree::{compound_key_components, validate_object_path, validate_register_prefix, SchemaTree};
pub use types::{CommandNode, EventNode, ObjectKind, ParamNode, ParamType, SchemaNode};
