//! Schema node types for the Broker's unified `Device.` tree (§3, §4.2).

use serde::{Deserialize, Serialize};

use crate::ids::GroupId;

/// The Broker's internal parameter type flags. The wire protocol's type
/// enum is translated into these during import; an unrecognized wire type
/// defaults to `ParamType::String` (§4.2 rule 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    String,
    Boolean,
    Integer,
    UnsignedInteger,
    DateTime,
    Base64,
    HexBinary,
}

impl ParamType {
    /// Maps a protocol type tag to a Broker type flag, defaulting to
    /// `String` for anything unrecognized (§4.2 rule 3).
    pub fn from_protocol_tag(tag: &str) -> Self {
        match tag {
            "boolean" => Self::Boolean,
            "int" | "long" => Self::Integer,
            "unsignedInt" | "unsignedLong" => Self::UnsignedInteger,
            "dateTime" => Self::DateTime,
            "base64" => Self::Base64,
            "hexBinary" => Self::HexBinary,
            _ => Self::String,
        }
    }
}

/// A registered vendor parameter under an object node (§4.2 rule 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamNode {
    pub name: String,
    pub param_type: ParamType,
    pub writable: bool,
}

/// A registered event under an object node (§4.2 rule 4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNode {
    pub name: String,
    pub arg_names: Vec<String>,
}

/// A registered command under an object node (§4.2 rule 4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandNode {
    pub name: String,
    pub input_arg_names: Vec<String>,
    pub output_arg_names: Vec<String>,
}

/// The shape of one schema object node (§4.2 rules 2-4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A placeholder installed on Register, before GetSupportedDM resolves
    /// the real shape (§4.2: "a single-instance object with group id set").
    Placeholder,

    /// A single-instance object.
    SingleInstance,

    /// A multi-instance (table) object. `top_level` is true when the path
    /// has exactly one `{i}.` at the tail, which triggers a refresh-instances
    /// hook (§4.2 rule 2).
    MultiInstance { writable: bool, top_level: bool },
}

/// One node in the unified schema tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// Fully-qualified path, e.g. `Device.X.Y.` for an object or
    /// `Device.X.Y.Param` for a parameter.
    pub path: String,

    pub kind: ObjectKind,

    /// Owning Service's group id; `GroupId::NONE` for Broker-internal nodes
    /// (§3 invariant: "every group identifier in use is either reserved by
    /// the Broker for exactly one Service or unused").
    pub group: GroupId,

    pub params: Vec<ParamNode>,
    pub events: Vec<EventNode>,
    pub commands: Vec<CommandNode>,
}

impl SchemaNode {
    pub fn placeholder(path: impl Into<String>, group: GroupId) -> Self {
        Self {
            path: path.into(),
            kind: ObjectKind::Placeholder,
            group,
            params: Vec::new(),
            events: Vec::new(),
            commands: Vec::new(),
        }
    }
}
