//! Request-side wire message variants (§6 "USP wire protocol").
//!
//! Modeled as an exhaustive sum type per §9's design note: a new wire
//! request kind must be added to [`UspRequest`] to compile, rather than
//! silently falling through a passthrough path.

use serde::{Deserialize, Serialize};

/// A single parameter path targeted by a Get.
pub type ParamPath = String;

/// A (path, value) pair targeted by a Set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetParam {
    pub path: String,
    pub value: String,
}

/// A single parameter value supplied to Add/CreateObject, with the
/// `required` flag CreateObject needs to propagate per-parameter errors
/// (§4.4 CreateObject row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateParam {
    pub name: String,
    pub value: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub requested_paths: Vec<String>,
    pub allow_partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregisterRequest {
    /// Empty list (or a single empty string) means "all my prefixes" (§4.2).
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    pub paths: Vec<ParamPath>,
    pub max_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRequest {
    pub params: Vec<SetParam>,
    pub allow_partial: bool,
}

/// A single object creation request, shared by Add (no child params) and
/// CreateObject (child params with `required` flags) per §4.4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    pub object_path: String,
    pub params: Vec<CreateParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    /// Instance paths, each ending with a trailing `.` (§4.4).
    pub object_paths: Vec<String>,
    pub allow_partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperateRequest {
    pub command_path: String,
    pub command_key: String,
    pub input_args: Vec<SetParam>,
    pub send_resp: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInstancesRequest {
    pub object_paths: Vec<String>,
    pub first_level_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSupportedDmRequest {
    pub prefixes: Vec<String>,
    pub return_commands: bool,
    pub return_events: bool,
    pub return_params: bool,
}

/// Every request kind the core consumes or produces (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum UspRequest {
    Register(RegisterRequest),
    Deregister(DeregisterRequest),
    Get(GetRequest),
    Set(SetRequest),
    Add(AddRequest),
    Delete(DeleteRequest),
    Operate(OperateRequest),
    GetInstances(GetInstancesRequest),
    GetSupportedDm(GetSupportedDmRequest),
}

impl UspRequest {
    /// Short name used in logging and passthrough eligibility checks.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Register(_) => "Register",
            Self::Deregister(_) => "Deregister",
            Self::Get(_) => "Get",
            Self::Set(_) => "Set",
            Self::Add(_) => "Add",
            Self::Delete(_) => "Delete",
            Self::Operate(_) => "Operate",
            Self::GetInstances(_) => "GetInstances",
            Self::GetSupportedDm(_) => "GetSupportedDM",
        }
    }

    /// True for the four request kinds eligible for the Passthrough Router
    /// (§4.7: "it is Get, Set, Add, or Delete").
    pub fn is_passthrough_eligible_kind(&self) -> bool {
        matches!(self, Self::Get(_) | Self::Set(_) | Self::Add(_) | Self::Delete(_))
    }
}
