//! Response-side wire message variants (§6, §4.4 decoding rules, §7 error
//! kinds).

use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// A single Get result: the resolved path and its parameter value, or a
/// per-parameter error (§4.4: "Missing/error entries are logged but do not
/// fail the batch").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GetResult {
    Value { resolved_path: String, value: String },
    Error(ParamError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResultEntry {
    pub path: String,
    pub outcome: RegisterOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterOutcome {
    Accepted,
    PathAlreadyRegistered,
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub results: Vec<RegisterResultEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeregisterResultEntry {
    Success { paths: Vec<String> },
    Failure { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregisterResponse {
    pub results: Vec<DeregisterResultEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    pub results: Vec<GetResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResponse {
    /// Index of the first failing (path, value) pair, if any (§4.4 Set row).
    pub first_failure_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedObjectResult {
    pub instantiated_path: String,
    pub param_errors: Vec<ParamError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResponse {
    pub created: CreatedObjectResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletedObjectResult {
    Deleted { instance_path: String },
    Failed { instance_path: String, failure_index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub results: Vec<DeletedObjectResult>,
}

/// Operate response outcome branches (§4.4 Operate rows).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperateOutcome {
    /// Command finished synchronously; carries the command's output args.
    OutputArgs(Vec<crate::message::request::SetParam>),
    /// Command failed with an embedded error code/message.
    CommandFailure { code: String, message: String },
    /// Command was accepted and is running asynchronously.
    RequestObjectPath { request_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperateResponse {
    pub executed_command: String,
    pub outcome: OperateOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInstancesResponse {
    pub instantiated_paths: Vec<String>,
}

/// A single object description returned by GetSupportedDM (§4.2 import rules).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedObject {
    pub path: String,
    pub is_multi_instance: bool,
    pub writable: bool,
    pub params: Vec<SupportedParam>,
    pub events: Vec<SupportedEvent>,
    pub commands: Vec<SupportedCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedParam {
    pub name: String,
    /// Protocol type tag, translated to the Broker's internal type flags
    /// during import; unknown tags default to string (§4.2).
    pub protocol_type: String,
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedEvent {
    pub name: String,
    pub arg_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedCommand {
    pub name: String,
    pub input_arg_names: Vec<String>,
    pub output_arg_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSupportedDmResponse {
    pub objects: Vec<SupportedObject>,
}

/// A USP ERROR message (§7, §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UspError {
    pub code: String,
    pub message: String,
}

/// Every response kind the core consumes or produces (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum UspResponse {
    RegisterResp(RegisterResponse),
    DeregisterResp(DeregisterResponse),
    GetResp(GetResponse),
    SetResp(SetResponse),
    AddResp(AddResponse),
    DeleteResp(DeleteResponse),
    OperateResp(OperateResponse),
    GetInstancesResp(GetInstancesResponse),
    GetSupportedDmResp(GetSupportedDmResponse),
    Error(UspError),
}

impl UspResponse {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::RegisterResp(_) => "RegisterResp",
            Self::DeregisterResp(_) => "DeregisterResp",
            Self::GetResp(_) => "GetResp",
            Self::SetResp(_) => "SetResp",
            Self::AddResp(_) => "AddResp",
            Self::DeleteResp(_) => "DeleteResp",
            Self::OperateResp(_) => "OperateResp",
            Self::GetInstancesResp(_) => "GetInstancesResp",
            Self::GetSupportedDmResp(_) => "GetSupportedDMResp",
            Self::Error(_) => "Error",
        }
    }
}
