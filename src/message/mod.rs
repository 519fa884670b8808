//! Wire message types: the request/response/notify sum types and the
//! envelope that wraps them (§6 EXTERNAL INTERFACES).

pub mod envelope;
pub mod notify;
pub mod request;
pub mod response;

pub use envelope::{UspMessage, UspMessageBody};
pub use notify::{Notify, OperationCompleteOutcome};
pub use request::{
    AddRequest, CreateParam, DeleteRequest, DeregisterRequest, GetInstancesRequest, GetRequest,
    GetSupportedDmRequest, OperateRequest, RegisterRequest, SetParam, SetRequest, UspRequest,
};
pub use response::{
    AddResponse, CreatedObjectResult, DeleteResponse, DeletedObjectResult, DeregisterResponse,
    DeregisterResultEntry, GetInstancesResponse, GetResponse, GetResult, GetSupportedDmResponse,
    OperateOutcome, OperateResponse, RegisterOutcome, RegisterResponse, RegisterResultEntry,
    SetResponse, SupportedCommand, SupportedEvent, SupportedObject, SupportedParam, UspError,
    UspResponse,
};
