//! The MTP transport contract the core consumes (§6 "Transport collaborator
//! contract"). Physical transports (domain socket, WebSocket, MQTT, STOMP)
//! are out of scope (§1) — this trait is the seam an embedder implements.

use std::error::Error;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;

use crate::ids::EndpointId;
use crate::message::UspMessage;

/// The expected response kind a round-trip is waiting for, used by
/// `send_request_and_await_typed_response` to discard replies of the wrong
/// shape rather than misinterpreting them (§4.4: "a 30-second wait for a
/// typed response matching the request kind").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedResponseKind {
    RegisterResp,
    DeregisterResp,
    GetResp,
    SetResp,
    AddResp,
    DeleteResp,
    OperateResp,
    GetInstancesResp,
    GetSupportedDmResp,
}

impl ExpectedResponseKind {
    pub fn matches(self, response: &crate::message::UspResponse) -> bool {
        use crate::message::UspResponse as R;
        matches!(
            (self, response),
            (Self::RegisterResp, R::RegisterResp(_))
                | (Self::DeregisterResp, R::DeregisterResp(_))
                | (Self::GetResp, R::GetResp(_))
                | (Self::SetResp, R::SetResp(_))
                | (Self::AddResp, R::AddResp(_))
                | (Self::DeleteResp, R::DeleteResp(_))
                | (Self::OperateResp, R::OperateResp(_))
                | (Self::GetInstancesResp, R::GetInstancesResp(_))
                | (Self::GetSupportedDmResp, R::GetSupportedDmResp(_))
        )
    }
}

/// The Message Transport Protocol abstraction the core consumes.
///
/// `Handle` is the opaque per-role transport handle the Service Registry
/// stores in a Service record (§3: "two transport handles... each either
/// present or absent"). Domain-socket-style transports that distinguish
/// Controller-role from Agent-role connections hand out two distinct
/// handles; transports that don't hand out the same handle for both roles
/// (§4.1 `UpdateTransport`).
#[async_trait]
pub trait Mtp: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Handle: Clone + Send + Sync + Eq + Hash + Debug + 'static;

    /// Whether this handle's transport carries an explicit reply-to address
    /// per message, versus relying on connection affinity (§6).
    fn is_reply_to_specified(&self, handle: &Self::Handle) -> bool;

    /// Enqueues a message for delivery on the given handle. Returns once the
    /// message is queued, not once it is acknowledged (§5 FIFO ordering
    /// guarantee is per-handle, provided by the transport).
    async fn queue_outbound_message(
        &self,
        handle: &Self::Handle,
        message: UspMessage,
    ) -> Result<(), Self::Error>;

    /// The blocking request/response primitive backing `SendAndWaitForResponse`
    /// (§4.4, §5). Pumps other loop events while waiting; times out after
    /// `timeout` with no retry.
    async fn send_request_and_await_typed_response(
        &self,
        endpoint: &EndpointId,
        message: UspMessage,
        handle: &Self::Handle,
        expected: ExpectedResponseKind,
        timeout: Duration,
    ) -> Result<UspMessage, Self::Error>;
}
