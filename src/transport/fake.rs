//! An in-process fake `Mtp` implementation used by integration tests
//! (§6 AMBIENT "Test tooling"). The real MTP transports are out of scope
//! (§1); this stands in for them so the core's round-trip logic can be
//! exercised without real sockets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::ids::EndpointId;
use crate::message::UspMessage;
use crate::transport::traits::{ExpectedResponseKind, Mtp};

pub type FakeHandle = u64;

#[derive(Debug, Error)]
pub enum FakeMtpError {
    #[error("round-trip timed out waiting for a response")]
    Timeout,

    #[error("the waiting round-trip was dropped before a response arrived")]
    Canceled,

    #[error("received a response of the wrong kind for the pending request")]
    UnexpectedResponseKind,
}

struct FakeMtpInner {
    outbound: Mutex<Vec<(FakeHandle, UspMessage)>>,
    waiters: Mutex<HashMap<String, oneshot::Sender<UspMessage>>>,
}

/// A cheaply-clonable fake transport. Tests drive it by calling
/// [`FakeMtp::deliver_response`] with the `msg_id` of a message previously
/// observed via [`FakeMtp::drain_outbound`].
#[derive(Clone)]
pub struct FakeMtp {
    inner: Arc<FakeMtpInner>,
}

impl Default for FakeMtp {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMtp {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FakeMtpInner {
                outbound: Mutex::new(Vec::new()),
                waiters: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Removes and returns every message queued so far, in send order.
    pub fn drain_outbound(&self) -> Vec<(FakeHandle, UspMessage)> {
        let mut outbound = self.inner.outbound.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *outbound)
    }

    /// Delivers a response to whichever pending round-trip is waiting on
    /// `msg_id`. Returns `false` if no round-trip is currently waiting on it
    /// (e.g. it already timed out).
    pub fn deliver_response(&self, msg_id: &str, response: UspMessage) -> bool {
        let mut waiters = self.inner.waiters.lock().unwrap_or_else(|e| e.into_inner());
        match waiters.remove(msg_id) {
            Some(sender) => sender.send(response).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Mtp for FakeMtp {
    type Error = FakeMtpError;
    type Handle = FakeHandle;

    fn is_reply_to_specified(&self, _handle: &Self::Handle) -> bool {
        true
    }

    async fn queue_outbound_message(
        &self,
        handle: &Self::Handle,
        message: UspMessage,
    ) -> Result<(), Self::Error> {
        let mut outbound = self.inner.outbound.lock().unwrap_or_else(|e| e.into_inner());
        outbound.push((*handle, message));
        Ok(())
    }

    async fn send_request_and_await_typed_response(
        &self,
        _endpoint: &EndpointId,
        message: UspMessage,
        handle: &Self::Handle,
        expected: ExpectedResponseKind,
        timeout: Duration,
    ) -> Result<UspMessage, Self::Error> {
        let msg_id = message.msg_id.as_str().to_string();
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.inner.waiters.lock().unwrap_or_else(|e| e.into_inner());
            waiters.insert(msg_id.clone(), tx);
        }

        self.queue_outbound_message(handle, message).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => match response.as_response() {
                Some(r) if expected.matches(r) => Ok(response),
                _ => Err(FakeMtpError::UnexpectedResponseKind),
            },
            Ok(Err(_)) => Err(FakeMtpError::Canceled),
            Err(_) => {
                let mut waiters = self.inner.waiters.lock().unwrap_or_else(|e| e.into_inner());
                waiters.remove(&msg_id);
                Err(FakeMtpError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MessageId;
    use crate::message::{GetRequest, GetResponse, UspRequest, UspResponse};

    #[tokio::test]
    async fn queue_outbound_message_is_observable_via_drain() {
        let mtp = FakeMtp::new();
        let msg = UspMessage::request(
            MessageId::from_parts(1, 1),
            UspRequest::Get(GetRequest {
                paths: vec!["Device.X.Y".to_string()],
                max_depth: 0,
            }),
        );

        mtp.queue_outbound_message(&1, msg).await.expect("queues");

        let drained = mtp.drain_outbound();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, 1);
    }

    #[tokio::test]
    async fn round_trip_resolves_when_response_is_delivered() {
        let mtp = FakeMtp::new();
        let msg_id = MessageId::from_parts(1, 1);
        let request = UspMessage::request(
            msg_id.clone(),
            UspRequest::Get(GetRequest {
                paths: vec!["Device.X.Y".to_string()],
                max_depth: 0,
            }),
        );

        let mtp_clone = mtp.clone();
        let id_str = msg_id.as_str().to_string();
        let handle = tokio::spawn(async move {
            mtp_clone
                .send_request_and_await_typed_response(
                    &EndpointId::new("svc-1"),
                    request,
                    &1,
                    ExpectedResponseKind::GetResp,
                    Duration::from_secs(1),
                )
                .await
        });

        tokio::task::yield_now().await;
        let response = UspMessage::response(
            msg_id,
            UspResponse::GetResp(GetResponse { results: vec![] }),
        );
        assert!(mtp.deliver_response(&id_str, response));

        let result = handle.await.expect("task completes");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn round_trip_times_out_without_a_response() {
        let mtp = FakeMtp::new();
        let request = UspMessage::request(
            MessageId::from_parts(1, 1),
            UspRequest::Get(GetRequest {
                paths: vec![],
                max_depth: 0,
            }),
        );

        let result = mtp
            .send_request_and_await_typed_response(
                &EndpointId::new("svc-1"),
                request,
                &1,
                ExpectedResponseKind::GetResp,
                Duration::from_millis(10),
            )
            .await;

        assert!(matches!(result, Err(FakeMtpError::Timeout)));
    }
}
