//! The wire envelope wrapping every USP message the core exchanges (§6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EndpointId, MessageId, SubscriptionId};
use crate::message::notify::Notify;
use crate::message::request::UspRequest;
use crate::message::response::UspResponse;

/// The three things a `msg_id` can be attached to on the wire (§6: Register,
/// Get/Set/Add/Delete/Operate/GetInstances/GetSupportedDM and their
/// responses, plus Notify/Error).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UspMessageBody {
    Request(UspRequest),
    Response(UspResponse),
    Notify {
        notify: Notify,
        /// Whether the sender requires a NotifyResponse (§4.6: "`send_resp`
        /// must be false" for valid incoming notifications).
        send_resp: bool,
        /// The SubsMap-matching subscription id this notify carries, absent
        /// for kinds that are not subscription-driven.
        subscription_id: Option<SubscriptionId>,
    },
}

/// An envelope around one wire message.
///
/// Unlike the generic `MessageEnvelope<M>` pattern this project is built
/// from, the payload here is the exhaustive [`UspMessageBody`] sum type
/// rather than an arbitrary type parameter: §9's design note calls for USP
/// messages to be modeled as a tagged union with an exhaustive match, so a
/// new wire kind fails to compile instead of silently falling through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UspMessage {
    pub msg_id: MessageId,

    /// The endpoint that sent this message, when known (absent for
    /// Broker-originated requests before a reply has arrived).
    pub sender: Option<EndpointId>,

    pub timestamp: DateTime<Utc>,

    pub body: UspMessageBody,
}

impl UspMessage {
    pub fn request(msg_id: MessageId, request: UspRequest) -> Self {
        Self {
            msg_id,
            sender: None,
            timestamp: Utc::now(),
            body: UspMessageBody::Request(request),
        }
    }

    pub fn response(msg_id: MessageId, response: UspResponse) -> Self {
        Self {
            msg_id,
            sender: None,
            timestamp: Utc::now(),
            body: UspMessageBody::Response(response),
        }
    }

    pub fn notify(
        msg_id: MessageId,
        notify: Notify,
        send_resp: bool,
        subscription_id: Option<SubscriptionId>,
    ) -> Self {
        Self {
            msg_id,
            sender: None,
            timestamp: Utc::now(),
            body: UspMessageBody::Notify {
                notify,
                send_resp,
                subscription_id,
            },
        }
    }

    pub fn with_sender(mut self, sender: EndpointId) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Returns a fresh copy of this message with `msg_id` replaced, used by
    /// the Passthrough Router's wire transformation (§4.7: "replaces the
    /// incoming `msg_id` with a fresh Broker-unique id").
    pub fn with_remapped_id(&self, new_id: MessageId) -> Self {
        Self {
            msg_id: new_id,
            ..self.clone()
        }
    }

    pub fn as_request(&self) -> Option<&UspRequest> {
        match &self.body {
            UspMessageBody::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&UspResponse> {
        match &self.body {
            UspMessageBody::Response(r) => Some(r),
            _ => None,
        }
    }
}
