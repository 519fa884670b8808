//! Top-level error taxonomy (§7 ERROR HANDLING DESIGN).

use thiserror::Error;

use crate::ids::EndpointId;

/// Errors produced by the broker core.
///
/// Variant names follow §7 directly; none of them are language-specific
/// wrappers around an underlying wire error code, so callers can match on
/// them without reaching into a nested payload.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// An inbound message could not be parsed or made no protocol sense.
    /// Per §7(i) this is answered with a USP ERROR, never a crash.
    #[error("message not understood: {reason}")]
    MessageNotUnderstood {
        /// Human-readable reason, surfaced in the USP ERROR body.
        reason: String,
    },

    /// A Register request failed path validation or capacity checks (§4.2).
    #[error("register failed for {prefix}: {reason}")]
    RegisterFailure {
        /// The offending requested prefix.
        prefix: String,
        reason: String,
    },

    /// A requested prefix is already owned by a Service (§4.2, §8 Path
    /// ownership invariant).
    #[error("path already registered: {prefix}")]
    PathAlreadyRegistered {
        prefix: String,
    },

    /// A Deregister request named a prefix not owned by the caller (§4.2).
    #[error("deregister failed for {prefix}: {reason}")]
    DeregisterFailure {
        prefix: String,
        reason: String,
    },

    /// A caller's role does not permit the requested action on the path
    /// (§4.7 passthrough permission checks, §4.4 Async Operate precondition).
    #[error("request denied: {reason}")]
    RequestDenied {
        reason: String,
    },

    /// An Operate invocation failed on the Service side; carries the
    /// Service's own failure code/message verbatim (§4.4, §4.8).
    #[error("command failure ({code}): {message}")]
    CommandFailure {
        code: String,
        message: String,
    },

    /// The Service Registry's fixed capacity, or its group-id space, is
    /// exhausted (§4.1 Add).
    #[error("resources exceeded: {reason}")]
    ResourcesExceeded {
        reason: String,
    },

    /// An internal failure with no more specific classification: a
    /// round-trip timeout (§4.4, §5), a transport-layer fault, or a
    /// Service response that violates USP shape (§7(iv)).
    #[error("internal error: {reason}")]
    Internal {
        reason: String,
    },
}

impl BrokerError {
    pub fn message_not_understood(reason: impl Into<String>) -> Self {
        Self::MessageNotUnderstood {
            reason: reason.into(),
        }
    }

    pub fn register_failure(prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RegisterFailure {
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }

    pub fn path_already_registered(prefix: impl Into<String>) -> Self {
        Self::PathAlreadyRegistered {
            prefix: prefix.into(),
        }
    }

    pub fn deregister_failure(prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeregisterFailure {
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }

    pub fn request_denied(reason: impl Into<String>) -> Self {
        Self::RequestDenied {
            reason: reason.into(),
        }
    }

    pub fn command_failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailure {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn resources_exceeded(reason: impl Into<String>) -> Self {
        Self::ResourcesExceeded {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// True for errors §7 classifies as retriable by a higher layer (round-trip
    /// timeouts and other internal faults), as opposed to protocol/permission
    /// rejections that a retry would not change.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// True when this error should be reported per-path rather than failing
    /// an entire batch operation (§4.4 Get/Set per-path error handling).
    pub fn is_param_level(&self) -> bool {
        matches!(self, Self::CommandFailure { .. })
    }
}

/// A single parameter-level error, reported inline in responses rather than
/// propagated as a top-level `Err` (§7: "Per-parameter errors carry
/// `{path, code, message}`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamError {
    pub path: String,
    pub code: String,
    pub message: String,
}

impl ParamError {
    pub fn new(path: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Context attached to errors that originate from a specific Service, used
/// by the Lifecycle Manager when logging swallowed reconciliation errors
/// (§7(iii)).
#[derive(Debug, Clone)]
pub struct ServiceErrorContext {
    pub endpoint: EndpointId,
    pub error: String,
}
