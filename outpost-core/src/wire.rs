// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Wire message model for cross-process invocation.
//!
//! Every frame payload starts with a 4-byte little-endian type tag
//! followed by the JSON body of the message. Requests and responses
//! are correlated by [`MessageId`]; arrival order carries no meaning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::WireError;
use crate::types::{MessageId, MethodPath};

/// Size of the payload type tag prefixed to every message body.
pub const PAYLOAD_TAG_LEN: usize = 4;

// =============================================================================
// Payload Types
// =============================================================================

/// Discriminates message bodies inside a frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PayloadType {
    InvokeRequest = 1,
    InvokeResponse = 2,
}

impl TryFrom<u32> for PayloadType {
    type Error = WireError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PayloadType::InvokeRequest),
            2 => Ok(PayloadType::InvokeResponse),
            tag => Err(WireError::UnknownPayloadType { tag }),
        }
    }
}

// =============================================================================
// Method Faults
// =============================================================================

/// Fault kind for an operation rejected or failed by the remote handler.
pub const FAULT_INVALID_OPERATION: &str = "InvalidOperationError";
/// Fault kind for malformed or mistyped call arguments.
pub const FAULT_INVALID_ARGUMENTS: &str = "InvalidArgumentsError";
/// Fault kind when the callee has no declaration for the requested path.
pub const FAULT_UNKNOWN_METHOD: &str = "UnknownMethodError";
/// Fault kind when the declaration exists but is not remotely callable.
pub const FAULT_INELIGIBLE_METHOD: &str = "IneligibleMethodError";
/// Fault kind when the handler panicked while executing.
pub const FAULT_PANIC: &str = "PanicError";
/// Fault kind when a result value could not be serialized for transit.
pub const FAULT_SERIALIZATION: &str = "SerializationError";

/// Serializable description of a failure raised by the remote side.
///
/// Carries the original fault kind and message so the caller observes
/// the same failure it would have seen in-process. `cause` holds the
/// rendering of at most one nested failure layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct MethodFault {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl MethodFault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(FAULT_INVALID_OPERATION, message)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(FAULT_INVALID_ARGUMENTS, message)
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Request to execute a declared method on the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub id: MessageId,
    pub method: MethodPath,
    pub args: Vec<Value>,
}

/// Outcome of a remote execution, either a value or a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    Ok { value: Value },
    Err { fault: MethodFault },
}

impl CallOutcome {
    pub fn ok(value: Value) -> Self {
        CallOutcome::Ok { value }
    }

    pub fn fault(fault: MethodFault) -> Self {
        CallOutcome::Err { fault }
    }

    pub fn into_result(self) -> Result<Value, MethodFault> {
        match self {
            CallOutcome::Ok { value } => Ok(value),
            CallOutcome::Err { fault } => Err(fault),
        }
    }
}

/// Response carrying the outcome for a previously issued request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub id: MessageId,
    pub outcome: CallOutcome,
}

/// Decoded frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Request(InvokeRequest),
    Response(InvokeResponse),
}

// =============================================================================
// Encoding / Decoding
// =============================================================================

pub fn encode_request(request: &InvokeRequest) -> Result<Vec<u8>, WireError> {
    encode(PayloadType::InvokeRequest, request, "invoke request")
}

pub fn encode_response(response: &InvokeResponse) -> Result<Vec<u8>, WireError> {
    encode(PayloadType::InvokeResponse, response, "invoke response")
}

fn encode<T: Serialize>(
    payload_type: PayloadType,
    body: &T,
    what: &'static str,
) -> Result<Vec<u8>, WireError> {
    let json = serde_json::to_vec(body).map_err(|e| WireError::Encode {
        what,
        reason: e.to_string(),
    })?;
    let mut payload = Vec::with_capacity(PAYLOAD_TAG_LEN + json.len());
    payload.extend_from_slice(&(payload_type as u32).to_le_bytes());
    payload.extend_from_slice(&json);
    Ok(payload)
}

/// Decode a frame payload into a wire message.
///
/// Rejects payloads shorter than the type tag, unknown tags, and
/// bodies that fail JSON deserialization.
pub fn decode(payload: &[u8]) -> Result<WireMessage, WireError> {
    if payload.len() < PAYLOAD_TAG_LEN {
        return Err(WireError::Decode {
            what: "payload tag",
            reason: format!("payload of {} bytes is shorter than the tag", payload.len()),
        });
    }
    let mut tag_bytes = [0u8; PAYLOAD_TAG_LEN];
    tag_bytes.copy_from_slice(&payload[..PAYLOAD_TAG_LEN]);
    let payload_type = PayloadType::try_from(u32::from_le_bytes(tag_bytes))?;
    let body = &payload[PAYLOAD_TAG_LEN..];

    match payload_type {
        PayloadType::InvokeRequest => {
            let request: InvokeRequest =
                serde_json::from_slice(body).map_err(|e| WireError::Decode {
                    what: "invoke request",
                    reason: e.to_string(),
                })?;
            Ok(WireMessage::Request(request))
        }
        PayloadType::InvokeResponse => {
            let response: InvokeResponse =
                serde_json::from_slice(body).map_err(|e| WireError::Decode {
                    what: "invoke response",
                    reason: e.to_string(),
                })?;
            Ok(WireMessage::Response(response))
        }
    }
}
