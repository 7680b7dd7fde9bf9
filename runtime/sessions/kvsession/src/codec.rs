use errors::{DecodeError, EncodeError};
use serde_json::{Map, Value};

use crate::ClientInfo;

/// The set of key-value pairs attached to a session.
pub type SessionState = Map<String, Value>;

/// Turns session payloads into opaque bytes for the storage backend, and back.
///
/// Codecs operate on [`serde_json::Value`]s: session state and client fingerprints
/// are converted to and from that representation by the session subsystem itself.
pub trait SessionCodec: std::fmt::Debug + Send + Sync {
    /// Serialize `value` into bytes.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError>;

    /// Deserialize bytes previously produced by [`encode`](Self::encode).
    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError>;
}

#[derive(Debug, Clone, Copy, Default)]
/// The default codec: values are stored as compact JSON documents.
///
/// Object keys are emitted in sorted order, so encoding is deterministic:
/// re-encoding decoded bytes yields the same bytes.
pub struct JsonCodec;

impl SessionCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(value).map_err(|e| EncodeError(e.into()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.into()))
    }
}

/// Encode a session state map.
pub(crate) fn encode_state(
    codec: &dyn SessionCodec,
    state: SessionState,
) -> Result<Vec<u8>, EncodeError> {
    codec.encode(&Value::Object(state))
}

/// Decode a session state map.
///
/// Anything other than a map is rejected.
pub(crate) fn decode_state(
    codec: &dyn SessionCodec,
    bytes: &[u8],
) -> Result<SessionState, DecodeError> {
    match codec.decode(bytes)? {
        Value::Object(state) => Ok(state),
        other => Err(DecodeError::UnexpectedShape {
            expected: "a map of session values",
            found: value_kind(&other),
        }),
    }
}

pub(crate) fn encode_info(
    codec: &dyn SessionCodec,
    info: &ClientInfo,
) -> Result<Vec<u8>, EncodeError> {
    let value = serde_json::to_value(info).map_err(|e| EncodeError(e.into()))?;
    codec.encode(&value)
}

pub(crate) fn decode_info(
    codec: &dyn SessionCodec,
    bytes: &[u8],
) -> Result<ClientInfo, DecodeError> {
    let value = codec.decode(bytes)?;
    if !value.is_object() {
        return Err(DecodeError::UnexpectedShape {
            expected: "a client fingerprint",
            found: value_kind(&value),
        });
    }
    serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.into()))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}

/// Errors that can occur when encoding or decoding session payloads.
pub mod errors {
    #[derive(Debug, thiserror::Error)]
    #[error("Failed to encode the session payload.")]
    /// A value couldn't be encoded by the configured [`SessionCodec`](super::SessionCodec).
    pub struct EncodeError(#[source] pub anyhow::Error);

    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// Stored bytes couldn't be turned back into a session payload.
    pub enum DecodeError {
        /// The bytes are not a valid encoding.
        #[error("The stored session payload is corrupted or was encoded with an incompatible codec.")]
        Malformed(#[source] anyhow::Error),
        /// The bytes decoded fine, but into the wrong kind of value.
        #[error("Expected the stored session payload to be {expected}, found {found}.")]
        UnexpectedShape {
            expected: &'static str,
            found: &'static str,
        },
    }
}
