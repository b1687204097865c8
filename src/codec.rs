//! Payload codec.
//!
//! Turns a caller-defined record into the compact string carried by a
//! [`TaskDescriptor`](crate::scheduler::tasks::TaskDescriptor) and handed
//! back through the resume intent when the notification is tapped. The
//! scheduler itself never looks inside the string.

use serde::Serialize;
use serde::de::value::StrDeserializer;
use serde::de::{Deserialize, DeserializeOwned, IntoDeserializer};
use serde_json::Value;

use crate::error::{NotifyError, Result};

/// Serialize a payload to its transport string.
///
/// The payload must serialize to a JSON object, array or string. Objects
/// and arrays become compact JSON. A string is carried verbatim unless the
/// text would itself parse as JSON, in which case it is quoted so
/// [`decode`] hands back the same string.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<String> {
    let value = serde_json::to_value(payload)
        .map_err(|e| NotifyError::Encoding(format!("cannot serialize payload: {e}")))?;
    encode_value(&value)
}

/// Serialize an untyped payload value.
pub fn encode_value(value: &Value) -> Result<String> {
    match value {
        Value::String(s) if serde_json::from_str::<Value>(s).is_err() => Ok(s.clone()),
        Value::String(_) | Value::Object(_) | Value::Array(_) => serde_json::to_string(value)
            .map_err(|e| NotifyError::Encoding(format!("cannot serialize payload: {e}"))),
        other => Err(NotifyError::Encoding(format!(
            "unsupported payload type: {}",
            json_kind(other)
        ))),
    }
}

/// Reconstruct a payload from its transport string.
///
/// Text that is not JSON is offered to `T` as a plain string, which is how
/// [`encode`] carries string payloads. Malformed text and missing required
/// fields both yield [`NotifyError::Decoding`].
pub fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T> {
    match serde_json::from_str(encoded) {
        Ok(value) => Ok(value),
        Err(json_err) => {
            let plain: StrDeserializer<'_, serde::de::value::Error> = encoded.into_deserializer();
            T::deserialize(plain)
                .map_err(|_| NotifyError::Decoding(format!("invalid payload: {json_err}")))
        }
    }
}

/// Reconstruct an untyped payload.
///
/// Text that is not JSON comes back as a string value. JSON scalars other
/// than strings are never produced by [`encode_value`] and are rejected.
pub fn decode_value(encoded: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(encoded) {
        Ok(value @ (Value::String(_) | Value::Object(_) | Value::Array(_))) => Ok(value),
        Ok(other) => Err(NotifyError::Decoding(format!(
            "unsupported payload type: {}",
            json_kind(&other)
        ))),
        Err(_) => Ok(Value::String(encoded.to_owned())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
