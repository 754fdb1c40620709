//! Decoded response body as seen by a transform.

use bytes::Bytes;
use serde_json::Value;

/// A fully decoded body.
///
/// Bodies that parse as JSON arrive as [`Payload::Json`]. Anything else is
/// handed over as [`Payload::Text`] when it is UTF-8, and as untouched
/// [`Payload::Bytes`] otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl Payload {
    /// Parse a body, falling back to [`Payload::raw`].
    pub fn parse(body: &Bytes) -> Result<Self, (Self, serde_json::Error)> {
        serde_json::from_slice(body).map(Payload::Json).map_err(|e| (Payload::raw(body.clone()), e))
    }

    /// Wrap a non-JSON body: text if it is UTF-8, bytes otherwise.
    pub fn raw(body: Bytes) -> Self {
        match std::str::from_utf8(&body) {
            Ok(text) => Payload::Text(text.to_owned()),
            Err(_) => Payload::Bytes(body),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_json_mut(&mut self) -> Option<&mut Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the payload counts as "nothing" and serializes to an empty body.
    ///
    /// `null`, `false`, `0`, `""` and empty text are falsy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Payload::Text(text) => text.is_empty(),
            Payload::Bytes(bytes) => bytes.is_empty(),
            Payload::Json(Value::Null) => true,
            Payload::Json(Value::Bool(b)) => !b,
            Payload::Json(Value::Number(n)) => n.as_f64() == Some(0.0),
            Payload::Json(Value::String(s)) => s.is_empty(),
            Payload::Json(_) => false,
        }
    }

    /// Serialize for emission: text and bytes verbatim, JSON compact.
    pub fn into_bytes(self) -> Bytes {
        if self.is_falsy() {
            return Bytes::new();
        }
        match self {
            Payload::Text(text) => Bytes::from(text),
            Payload::Bytes(bytes) => bytes,
            Payload::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}
