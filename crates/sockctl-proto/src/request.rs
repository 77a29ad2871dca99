//! Request envelope carried inside a frame.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A method call: `{"method": <string>, "data": <any>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Name of the registered method to invoke.
    pub method: String,
    /// Arbitrary payload handed to the handler; `null` when omitted.
    pub data: Value,
}

/// Reasons a complete frame cannot be turned into a [`Request`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// The payload is not valid UTF-8 JSON.
    #[error("request is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    /// The payload parsed but carries no string `method` field.
    #[error("request does not contain a method to be called")]
    MissingMethod,
}

impl Request {
    /// Builds a request for `method` with the given payload.
    #[must_use]
    pub fn new(method: impl Into<String>, data: Value) -> Self {
        Self {
            method: method.into(),
            data,
        }
    }

    /// Parses a frame payload.
    ///
    /// Anything that is valid JSON but not an object with a string `method`
    /// is rejected as [`RequestError::MissingMethod`]; any `data` value is
    /// accepted unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MalformedJson`] when the payload does not
    /// parse and [`RequestError::MissingMethod`] when the method is absent.
    pub fn parse(payload: &[u8]) -> Result<Self, RequestError> {
        let message: Value = serde_json::from_slice(payload)?;
        let Value::Object(mut fields) = message else {
            return Err(RequestError::MissingMethod);
        };
        let Some(Value::String(method)) = fields.remove("method") else {
            return Err(RequestError::MissingMethod);
        };
        let data = fields.remove("data").unwrap_or(Value::Null);
        Ok(Self { method, data })
    }
}
