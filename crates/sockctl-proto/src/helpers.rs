//! Conventions for method handlers.
//!
//! Handlers never fail out-of-band: a failure is a JSON value with an
//! `error` key, success without a payload is `{"result": "ok"}`.
//!
//! ```rust
//! use serde_json::{Value, json};
//! use sockctl_proto::helpers::{JsonKind, expect_field, json_ok};
//!
//! fn set_grid_size(data: Value) -> Value {
//!     if let Err(error) = expect_field(&data, "width", JsonKind::Integer) {
//!         return error;
//!     }
//!     json_ok()
//! }
//!
//! assert_eq!(set_grid_size(json!({"width": 3})), json_ok());
//! assert!(set_grid_size(json!({})).get("error").is_some());
//! ```

use std::fmt;

use serde_json::{Value, json};

/// JSON value categories accepted by [`expect_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    /// A JSON string.
    String,
    /// A number representable as a signed or unsigned 64-bit integer.
    Integer,
    /// A number representable as an unsigned 64-bit integer.
    Unsigned,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Bool,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl JsonKind {
    /// Returns true when `value` belongs to this category.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Unsigned => value.is_u64(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Unsigned => "unsigned",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Success value for handlers with nothing else to report.
#[must_use]
pub fn json_ok() -> Value {
    json!({ "result": "ok" })
}

/// Error value carrying `message`.
#[must_use]
pub fn json_error(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// Looks up `field` in `data` and checks its kind.
///
/// # Errors
///
/// Returns a ready-to-send [`json_error`] value when the field is absent or
/// has the wrong kind.
pub fn expect_field<'a>(data: &'a Value, field: &str, kind: JsonKind) -> Result<&'a Value, Value> {
    let Some(value) = data.get(field) else {
        return Err(json_error(format!("Missing \"{field}\"")));
    };
    if !kind.matches(value) {
        return Err(json_error(format!(
            "Field \"{field}\" does not have the correct type {kind}"
        )));
    }
    Ok(value)
}
