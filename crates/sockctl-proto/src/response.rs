//! Fixed responses produced by the dispatcher itself.

use serde_json::{Value, json};

/// Message returned when a request names an unregistered method.
pub const NO_SUCH_METHOD: &str = "No such method found!";

/// Builds `{"error": "No such method found!"}`.
#[must_use]
pub fn no_such_method() -> Value {
    json!({ "error": NO_SUCH_METHOD })
}
