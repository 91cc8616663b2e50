//! Normalization of output scripts.
//!
//! Nodes and upstream relays hand the `scriptPubKey` of an output over in
//! more than one shape. [`ScriptPubKey`] names those shapes and
//! [`ScriptPubKey::normalize`] turns any of them into the structured and
//! textual forms stored side by side in the ledger.

use serde_json::{json, Map, Value};

/// The shapes a script field arrives in.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptPubKey {
    /// A JSON document encoded as a string.
    RawString(String),
    /// An already decoded JSON value.
    ParsedObject(Value),
    Missing,
}

/// A script in both of its persisted forms, plus the address it pays to.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedScript {
    pub structured: Value,
    pub text: String,
    pub address: Option<String>,
}

impl ScriptPubKey {
    pub fn from_field(field: Option<&Value>) -> Self {
        match field {
            None | Some(Value::Null) => ScriptPubKey::Missing,
            Some(Value::String(s)) => ScriptPubKey::RawString(s.clone()),
            Some(other) => ScriptPubKey::ParsedObject(other.clone()),
        }
    }

    pub fn normalize(self) -> NormalizedScript {
        let structured = match self {
            ScriptPubKey::RawString(raw) => {
                serde_json::from_str(&raw).unwrap_or_else(|_| json!({ "raw": raw }))
            }
            ScriptPubKey::ParsedObject(value) => value,
            ScriptPubKey::Missing => Value::Object(Map::new()),
        };

        let address = primary_address(&structured);
        let text = structured.to_string();

        NormalizedScript {
            structured,
            text,
            address,
        }
    }
}

/// First entry of `addresses`, else the singular `address`.
pub fn primary_address(script: &Value) -> Option<String> {
    let from_list = script
        .get("addresses")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(Value::as_str);

    from_list
        .or_else(|| script.get("address").and_then(Value::as_str))
        .map(str::to_string)
}
