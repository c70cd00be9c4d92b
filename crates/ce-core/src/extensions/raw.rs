//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use super::ExtensionFormat;

/// Extension data no registered parser claimed, kept verbatim so that
/// re-serialization does not lose it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExtension {
    name: String,
    value: JsonValue,
}

impl RawExtension {
    /// Wrap an unrecognised key and its value.
    pub fn new(name: impl Into<String>, value: JsonValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Value as found on the wire.
    pub fn value(&self) -> &JsonValue {
        &self.value
    }
}

impl ExtensionFormat for RawExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn to_binary(&self) -> IndexMap<String, String> {
        let rendered = match &self.value {
            JsonValue::String(text) => text.clone(),
            other => other.to_string(),
        };
        IndexMap::from([(self.name.clone(), rendered)])
    }

    fn to_structured(&self) -> JsonValue {
        self.value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_stay_unquoted_in_binary_mode() {
        let ext = RawExtension::new("comexampleextension", JsonValue::from("value"));
        assert_eq!(ext.to_binary()["comexampleextension"], "value");

        let nested = RawExtension::new("custom", serde_json::json!({"a": 1}));
        assert_eq!(nested.to_binary()["custom"], r#"{"a":1}"#);
        assert_eq!(nested.to_structured(), serde_json::json!({"a": 1}));
    }
}
