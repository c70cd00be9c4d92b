//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use std::fmt;

use validator::{Validate, ValidationErrors};

use crate::attributes::Attributes;
use crate::event::EventShape;
use crate::version::{names, SpecVersion};

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Violation {
    path: String,
    message: String,
}

impl Violation {
    /// Violation of the field at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wire path of the offending field.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Human readable description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.path, self.message)
    }
}

/// Rule evaluator invoked by [`crate::CloudEventBuilder::build`].
///
/// Both passes always run; an empty result means valid.
pub trait Validator: Send + Sync {
    /// Rules spanning the whole event (payload, extensions).
    fn validate_event(&self, event: &EventShape<'_>) -> Vec<Violation>;
    /// Rules on the context attributes.
    fn validate_attributes(&self, attributes: &Attributes) -> Vec<Violation>;
}

/// Default rule set backed by the `validator` derive on [`Attributes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintValidator;

impl Validator for ConstraintValidator {
    fn validate_event(&self, event: &EventShape<'_>) -> Vec<Violation> {
        let version = event.attributes.spec_version();
        let mut violations = Vec::new();
        for extension in event.extensions.iter() {
            let name = extension.name();
            if name.trim().is_empty() {
                violations.push(Violation::new("extensions", "extension name must not be blank"));
            } else if version.is_reserved(name) {
                violations.push(Violation::new(
                    format!("extensions.{name}"),
                    "must not shadow a core attribute",
                ));
            } else {
                // Binary mode flattens these keys next to the core headers.
                for key in extension.to_binary().keys() {
                    if version.is_reserved(&key.to_ascii_lowercase()) {
                        violations.push(Violation::new(
                            format!("extensions.{name}.{key}"),
                            "must not shadow a core attribute",
                        ));
                    }
                }
            }
        }
        violations
    }

    fn validate_attributes(&self, attributes: &Attributes) -> Vec<Violation> {
        match attributes.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => violations_from(&errors, attributes.spec_version()),
        }
    }
}

fn violations_from(errors: &ValidationErrors, version: SpecVersion) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        let path = wire_path(&field.to_string(), version);
        for err in field_errors {
            let message = err
                .message
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| err.code.to_string());
            violations.push(Violation::new(path.clone(), message));
        }
    }
    violations
}

fn wire_path(field: &str, version: SpecVersion) -> String {
    match field {
        "event_type" => names::TYPE,
        "data_content_type" => names::DATA_CONTENT_TYPE,
        "data_schema" => version.schema_key(),
        "spec_version" => names::SPEC_VERSION,
        other => other,
    }
    .to_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexmap::IndexMap;

    use super::*;
    use crate::extensions::{ExtensionFormat, ExtensionSet, RawExtension};

    fn attributes(version: SpecVersion) -> Attributes {
        Attributes {
            id: "x10".into(),
            source: "/source".into(),
            spec_version: version,
            event_type: "event-type".into(),
            data_content_type: None,
            data_schema: Some("not a uri".into()),
            subject: None,
            time: None,
        }
    }

    #[test]
    fn attribute_paths_use_wire_names() {
        let violations = ConstraintValidator.validate_attributes(&attributes(SpecVersion::V03));
        assert_eq!(
            violations,
            vec![Violation::new("schemaurl", "must be a valid URI reference")]
        );
    }

    #[test]
    fn extensions_must_not_shadow_core_attributes() {
        let attrs = attributes(SpecVersion::V10);
        let mut extensions = ExtensionSet::new();
        extensions.insert(Arc::new(RawExtension::new("id", "dup".into())));
        extensions.insert(Arc::new(RawExtension::new("comexample", "ok".into())));
        let shape = EventShape {
            attributes: &attrs,
            extensions: &extensions,
            has_data: false,
            has_data_base64: false,
        };
        let violations = ConstraintValidator.validate_event(&shape);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path(), "extensions.id");
    }

    #[derive(Debug)]
    struct IdOverride;

    impl ExtensionFormat for IdOverride {
        fn name(&self) -> &str {
            "myext"
        }

        fn to_binary(&self) -> IndexMap<String, String> {
            IndexMap::from([("id".to_owned(), "evil".to_owned())])
        }

        fn to_structured(&self) -> serde_json::Value {
            serde_json::Value::from("evil")
        }
    }

    #[test]
    fn extension_binary_keys_must_not_shadow_core_attributes() {
        let attrs = attributes(SpecVersion::V10);
        let mut extensions = ExtensionSet::new();
        extensions.insert(Arc::new(IdOverride));
        let shape = EventShape {
            attributes: &attrs,
            extensions: &extensions,
            has_data: false,
            has_data_base64: false,
        };
        assert_eq!(
            ConstraintValidator.validate_event(&shape),
            vec![Violation::new("extensions.myext.id", "must not shadow a core attribute")]
        );
    }
}
