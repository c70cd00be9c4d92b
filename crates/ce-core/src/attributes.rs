//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use std::borrow::Cow;

use chrono::{DateTime, Utc};
use url::Url;
use validator::{Validate, ValidationError};

use crate::version::SpecVersion;

/// Context attributes of an event.
///
/// Instances are only produced by [`crate::CloudEventBuilder`] and never
/// change afterwards; all access goes through the accessors below.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct Attributes {
    #[validate(length(min = 1, message = "must not be blank"))]
    pub(crate) id: String,
    #[validate(
        length(min = 1, message = "must not be blank"),
        custom(function = "validate_uri_reference")
    )]
    pub(crate) source: String,
    pub(crate) spec_version: SpecVersion,
    #[validate(length(min = 1, message = "must not be blank"))]
    pub(crate) event_type: String,
    #[validate(length(min = 1, message = "must not be blank"))]
    pub(crate) data_content_type: Option<String>,
    #[validate(custom(function = "validate_uri_reference"))]
    pub(crate) data_schema: Option<String>,
    pub(crate) subject: Option<String>,
    pub(crate) time: Option<DateTime<Utc>>,
}

impl Attributes {
    /// Event identifier, unique per source.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// URI reference identifying the context in which the event happened.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Spec version the event conforms to.
    pub fn spec_version(&self) -> SpecVersion {
        self.spec_version
    }

    /// Type of the event.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Media type of the payload.
    pub fn data_content_type(&self) -> Option<&str> {
        self.data_content_type.as_deref()
    }

    /// Schema the payload adheres to.
    pub fn data_schema(&self) -> Option<&str> {
        self.data_schema.as_deref()
    }

    /// Subject of the event in the context of the source.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Occurrence timestamp.
    pub fn time(&self) -> Option<&DateTime<Utc>> {
        self.time.as_ref()
    }
}

/// Returns true when `value` is an absolute URI or a relative reference.
pub fn is_uri_reference(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(value) {
        Ok(_) => true,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost/")
            .and_then(|base| base.join(value))
            .is_ok(),
        Err(_) => false,
    }
}

fn validate_uri_reference(value: &str) -> Result<(), ValidationError> {
    if is_uri_reference(value) {
        return Ok(());
    }
    let mut err = ValidationError::new("uri_reference");
    err.message = Some(Cow::Borrowed("must be a valid URI reference"));
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes() -> Attributes {
        Attributes {
            id: "x10".into(),
            source: "/source".into(),
            spec_version: SpecVersion::V10,
            event_type: "event-type".into(),
            data_content_type: None,
            data_schema: None,
            subject: None,
            time: None,
        }
    }

    #[test]
    fn relative_and_absolute_references_are_accepted() {
        assert!(is_uri_reference("/source"));
        assert!(is_uri_reference("urn:event:from:myapi/resource/123"));
        assert!(is_uri_reference("https://github.com/cloudevents/spec/pull"));
        assert!(!is_uri_reference("not a uri"));
        assert!(!is_uri_reference("http://[::1"));
    }

    #[test]
    fn complete_attributes_pass_constraints() {
        assert!(attributes().validate().is_ok());
    }

    #[test]
    fn blank_required_fields_are_reported() {
        let mut attrs = attributes();
        attrs.id.clear();
        attrs.event_type.clear();
        let errors = attrs.validate().expect_err("blank fields rejected");
        let fields = errors.field_errors();
        assert!(fields.keys().any(|field| field.to_string() == "id"));
        assert!(fields.keys().any(|field| field.to_string() == "event_type"));
    }

    #[test]
    fn malformed_schema_is_reported() {
        let mut attrs = attributes();
        attrs.data_schema = Some("http://[::1".into());
        assert!(attrs.validate().is_err());
    }
}
