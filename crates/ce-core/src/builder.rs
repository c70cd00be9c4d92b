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
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::attributes::Attributes;
use crate::event::CloudEvent;
use crate::extensions::{ExtensionFormat, ExtensionSet};
use crate::validation::{ConstraintValidator, Validator};
use crate::version::SpecVersion;
use crate::{Error, Result};

/// Fluent accumulator producing validated [`CloudEvent`] instances.
///
/// A builder has a single owner and is consumed by [`CloudEventBuilder::build`];
/// build one per event.
pub struct CloudEventBuilder<T> {
    id: Option<String>,
    source: Option<String>,
    spec_version: SpecVersion,
    event_type: Option<String>,
    data_content_type: Option<String>,
    data_schema: Option<String>,
    subject: Option<String>,
    time: Option<DateTime<Utc>>,
    data: Option<T>,
    data_base64: Option<Bytes>,
    extensions: ExtensionSet,
    validator: Option<Arc<dyn Validator>>,
}

impl<T> Default for CloudEventBuilder<T> {
    fn default() -> Self {
        Self {
            id: None,
            source: None,
            spec_version: SpecVersion::default(),
            event_type: None,
            data_content_type: None,
            data_schema: None,
            subject: None,
            time: None,
            data: None,
            data_base64: None,
            extensions: ExtensionSet::new(),
            validator: None,
        }
    }
}

impl<T> CloudEventBuilder<T> {
    /// Empty builder targeting the default spec version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-populated with every attribute, extension and payload of `base`.
    ///
    /// `base` is left untouched; the result derives a modified copy.
    pub fn from_event(base: &CloudEvent<T>) -> Self
    where
        T: Clone,
    {
        let attrs = base.attributes();
        Self {
            id: Some(attrs.id.clone()),
            source: Some(attrs.source.clone()),
            spec_version: attrs.spec_version,
            event_type: Some(attrs.event_type.clone()),
            data_content_type: attrs.data_content_type.clone(),
            data_schema: attrs.data_schema.clone(),
            subject: attrs.subject.clone(),
            time: attrs.time,
            data: base.data.clone(),
            data_base64: base.data_base64.clone(),
            extensions: base.extensions.clone(),
            validator: None,
        }
    }

    /// Set the event identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Use a random UUID as identifier.
    pub fn with_random_id(self) -> Self {
        self.with_id(Uuid::new_v4().to_string())
    }

    /// Set the source URI reference.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the event type.
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Select the spec version the event conforms to.
    pub fn with_spec_version(mut self, spec_version: SpecVersion) -> Self {
        self.spec_version = spec_version;
        self
    }

    /// Set the payload media type.
    pub fn with_data_content_type(mut self, data_content_type: impl Into<String>) -> Self {
        self.data_content_type = Some(data_content_type.into());
        self
    }

    /// Set the payload schema URI.
    pub fn with_dataschema(mut self, data_schema: impl Into<String>) -> Self {
        self.data_schema = Some(data_schema.into());
        self
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the occurrence timestamp.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Set the typed payload.
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the raw payload.
    pub fn with_data_base64(mut self, data: impl Into<Bytes>) -> Self {
        self.data_base64 = Some(data.into());
        self
    }

    /// Attach an extension; a later extension with the same name wins.
    pub fn with_extension<E>(self, extension: E) -> Self
    where
        E: ExtensionFormat + 'static,
    {
        self.with_shared_extension(Arc::new(extension))
    }

    /// Attach an already shared extension.
    pub fn with_shared_extension(mut self, extension: Arc<dyn ExtensionFormat>) -> Self {
        self.extensions.insert(extension);
        self
    }

    /// Replace the default [`ConstraintValidator`].
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Assemble the event and run every constraint against it.
    ///
    /// Violations from the event pass and the attribute pass are collected
    /// together; any violation fails the build with [`Error::Validation`].
    pub fn build(self) -> Result<CloudEvent<T>> {
        let attributes = Attributes {
            id: self.id.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
            spec_version: self.spec_version,
            event_type: self.event_type.unwrap_or_default(),
            data_content_type: self.data_content_type,
            data_schema: self.data_schema,
            subject: self.subject,
            time: self.time,
        };
        let event = CloudEvent {
            attributes,
            data: self.data,
            data_base64: self.data_base64,
            extensions: self.extensions,
        };

        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(ConstraintValidator) as Arc<dyn Validator>);
        let mut violations = validator.validate_event(&event.shape());
        violations.extend(validator.validate_attributes(event.attributes()));

        if !violations.is_empty() {
            violations.sort();
            violations.dedup();
            debug!(
                event_id = %event.attributes.id,
                violations = violations.len(),
                "event rejected by validation"
            );
            return Err(Error::from_violations(&violations));
        }

        Ok(event)
    }
}

impl<T> fmt::Debug for CloudEventBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudEventBuilder")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("spec_version", &self.spec_version)
            .field("event_type", &self.event_type)
            .field("has_data", &self.data.is_some())
            .field("has_data_base64", &self.data_base64.is_some())
            .field("extensions", &self.extensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::extensions::DistributedTracing;
    use crate::validation::Violation;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Much {
        wow: String,
    }

    fn required() -> CloudEventBuilder<Much> {
        CloudEventBuilder::new()
            .with_id("x10")
            .with_source("/source")
            .with_type("event-type")
    }

    #[test]
    fn required_fields_alone_build() {
        let event = required().build().expect("valid event");
        assert_eq!(event.attributes().id(), "x10");
        assert_eq!(event.attributes().spec_version(), SpecVersion::V10);
        assert!(event.data().is_none());
        assert!(event.extensions().is_empty());
    }

    #[test]
    fn missing_id_fails() {
        let err = CloudEventBuilder::<Much>::new()
            .with_source("/source")
            .with_type("event-type")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid payload: 'id' must not be blank");
    }

    #[test]
    fn missing_source_fails() {
        let err = CloudEventBuilder::<Much>::new()
            .with_id("x10")
            .with_type("event-type")
            .build()
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("'source' must not be blank"));
    }

    #[test]
    fn missing_type_fails() {
        let err = CloudEventBuilder::<Much>::new()
            .with_id("x10")
            .with_source("/source")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'type' must not be blank"));
    }

    #[test]
    fn every_violation_is_reported() {
        let err = CloudEventBuilder::<Much>::new()
            .with_source("not a uri")
            .with_dataschema("http://[::1")
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid payload: 'dataschema' must be a valid URI reference, \
             'id' must not be blank, \
             'source' must be a valid URI reference, \
             'type' must not be blank"
        );
    }

    #[test]
    fn derived_copy_equals_original() {
        let original = required()
            .with_data_content_type("application/json")
            .with_subject("subject")
            .with_dataschema("http://example.com/schema")
            .with_time(Utc.with_ymd_and_hms(2019, 6, 5, 23, 42, 0).unwrap())
            .with_data(Much { wow: "nice!".into() })
            .with_data_base64(&b"raw"[..])
            .with_extension(DistributedTracing::new("0").with_tracestate("congo=4"))
            .build()
            .expect("valid event");

        let copy = CloudEventBuilder::from_event(&original)
            .build()
            .expect("copy builds");
        assert_eq!(copy, original);

        let modified = CloudEventBuilder::from_event(&original)
            .with_subject("other")
            .build()
            .expect("modified copy builds");
        assert_eq!(modified.attributes().subject(), Some("other"));
        assert_eq!(original.attributes().subject(), Some("subject"));
    }

    struct RejectAll;

    impl Validator for RejectAll {
        fn validate_event(&self, _event: &crate::event::EventShape<'_>) -> Vec<Violation> {
            vec![Violation::new("event", "rejected")]
        }

        fn validate_attributes(&self, _attributes: &Attributes) -> Vec<Violation> {
            vec![Violation::new("attributes", "rejected")]
        }
    }

    #[test]
    fn custom_validator_results_are_combined() {
        let err = required()
            .with_validator(Arc::new(RejectAll))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid payload: 'attributes' rejected, 'event' rejected"
        );
    }
}
