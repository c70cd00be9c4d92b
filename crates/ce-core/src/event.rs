//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use std::sync::Arc;

use bytes::Bytes;

use crate::attributes::Attributes;
use crate::builder::CloudEventBuilder;
use crate::extensions::{ExtensionFormat, ExtensionSet};

/// Immutable event envelope: attributes, optional payload and extensions.
///
/// `data` and `data_base64` may both be set; marshallers emit the typed
/// payload when both are present.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudEvent<T> {
    pub(crate) attributes: Attributes,
    pub(crate) data: Option<T>,
    pub(crate) data_base64: Option<Bytes>,
    pub(crate) extensions: ExtensionSet,
}

/// Borrowed view of an event handed to validators.
#[derive(Debug, Clone, Copy)]
pub struct EventShape<'a> {
    /// Context attributes.
    pub attributes: &'a Attributes,
    /// Attached extensions.
    pub extensions: &'a ExtensionSet,
    /// Whether a typed payload is present.
    pub has_data: bool,
    /// Whether a raw payload is present.
    pub has_data_base64: bool,
}

impl<T> CloudEvent<T> {
    /// Start a fresh builder.
    pub fn builder() -> CloudEventBuilder<T> {
        CloudEventBuilder::new()
    }

    /// Context attributes.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Typed payload, if any.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Raw payload, if any.
    pub fn data_base64(&self) -> Option<&Bytes> {
        self.data_base64.as_ref()
    }

    /// Attached extensions.
    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Look up an attached extension by name.
    pub fn extension(&self, name: &str) -> Option<&Arc<dyn ExtensionFormat>> {
        self.extensions.get(name)
    }

    /// Consume the event, returning the typed payload.
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// View used by validators.
    pub fn shape(&self) -> EventShape<'_> {
        EventShape {
            attributes: &self.attributes,
            extensions: &self.extensions,
            has_data: self.data.is_some(),
            has_data_base64: self.data_base64.is_some(),
        }
    }
}
