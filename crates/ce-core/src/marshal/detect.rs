//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::binary::BinaryMarshaller;
use super::structured::StructuredMarshaller;
use super::{Marshaller, Mode, WireMessage, CONTENT_TYPE_HEADER};
use crate::codec::media_type_essence;
use crate::config::MarshallerConfig;
use crate::event::CloudEvent;
use crate::extensions::ExtensionRegistry;
use crate::Result;

const STRUCTURED_FAMILY: &str = "application/cloudevents";

/// Receives either mode and sends in a fixed one.
///
/// Inbound messages whose `content-type` belongs to the
/// `application/cloudevents` family are read as structured documents,
/// everything else as binary.
#[derive(Debug, Clone, Default)]
pub struct DetectingMarshaller {
    structured: StructuredMarshaller,
    binary: BinaryMarshaller,
    outbound: Mode,
}

impl DetectingMarshaller {
    /// Detecting marshaller sending structured documents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode used by [`Marshaller::marshal`].
    pub fn with_outbound(mut self, mode: Mode) -> Self {
        self.outbound = mode;
        self
    }

    /// Share one extension registry between both modes.
    pub fn with_registry(mut self, registry: ExtensionRegistry) -> Self {
        self.structured = self.structured.with_registry(registry.clone());
        self.binary = self.binary.with_registry(registry);
        self
    }

    /// Share one configuration between both modes.
    pub fn with_config(mut self, config: MarshallerConfig) -> Self {
        self.structured = self.structured.with_config(config.clone());
        self.binary = self.binary.with_config(config);
        self
    }

    /// Mode an inbound message is encoded in.
    pub fn detect(message: &WireMessage) -> Mode {
        match message.header(CONTENT_TYPE_HEADER) {
            Some(content_type) if media_type_essence(content_type).starts_with(STRUCTURED_FAMILY) => {
                Mode::Structured
            }
            _ => Mode::Binary,
        }
    }
}

impl<T> Marshaller<T> for DetectingMarshaller
where
    T: Serialize + DeserializeOwned,
{
    fn mode(&self) -> Mode {
        self.outbound
    }

    fn marshal(&self, event: &CloudEvent<T>) -> Result<WireMessage> {
        match self.outbound {
            Mode::Structured => self.structured.marshal(event),
            Mode::Binary => self.binary.marshal(event),
        }
    }

    fn unmarshal(&self, message: &WireMessage) -> Result<CloudEvent<T>> {
        match Self::detect(message) {
            Mode::Structured => self.structured.unmarshal(message),
            Mode::Binary => self.binary.unmarshal(message),
        }
    }
}
