//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
//! Envelope model and marshalling layer.
//!
//! Events are assembled through [`CloudEventBuilder`], which is the only
//! validation gate, and converted to wire shapes by the structured (single
//! JSON document) and binary (headers plus body) marshallers. Extensions are
//! open-ended: anything implementing [`ExtensionFormat`] can ride along, and a
//! matching [`ExtensionParser`] registered in an [`ExtensionRegistry`] brings
//! it back on the receive side.
#![warn(missing_docs)]

pub mod attributes;
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod extensions;
pub mod logging;
pub mod marshal;
pub mod validation;
pub mod version;

pub use attributes::Attributes;
pub use builder::CloudEventBuilder;
pub use codec::{CodecRegistry, JsonCodec, PayloadCodec, TextCodec};
pub use config::{MarshallerConfig, UnknownKeyPolicy};
pub use error::{Error, Result};
pub use event::CloudEvent;
pub use extensions::{
    DistributedTracing, ExtensionFormat, ExtensionParser, ExtensionRegistry, ExtensionSet,
    Partitioning, RawExtension,
};
pub use marshal::binary::{BinaryMarshaller, HeaderConvention};
pub use marshal::detect::DetectingMarshaller;
pub use marshal::structured::StructuredMarshaller;
pub use marshal::{Marshaller, Mode, WireMessage};
pub use validation::{ConstraintValidator, Validator, Violation};
pub use version::SpecVersion;
