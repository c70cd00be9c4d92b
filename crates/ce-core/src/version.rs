//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Wire names shared by every spec version.
pub mod names {
    /// Event identifier.
    pub const ID: &str = "id";
    /// Event source URI reference.
    pub const SOURCE: &str = "source";
    /// Spec version marker.
    pub const SPEC_VERSION: &str = "specversion";
    /// Event type.
    pub const TYPE: &str = "type";
    /// Media type of the payload.
    pub const DATA_CONTENT_TYPE: &str = "datacontenttype";
    /// Subject of the event in the context of the source.
    pub const SUBJECT: &str = "subject";
    /// Occurrence timestamp.
    pub const TIME: &str = "time";
    /// Typed payload.
    pub const DATA: &str = "data";
    /// Raw payload in 1.0 structured documents.
    pub const DATA_BASE64: &str = "data_base64";
    /// Payload encoding marker in 0.3 structured documents.
    pub const DATA_CONTENT_ENCODING: &str = "datacontentencoding";
    /// Schema URI in 1.0.
    pub const DATA_SCHEMA: &str = "dataschema";
    /// Schema URI in 0.3.
    pub const SCHEMA_URL: &str = "schemaurl";
}

/// Supported CloudEvents spec versions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum SpecVersion {
    /// Spec version 0.3.
    #[serde(rename = "0.3")]
    #[strum(serialize = "0.3")]
    V03,
    /// Spec version 1.0.
    #[default]
    #[serde(rename = "1.0")]
    #[strum(serialize = "1.0")]
    V10,
}

impl SpecVersion {
    /// Version string written to the `specversion` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecVersion::V03 => "0.3",
            SpecVersion::V10 => "1.0",
        }
    }

    /// Wire name of the schema attribute.
    pub fn schema_key(&self) -> &'static str {
        match self {
            SpecVersion::V03 => names::SCHEMA_URL,
            SpecVersion::V10 => names::DATA_SCHEMA,
        }
    }

    /// Every key with a fixed meaning in this version's structured documents.
    pub fn reserved_keys(&self) -> &'static [&'static str] {
        match self {
            SpecVersion::V03 => &[
                names::ID,
                names::SOURCE,
                names::SPEC_VERSION,
                names::TYPE,
                names::DATA_CONTENT_TYPE,
                names::DATA_CONTENT_ENCODING,
                names::SCHEMA_URL,
                names::SUBJECT,
                names::TIME,
                names::DATA,
            ],
            SpecVersion::V10 => &[
                names::ID,
                names::SOURCE,
                names::SPEC_VERSION,
                names::TYPE,
                names::DATA_CONTENT_TYPE,
                names::DATA_SCHEMA,
                names::SUBJECT,
                names::TIME,
                names::DATA,
                names::DATA_BASE64,
            ],
        }
    }

    /// Returns true when `key` has a fixed meaning in this version.
    pub fn is_reserved(&self, key: &str) -> bool {
        self.reserved_keys().contains(&key)
    }
}
