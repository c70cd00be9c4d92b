//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
//! Stateless transformers between [`CloudEvent`] and wire messages.
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use strum::Display;
use tracing::debug;

use crate::builder::CloudEventBuilder;
use crate::config::UnknownKeyPolicy;
use crate::event::CloudEvent;
use crate::extensions::{ExtensionFormat, RawExtension};
use crate::version::{names, SpecVersion};
use crate::{Error, Result};

pub mod binary;
pub mod detect;
pub mod structured;

/// Media type of a structured-mode document.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";
/// Generic content type header name.
pub const CONTENT_TYPE_HEADER: &str = "content-type";

/// Wire encoding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Whole event as one JSON document.
    #[default]
    Structured,
    /// Attributes as headers, payload as body.
    Binary,
}

/// Transport-neutral message: metadata headers plus an optional body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WireMessage {
    /// Metadata entries in emission order.
    pub headers: IndexMap<String, String>,
    /// Message body.
    pub body: Option<Bytes>,
}

impl WireMessage {
    /// Header lookup ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Converts events of payload type `T` to and from [`WireMessage`].
pub trait Marshaller<T>: Send + Sync {
    /// Mode produced by [`Marshaller::marshal`].
    fn mode(&self) -> Mode;
    /// Event → wire.
    fn marshal(&self, event: &CloudEvent<T>) -> Result<WireMessage>;
    /// Wire → event.
    fn unmarshal(&self, message: &WireMessage) -> Result<CloudEvent<T>>;
}

/// Typed payload or raw bytes recovered from the wire.
pub(crate) enum Payload<T> {
    Typed(T),
    Raw(Bytes),
}

/// Core attribute values gathered from the wire before the builder runs.
#[derive(Debug, Default)]
pub(crate) struct RawAttributes {
    id: Option<String>,
    source: Option<String>,
    event_type: Option<String>,
    data_content_type: Option<String>,
    data_schema: Option<String>,
    subject: Option<String>,
    time: Option<String>,
}

impl RawAttributes {
    /// Slot for `key` when it names a core attribute of `version`.
    pub(crate) fn slot_mut(&mut self, key: &str, version: SpecVersion) -> Option<&mut Option<String>> {
        match key {
            names::ID => Some(&mut self.id),
            names::SOURCE => Some(&mut self.source),
            names::TYPE => Some(&mut self.event_type),
            names::DATA_CONTENT_TYPE => Some(&mut self.data_content_type),
            names::SUBJECT => Some(&mut self.subject),
            names::TIME => Some(&mut self.time),
            key if key == version.schema_key() => Some(&mut self.data_schema),
            _ => None,
        }
    }

    pub(crate) fn data_content_type(&self) -> Option<&str> {
        self.data_content_type.as_deref()
    }

    /// Seed a builder; required attributes left unset fail later in `build`.
    pub(crate) fn into_builder<T>(self, version: SpecVersion) -> Result<CloudEventBuilder<T>> {
        let mut builder = CloudEventBuilder::new().with_spec_version(version);
        if let Some(id) = self.id {
            builder = builder.with_id(id);
        }
        if let Some(source) = self.source {
            builder = builder.with_source(source);
        }
        if let Some(event_type) = self.event_type {
            builder = builder.with_type(event_type);
        }
        if let Some(content_type) = self.data_content_type {
            builder = builder.with_data_content_type(content_type);
        }
        if let Some(schema) = self.data_schema {
            builder = builder.with_dataschema(schema);
        }
        if let Some(subject) = self.subject {
            builder = builder.with_subject(subject);
        }
        if let Some(time) = self.time {
            builder = builder.with_time(parse_time(&time)?);
        }
        Ok(builder)
    }
}

/// Parse the `specversion` value; absence is reported like a builder violation.
pub(crate) fn parse_spec_version(raw: Option<&str>) -> Result<SpecVersion> {
    let raw = raw.ok_or_else(|| {
        Error::Validation(format!(
            "invalid payload: '{}' must not be blank",
            names::SPEC_VERSION
        ))
    })?;
    raw.parse()
        .map_err(|_| Error::format(format!("unsupported specversion '{raw}'")))
}

pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| Error::format(format!("invalid '{}' value '{raw}': {err}", names::TIME)))
}

/// Apply the unknown-key policy to a key no parser claimed.
pub(crate) fn unknown_key(
    policy: UnknownKeyPolicy,
    key: String,
    value: JsonValue,
) -> Result<Option<Arc<dyn ExtensionFormat>>> {
    match policy {
        UnknownKeyPolicy::Preserve => Ok(Some(Arc::new(RawExtension::new(key, value)))),
        UnknownKeyPolicy::Ignore => {
            debug!(key = %key, "dropping unknown key");
            Ok(None)
        }
        UnknownKeyPolicy::Reject => Err(Error::format(format!("unknown key '{key}'"))),
    }
}

/// Attach payload and extensions, then run the builder's validation.
pub(crate) fn assemble<T>(
    mut builder: CloudEventBuilder<T>,
    payload: Option<Payload<T>>,
    extensions: Vec<Arc<dyn ExtensionFormat>>,
) -> Result<CloudEvent<T>> {
    builder = match payload {
        Some(Payload::Typed(data)) => builder.with_data(data),
        Some(Payload::Raw(raw)) => builder.with_data_base64(raw),
        None => builder,
    };
    for extension in extensions {
        builder = builder.with_shared_extension(extension);
    }
    builder.build()
}
