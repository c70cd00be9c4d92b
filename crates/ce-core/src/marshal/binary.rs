//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
//! Binary mode: attributes and extensions as prefixed headers, payload as body.
//!
//! `datacontenttype` travels in the plain `content-type` header. Headers that
//! carry neither the prefix nor `content-type` belong to the transport and are
//! ignored on the way in.
use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use super::{
    assemble, format_time, parse_spec_version, unknown_key, Marshaller, Mode, Payload,
    RawAttributes, WireMessage, CONTENT_TYPE_HEADER,
};
use crate::codec::CodecRegistry;
use crate::config::MarshallerConfig;
use crate::event::CloudEvent;
use crate::extensions::{ExtensionFormat, ExtensionRegistry};
use crate::logging::{log_event, EventDirection};
use crate::version::names;
use crate::{Error, Result};

/// Header naming scheme for binary mode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderConvention {
    /// `ce_` prefix, as used on Kafka record headers.
    #[default]
    Kafka,
    /// `ce-` prefix, as used on HTTP.
    Http,
    /// Caller supplied prefix.
    Custom {
        /// Prefix prepended to every attribute and extension key.
        prefix: String,
    },
}

impl HeaderConvention {
    /// Prefix prepended to attribute and extension keys.
    pub fn prefix(&self) -> &str {
        match self {
            HeaderConvention::Kafka => "ce_",
            HeaderConvention::Http => "ce-",
            HeaderConvention::Custom { prefix } => prefix,
        }
    }

    /// Header name for an attribute or extension key.
    pub fn header_name(&self, key: &str) -> String {
        if key == names::DATA_CONTENT_TYPE {
            return CONTENT_TYPE_HEADER.to_owned();
        }
        format!("{}{key}", self.prefix())
    }

    /// Attribute or extension key for a header, `None` for transport headers.
    pub fn attribute_name(&self, header: &str) -> Option<String> {
        let lowered = header.to_ascii_lowercase();
        if lowered == CONTENT_TYPE_HEADER {
            return Some(names::DATA_CONTENT_TYPE.to_owned());
        }
        let prefix = self.prefix().to_ascii_lowercase();
        lowered
            .strip_prefix(&prefix)
            .filter(|rest| !rest.is_empty())
            .map(str::to_owned)
    }
}

/// Marshaller for binary-mode messages.
#[derive(Debug, Clone, Default)]
pub struct BinaryMarshaller {
    registry: ExtensionRegistry,
    codecs: CodecRegistry,
    config: MarshallerConfig,
}

impl BinaryMarshaller {
    /// Marshaller with default registries and the Kafka header convention.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `registry` to recognise extensions.
    pub fn with_registry(mut self, registry: ExtensionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use `codecs` to encode and decode payloads.
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// Replace the configuration, including the header convention.
    pub fn with_config(mut self, config: MarshallerConfig) -> Self {
        self.config = config;
        self
    }

    /// Header convention in use.
    pub fn convention(&self) -> &HeaderConvention {
        &self.config.headers
    }

    /// Render attributes and extensions as header pairs in emission order.
    ///
    /// An extension key that maps onto a header already emitted is a format
    /// error; core attributes are never overwritten.
    pub fn to_headers<T>(&self, event: &CloudEvent<T>) -> Result<IndexMap<String, String>> {
        let convention = &self.config.headers;
        let attrs = event.attributes();
        let version = attrs.spec_version();
        let mut headers = IndexMap::new();

        headers.insert(convention.header_name(names::ID), attrs.id().to_owned());
        headers.insert(convention.header_name(names::SOURCE), attrs.source().to_owned());
        headers.insert(
            convention.header_name(names::SPEC_VERSION),
            version.as_str().to_owned(),
        );
        headers.insert(convention.header_name(names::TYPE), attrs.event_type().to_owned());
        if let Some(content_type) = attrs.data_content_type() {
            headers.insert(
                convention.header_name(names::DATA_CONTENT_TYPE),
                content_type.to_owned(),
            );
        }
        if let Some(schema) = attrs.data_schema() {
            headers.insert(convention.header_name(version.schema_key()), schema.to_owned());
        }
        if let Some(subject) = attrs.subject() {
            headers.insert(convention.header_name(names::SUBJECT), subject.to_owned());
        }
        if let Some(time) = attrs.time() {
            headers.insert(convention.header_name(names::TIME), format_time(time));
        }
        for extension in event.extensions().iter() {
            for (key, value) in extension.to_binary() {
                let header = convention.header_name(&key);
                if headers.keys().any(|taken| taken.eq_ignore_ascii_case(&header)) {
                    return Err(Error::format(format!(
                        "extension '{}' collides with header '{header}'",
                        extension.name()
                    )));
                }
                headers.insert(header, value);
            }
        }
        Ok(headers)
    }

    /// Encode the payload for the body; typed data wins over raw bytes.
    pub fn to_body<T: Serialize>(&self, event: &CloudEvent<T>) -> Result<Option<Bytes>> {
        if let Some(data) = event.data() {
            let value = serde_json::to_value(data)?;
            let content_type = event.attributes().data_content_type();
            let body = match content_type {
                None => Bytes::from(serde_json::to_vec(&value)?),
                Some(content_type) => match self.codecs.find(content_type) {
                    Some(codec) => codec.encode(&value)?,
                    None => match value {
                        JsonValue::String(text) => Bytes::from(text.into_bytes()),
                        _ => {
                            return Err(Error::format(format!(
                                "no codec encodes '{content_type}' payloads"
                            )))
                        }
                    },
                },
            };
            return Ok(Some(body));
        }
        Ok(event.data_base64().cloned())
    }

    /// Rebuild an event from headers and body.
    pub fn from_parts<T: DeserializeOwned>(
        &self,
        headers: &IndexMap<String, String>,
        body: Option<&Bytes>,
    ) -> Result<CloudEvent<T>> {
        let convention = &self.config.headers;
        let mut keyed: IndexMap<String, String> = headers
            .iter()
            .filter_map(|(header, value)| {
                convention
                    .attribute_name(header)
                    .map(|key| (key, value.clone()))
            })
            .collect();

        let version = parse_spec_version(keyed.shift_remove(names::SPEC_VERSION).as_deref())?;

        let mut attributes = RawAttributes::default();
        let mut leftovers = IndexMap::new();
        for (key, value) in keyed {
            match attributes.slot_mut(&key, version) {
                Some(slot) => *slot = Some(value),
                None => {
                    leftovers.insert(key, value);
                }
            }
        }

        let mut extensions: Vec<Arc<dyn ExtensionFormat>> =
            self.registry.parse_binary(&mut leftovers)?;
        for (key, value) in leftovers {
            if let Some(raw) = unknown_key(self.config.unknown_keys, key, JsonValue::String(value))? {
                extensions.push(raw);
            }
        }

        let payload = match body.filter(|body| !body.is_empty()) {
            Some(body) => Some(self.decode_body(attributes.data_content_type(), body)?),
            None => None,
        };

        assemble(attributes.into_builder(version)?, payload, extensions)
    }

    fn decode_body<T: DeserializeOwned>(
        &self,
        content_type: Option<&str>,
        body: &Bytes,
    ) -> Result<Payload<T>> {
        // Without a declared media type the body stays opaque.
        let Some(content_type) = content_type else {
            return Ok(Payload::Raw(body.clone()));
        };
        let Some(codec) = self.codecs.find(content_type) else {
            if self.config.strict_payload {
                return Err(Error::UnsupportedContentType {
                    content_type: content_type.to_owned(),
                    payload: body.clone(),
                });
            }
            warn!(content_type, "no codec for content type, payload kept as raw bytes");
            return Ok(Payload::Raw(body.clone()));
        };

        let decoded = codec
            .decode(body)
            .and_then(|value| serde_json::from_value::<T>(value).map_err(Error::from));
        match decoded {
            Ok(data) => Ok(Payload::Typed(data)),
            Err(err) if self.config.strict_payload => Err(Error::format(format!(
                "cannot decode '{content_type}' payload: {err}"
            ))),
            Err(err) => {
                warn!(content_type, codec = codec.name(), error = %err, "payload kept as raw bytes");
                Ok(Payload::Raw(body.clone()))
            }
        }
    }
}

impl<T> Marshaller<T> for BinaryMarshaller
where
    T: Serialize + DeserializeOwned,
{
    fn mode(&self) -> Mode {
        Mode::Binary
    }

    fn marshal(&self, event: &CloudEvent<T>) -> Result<WireMessage> {
        let message = WireMessage {
            headers: self.to_headers(event)?,
            body: self.to_body(event)?,
        };
        log_event(EventDirection::Outbound, Mode::Binary, event);
        Ok(message)
    }

    fn unmarshal(&self, message: &WireMessage) -> Result<CloudEvent<T>> {
        let event = self.from_parts(&message.headers, message.body.as_ref())?;
        log_event(EventDirection::Inbound, Mode::Binary, &event);
        Ok(event)
    }
}
