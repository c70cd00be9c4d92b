//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
//! Structured mode: the whole event as one JSON document.
//!
//! Keys are emitted as `data`, `id`, `source`, `specversion`, `type`, the
//! present optional attributes (`datacontenttype`, `subject`, schema, `time`)
//! and finally one entry per extension. Absent values are left out rather
//! than written as `null`.
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use super::{
    assemble, format_time, parse_spec_version, unknown_key, Marshaller, Mode, Payload,
    RawAttributes, WireMessage, CONTENT_TYPE_HEADER, STRUCTURED_CONTENT_TYPE,
};
use crate::codec::json_kind;
use crate::config::MarshallerConfig;
use crate::event::CloudEvent;
use crate::extensions::{ExtensionFormat, ExtensionRegistry};
use crate::logging::{log_event, EventDirection};
use crate::version::{names, SpecVersion};
use crate::{Error, Result};

const BASE64_ENCODING: &str = "base64";

/// Marshaller for structured-mode documents.
#[derive(Debug, Clone, Default)]
pub struct StructuredMarshaller {
    registry: ExtensionRegistry,
    config: MarshallerConfig,
}

impl StructuredMarshaller {
    /// Marshaller with the default extension registry and configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `registry` to recognise extensions.
    pub fn with_registry(mut self, registry: ExtensionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: MarshallerConfig) -> Self {
        self.config = config;
        self
    }

    /// Render the event as an ordered JSON object.
    pub fn to_document<T: Serialize>(&self, event: &CloudEvent<T>) -> Result<Map<String, JsonValue>> {
        let attrs = event.attributes();
        let version = attrs.spec_version();
        let mut doc = Map::new();
        let mut encoded_raw = false;

        match (event.data(), event.data_base64()) {
            (Some(data), _) => {
                let value = serde_json::to_value(data)?;
                if !value.is_null() {
                    doc.insert(names::DATA.to_owned(), value);
                }
            }
            (None, Some(raw)) => {
                let encoded = JsonValue::String(BASE64.encode(raw));
                match version {
                    SpecVersion::V10 => {
                        doc.insert(names::DATA_BASE64.to_owned(), encoded);
                    }
                    SpecVersion::V03 => {
                        doc.insert(names::DATA.to_owned(), encoded);
                        encoded_raw = true;
                    }
                }
            }
            (None, None) => {}
        }

        doc.insert(names::ID.to_owned(), attrs.id().into());
        doc.insert(names::SOURCE.to_owned(), attrs.source().into());
        doc.insert(names::SPEC_VERSION.to_owned(), version.as_str().into());
        doc.insert(names::TYPE.to_owned(), attrs.event_type().into());
        if let Some(content_type) = attrs.data_content_type() {
            doc.insert(names::DATA_CONTENT_TYPE.to_owned(), content_type.into());
        }
        if encoded_raw {
            doc.insert(names::DATA_CONTENT_ENCODING.to_owned(), BASE64_ENCODING.into());
        }
        if let Some(subject) = attrs.subject() {
            doc.insert(names::SUBJECT.to_owned(), subject.into());
        }
        if let Some(schema) = attrs.data_schema() {
            doc.insert(version.schema_key().to_owned(), schema.into());
        }
        if let Some(time) = attrs.time() {
            doc.insert(names::TIME.to_owned(), format_time(time).into());
        }
        for extension in event.extensions().iter() {
            doc.insert(extension.name().to_owned(), extension.to_structured());
        }
        Ok(doc)
    }

    /// Render the event as a compact JSON string.
    pub fn to_json_string<T: Serialize>(&self, event: &CloudEvent<T>) -> Result<String> {
        Ok(serde_json::to_string(&self.to_document(event)?)?)
    }

    /// Render the event as compact JSON bytes.
    pub fn to_vec<T: Serialize>(&self, event: &CloudEvent<T>) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_document(event)?)?)
    }

    /// Parse a JSON document into an event.
    pub fn from_slice<T: DeserializeOwned>(&self, document: &[u8]) -> Result<CloudEvent<T>> {
        let value: JsonValue = serde_json::from_slice(document)
            .map_err(|err| Error::format(format!("malformed document: {err}")))?;
        match value {
            JsonValue::Object(map) => self.from_document(map),
            other => Err(Error::format(format!(
                "structured document must be an object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Read an already parsed document.
    pub fn from_document<T: DeserializeOwned>(
        &self,
        mut doc: Map<String, JsonValue>,
    ) -> Result<CloudEvent<T>> {
        let spec_version = match doc.remove(names::SPEC_VERSION) {
            Some(value) => Some(expect_string(names::SPEC_VERSION, value)?),
            None => None,
        };
        let version = parse_spec_version(spec_version.as_deref())?;

        let mut attributes = RawAttributes::default();
        let mut data = None;
        let mut data_base64 = None;
        let mut encoding = None;
        let mut extensions: Vec<Arc<dyn ExtensionFormat>> = Vec::new();

        for (key, value) in doc {
            // An explicit null payload is the same as no payload.
            if key == names::DATA {
                data = Some(value).filter(|value| !value.is_null());
                continue;
            }
            if version == SpecVersion::V10 && key == names::DATA_BASE64 {
                if !value.is_null() {
                    data_base64 = Some(expect_string(&key, value)?);
                }
                continue;
            }
            if version == SpecVersion::V03 && key == names::DATA_CONTENT_ENCODING {
                encoding = Some(expect_string(&key, value)?);
                continue;
            }
            if let Some(slot) = attributes.slot_mut(&key, version) {
                *slot = Some(expect_string(&key, value)?);
                continue;
            }
            match self.registry.get(&key) {
                Some(parser) => extensions.push(parser.from_structured(&value)?),
                None => {
                    if let Some(raw) = unknown_key(self.config.unknown_keys, key, value)? {
                        extensions.push(raw);
                    }
                }
            }
        }

        let payload = match (data, data_base64, encoding) {
            (Some(value), _, Some(encoding)) => {
                if !encoding.eq_ignore_ascii_case(BASE64_ENCODING) {
                    return Err(Error::format(format!(
                        "unsupported {} '{encoding}'",
                        names::DATA_CONTENT_ENCODING
                    )));
                }
                let text = expect_string(names::DATA, value)?;
                Some(Payload::Raw(decode_base64(names::DATA, &text)?))
            }
            (Some(value), _, None) => Some(self.typed_payload(value)?),
            (None, Some(text), _) => Some(Payload::Raw(decode_base64(names::DATA_BASE64, &text)?)),
            (None, None, _) => None,
        };

        let event = assemble(attributes.into_builder(version)?, payload, extensions)?;
        log_event(EventDirection::Inbound, Mode::Structured, &event);
        Ok(event)
    }

    fn typed_payload<T: DeserializeOwned>(&self, value: JsonValue) -> Result<Payload<T>> {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(data) => Ok(Payload::Typed(data)),
            Err(err) if self.config.strict_payload => Err(Error::format(format!(
                "'{}' does not match the expected payload type: {err}",
                names::DATA
            ))),
            Err(err) => {
                warn!(error = %err, "payload kept as raw bytes");
                let raw = match value {
                    JsonValue::String(text) => Bytes::from(text.into_bytes()),
                    other => Bytes::from(serde_json::to_vec(&other)?),
                };
                Ok(Payload::Raw(raw))
            }
        }
    }
}

impl<T> Marshaller<T> for StructuredMarshaller
where
    T: Serialize + DeserializeOwned,
{
    fn mode(&self) -> Mode {
        Mode::Structured
    }

    fn marshal(&self, event: &CloudEvent<T>) -> Result<WireMessage> {
        let body = self.to_vec(event)?;
        let mut message = WireMessage::default();
        message
            .headers
            .insert(CONTENT_TYPE_HEADER.to_owned(), STRUCTURED_CONTENT_TYPE.to_owned());
        message.body = Some(Bytes::from(body));
        log_event(EventDirection::Outbound, Mode::Structured, event);
        Ok(message)
    }

    fn unmarshal(&self, message: &WireMessage) -> Result<CloudEvent<T>> {
        let body = message
            .body
            .as_ref()
            .ok_or_else(|| Error::format("structured message without a body"))?;
        self.from_slice(body)
    }
}

fn expect_string(key: &str, value: JsonValue) -> Result<String> {
    match value {
        JsonValue::String(text) => Ok(text),
        other => Err(Error::format(format!(
            "'{key}' must be a string, found {}",
            json_kind(&other)
        ))),
    }
}

fn decode_base64(key: &str, text: &str) -> Result<Bytes> {
    BASE64
        .decode(text)
        .map(Bytes::from)
        .map_err(|err| Error::format(format!("'{key}' is not valid base64: {err}")))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::builder::CloudEventBuilder;
    use crate::config::UnknownKeyPolicy;
    use crate::extensions::{DistributedTracing, RawExtension};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Much {
        wow: String,
    }

    fn base(version: SpecVersion) -> CloudEventBuilder<Much> {
        CloudEventBuilder::new()
            .with_spec_version(version)
            .with_id("x10")
            .with_source("/source")
            .with_type("event-type")
            .with_data_content_type("application/json")
    }

    #[test]
    fn data_comes_first_and_optionals_follow_declaration_order() {
        let event = base(SpecVersion::V03)
            .with_subject("subject")
            .with_data(Much { wow: "nice!".into() })
            .build()
            .unwrap();
        let json = StructuredMarshaller::new().to_json_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"data":{"wow":"nice!"},"id":"x10","source":"/source","specversion":"0.3","type":"event-type","datacontenttype":"application/json","subject":"subject"}"#
        );
    }

    #[test]
    fn absent_values_are_omitted() {
        let event = base(SpecVersion::V10).build().unwrap();
        let json = StructuredMarshaller::new().to_json_string(&event).unwrap();
        insta::assert_snapshot!(json, @r#"{"id":"x10","source":"/source","specversion":"1.0","type":"event-type","datacontenttype":"application/json"}"#);
    }

    #[test]
    fn raw_payload_uses_version_specific_keys() {
        let v1 = base(SpecVersion::V10)
            .with_data_base64(&b"hello"[..])
            .build()
            .unwrap();
        let doc = StructuredMarshaller::new().to_document(&v1).unwrap();
        assert_eq!(doc["data_base64"], "aGVsbG8=");
        assert!(!doc.contains_key("data"));

        let v03 = base(SpecVersion::V03)
            .with_data_base64(&b"hello"[..])
            .build()
            .unwrap();
        let doc = StructuredMarshaller::new().to_document(&v03).unwrap();
        assert_eq!(doc["data"], "aGVsbG8=");
        assert_eq!(doc["datacontentencoding"], "base64");

        for event in [v1, v03] {
            let marshaller = StructuredMarshaller::new();
            let bytes = marshaller.to_vec(&event).unwrap();
            let back: CloudEvent<Much> = marshaller.from_slice(&bytes).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn extensions_roundtrip_through_registry() {
        let event = base(SpecVersion::V10)
            .with_extension(DistributedTracing::new("0").with_tracestate("congo=4"))
            .with_data(Much { wow: "nice!".into() })
            .build()
            .unwrap();
        let marshaller = StructuredMarshaller::new();
        let json = marshaller.to_json_string(&event).unwrap();
        assert!(json.ends_with(r#""distributedTracing":{"traceparent":"0","tracestate":"congo=4"}}"#));

        let back: CloudEvent<Much> = marshaller.from_slice(json.as_bytes()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn unknown_keys_follow_policy() {
        let doc = br#"{"id":"1","source":"/s","specversion":"1.0","type":"t","comexample":"v"}"#;

        let preserved: CloudEvent<Much> = StructuredMarshaller::new().from_slice(doc).unwrap();
        let ext = preserved.extension("comexample").expect("preserved");
        assert_eq!(ext.to_structured(), JsonValue::from("v"));
        let again = StructuredMarshaller::new().to_json_string(&preserved).unwrap();
        assert!(again.ends_with(r#""comexample":"v"}"#));

        let ignoring = StructuredMarshaller::new().with_config(MarshallerConfig {
            unknown_keys: UnknownKeyPolicy::Ignore,
            ..MarshallerConfig::default()
        });
        let ignored: CloudEvent<Much> = ignoring.from_slice(doc).unwrap();
        assert!(ignored.extensions().is_empty());

        let rejecting = StructuredMarshaller::new().with_config(MarshallerConfig {
            unknown_keys: UnknownKeyPolicy::Reject,
            ..MarshallerConfig::default()
        });
        assert!(rejecting.from_slice::<Much>(doc).unwrap_err().is_format());
    }

    #[test]
    fn missing_required_attribute_is_a_validation_error() {
        let err = StructuredMarshaller::new()
            .from_slice::<Much>(br#"{"source":"/s","specversion":"1.0","type":"t"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid payload: 'id' must not be blank");
    }

    #[test]
    fn malformed_documents_are_format_errors() {
        let marshaller = StructuredMarshaller::new();
        assert!(marshaller.from_slice::<Much>(b"{").unwrap_err().is_format());
        assert!(marshaller.from_slice::<Much>(b"[1,2]").unwrap_err().is_format());
        assert!(marshaller
            .from_slice::<Much>(br#"{"id":7,"source":"/s","specversion":"1.0","type":"t"}"#)
            .unwrap_err()
            .is_format());
    }

    #[test]
    fn mismatched_payload_falls_back_unless_strict() {
        let doc = br#"{"data":[1,2],"id":"1","source":"/s","specversion":"1.0","type":"t"}"#;
        let lenient: CloudEvent<Much> = StructuredMarshaller::new().from_slice(doc).unwrap();
        assert!(lenient.data().is_none());
        assert_eq!(lenient.data_base64().unwrap().as_ref(), b"[1,2]");

        let strict = StructuredMarshaller::new().with_config(MarshallerConfig {
            strict_payload: true,
            ..MarshallerConfig::default()
        });
        assert!(strict.from_slice::<Much>(doc).unwrap_err().is_format());
    }

    #[test]
    fn null_payload_is_no_payload() {
        let marshaller = StructuredMarshaller::new();
        for doc in [
            &br#"{"data":null,"id":"1","source":"/s","specversion":"1.0","type":"t"}"#[..],
            &br#"{"data_base64":null,"id":"1","source":"/s","specversion":"1.0","type":"t"}"#[..],
        ] {
            let event: CloudEvent<Much> = marshaller.from_slice(doc).unwrap();
            assert!(event.data().is_none());
            assert!(event.data_base64().is_none());
            assert_eq!(
                marshaller.to_json_string(&event).unwrap(),
                r#"{"id":"1","source":"/s","specversion":"1.0","type":"t"}"#
            );
        }
    }

    #[test]
    fn shadowing_raw_extension_is_rejected_at_build() {
        let err = base(SpecVersion::V10)
            .with_extension(RawExtension::new("subject", JsonValue::from("x")))
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }
}
