//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
//! Content-type specific payload codecs used by binary mode.
//!
//! Typed payloads are bridged through [`serde_json::Value`], which keeps the
//! codec trait object safe while callers keep their own payload types.
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Encoder/decoder for one family of media types.
pub trait PayloadCodec: fmt::Debug + Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;
    /// Whether the codec handles `media_type` (lower-cased, parameters stripped).
    fn accepts(&self, media_type: &str) -> bool;
    /// Encode a payload value into body bytes.
    fn encode(&self, value: &JsonValue) -> Result<Bytes>;
    /// Decode body bytes into a payload value.
    fn decode(&self, body: &[u8]) -> Result<JsonValue>;
}

/// `application/json`, `text/json` and any `+json` suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn accepts(&self, media_type: &str) -> bool {
        media_type == "application/json" || media_type == "text/json" || media_type.ends_with("+json")
    }

    fn encode(&self, value: &JsonValue) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn decode(&self, body: &[u8]) -> Result<JsonValue> {
        serde_json::from_slice(body).map_err(|err| Error::format(format!("invalid JSON payload: {err}")))
    }
}

/// Any `text/*` media type; the payload value must be a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl PayloadCodec for TextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn accepts(&self, media_type: &str) -> bool {
        media_type.starts_with("text/")
    }

    fn encode(&self, value: &JsonValue) -> Result<Bytes> {
        match value {
            JsonValue::String(text) => Ok(Bytes::from(text.clone().into_bytes())),
            other => Err(Error::format(format!(
                "text payload must be a string, found {}",
                json_kind(other)
            ))),
        }
    }

    fn decode(&self, body: &[u8]) -> Result<JsonValue> {
        std::str::from_utf8(body)
            .map(|text| JsonValue::String(text.to_owned()))
            .map_err(|err| Error::format(format!("text payload is not UTF-8: {err}")))
    }
}

/// Ordered list of codecs; the first accepting codec wins.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn PayloadCodec>>,
}

impl CodecRegistry {
    /// Registry without any codec; every payload stays raw.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Append a codec.
    pub fn register<C>(mut self, codec: C) -> Self
    where
        C: PayloadCodec + 'static,
    {
        self.codecs.push(Arc::new(codec));
        self
    }

    /// Codec accepting `content_type`, if any.
    pub fn find(&self, content_type: &str) -> Option<&Arc<dyn PayloadCodec>> {
        let essence = media_type_essence(content_type);
        self.codecs.iter().find(|codec| codec.accepts(&essence))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::empty().register(JsonCodec).register(TextCodec)
    }
}

/// Lower-cased media type with parameters removed.
pub fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_parameters_and_case() {
        let codecs = CodecRegistry::default();
        assert_eq!(codecs.find("Application/JSON; charset=utf-8").unwrap().name(), "json");
        assert_eq!(codecs.find("application/cloudevents+json").unwrap().name(), "json");
        assert_eq!(codecs.find("text/plain").unwrap().name(), "text");
        assert!(codecs.find("application/avro").is_none());
    }

    #[test]
    fn text_codec_requires_strings() {
        assert_eq!(
            TextCodec.encode(&JsonValue::from("hello")).unwrap(),
            Bytes::from_static(b"hello")
        );
        assert!(TextCodec.encode(&serde_json::json!({"a": 1})).is_err());
        assert!(TextCodec.decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn json_codec_reports_malformed_bodies() {
        let err = JsonCodec.decode(b"{not json").unwrap_err();
        assert!(err.is_format());
    }
}
