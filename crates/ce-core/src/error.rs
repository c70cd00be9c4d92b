//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use bytes::Bytes;

use crate::validation::Violation;

/// Shared result type for envelope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the builder and the marshallers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more constraints failed when building an event.
    #[error("{0}")]
    Validation(String),
    /// The wire representation could not be read into the expected shape.
    #[error("format error: {0}")]
    Format(String),
    /// No payload codec exists for the declared content type.
    #[error("unsupported content type '{content_type}' ({} payload bytes retained)", .payload.len())]
    UnsupportedContentType {
        /// Content type declared by the event.
        content_type: String,
        /// Payload bytes that could not be decoded.
        payload: Bytes,
    },
    /// Wrapper for JSON serialization problems of typed payloads.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Marshaller configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
    /// Wrapper for IO errors raised while loading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Aggregate violations into a single validation error.
    pub fn from_violations(violations: &[Violation]) -> Self {
        let joined = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Error::Validation(format!("invalid payload: {joined}"))
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }

    /// Returns true for [`Error::Validation`].
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Returns true for [`Error::Format`].
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}
