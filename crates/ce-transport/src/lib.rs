//! ---
//! ce_section: "03-transport-binding"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "Transport binding between marshallers and broker clients."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
//! Glue between [`ce_core::Marshaller`] implementations and transport clients.
//!
//! The binding only transforms: it marshals an event into a
//! [`TransportRecord`] and hands it to a [`TransportClient`], or pulls a record
//! and unmarshals it. Delivery, retries and acknowledgement stay with the
//! client.
#![warn(missing_docs)]

use thiserror::Error;

pub mod binding;
pub mod client;
pub mod metrics;

pub use binding::{CloudEventConsumer, CloudEventProducer};
pub use client::{BrokerError, InMemoryBroker, RecordMetadata, TransportClient, TransportRecord};
pub use metrics::BindingMetricsExporter;

/// Error type for binding operations.
#[derive(Debug, Error)]
pub enum BindingError {
    /// The event could not be marshalled or the record could not be unmarshalled.
    #[error(transparent)]
    Event(#[from] ce_core::Error),
    /// The underlying client rejected the record.
    #[error("transport client '{client}' failed: {source}")]
    Client {
        /// Name reported by the client.
        client: &'static str,
        /// Client error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BindingError {
    pub(crate) fn client<E>(client: &'static str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Client {
            client,
            source: Box::new(err),
        }
    }
}

/// Result alias for binding operations.
pub type Result<T> = std::result::Result<T, BindingError>;
