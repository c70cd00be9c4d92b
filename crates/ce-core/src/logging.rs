//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use tracing::{debug, Level};
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

use crate::event::CloudEvent;
use crate::marshal::Mode;

/// Initialize a baseline tracing subscriber suitable for development.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Direction of a marshalling operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDirection {
    /// Event → wire.
    Outbound,
    /// Wire → event.
    Inbound,
}

/// Emit a structured debug record for a marshalled event.
pub fn log_event<T>(direction: EventDirection, mode: Mode, event: &CloudEvent<T>) {
    let attrs = event.attributes();
    debug!(
        event_id = %attrs.id(),
        event_type = %attrs.event_type(),
        source = %attrs.source(),
        spec_version = %attrs.spec_version().as_str(),
        extensions = event.extensions().len(),
        mode = %mode,
        direction = ?direction,
        "cloudevent marshalled"
    );
}
