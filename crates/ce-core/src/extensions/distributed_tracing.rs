//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::{ExtensionFormat, ExtensionParser};
use crate::{Error, Result};

/// Registered name of the distributed tracing extension.
pub const NAME: &str = "distributedTracing";
/// W3C trace parent key.
pub const TRACEPARENT: &str = "traceparent";
/// W3C trace state key.
pub const TRACESTATE: &str = "tracestate";

/// W3C trace context carried alongside an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedTracing {
    /// Trace parent header value.
    pub traceparent: String,
    /// Vendor-specific trace state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracestate: Option<String>,
}

impl DistributedTracing {
    /// Tracing context with only a trace parent.
    pub fn new(traceparent: impl Into<String>) -> Self {
        Self {
            traceparent: traceparent.into(),
            tracestate: None,
        }
    }

    /// Attach vendor trace state.
    pub fn with_tracestate(mut self, tracestate: impl Into<String>) -> Self {
        self.tracestate = Some(tracestate.into());
        self
    }
}

impl ExtensionFormat for DistributedTracing {
    fn name(&self) -> &str {
        NAME
    }

    fn to_binary(&self) -> IndexMap<String, String> {
        let mut pairs = IndexMap::new();
        pairs.insert(TRACEPARENT.to_owned(), self.traceparent.clone());
        if let Some(state) = &self.tracestate {
            pairs.insert(TRACESTATE.to_owned(), state.clone());
        }
        pairs
    }

    fn to_structured(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert(TRACEPARENT.to_owned(), JsonValue::from(self.traceparent.as_str()));
        if let Some(state) = &self.tracestate {
            map.insert(TRACESTATE.to_owned(), JsonValue::from(state.as_str()));
        }
        JsonValue::Object(map)
    }
}

/// Parser for [`DistributedTracing`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributedTracingParser;

impl ExtensionParser for DistributedTracingParser {
    fn name(&self) -> &str {
        NAME
    }

    fn binary_keys(&self) -> &[&'static str] {
        &[TRACEPARENT, TRACESTATE]
    }

    fn from_structured(&self, value: &JsonValue) -> Result<Arc<dyn ExtensionFormat>> {
        let tracing: DistributedTracing = serde_json::from_value(value.clone())
            .map_err(|err| Error::format(format!("invalid '{NAME}' extension: {err}")))?;
        Ok(Arc::new(tracing))
    }

    fn from_binary(&self, pairs: &IndexMap<String, String>) -> Result<Arc<dyn ExtensionFormat>> {
        let traceparent = pairs
            .get(TRACEPARENT)
            .ok_or_else(|| Error::format(format!("'{TRACESTATE}' present without '{TRACEPARENT}'")))?;
        Ok(Arc::new(DistributedTracing {
            traceparent: traceparent.clone(),
            tracestate: pairs.get(TRACESTATE).cloned(),
        }))
    }
}
