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
use serde_json::{Map, Value as JsonValue};

use super::{ExtensionFormat, ExtensionParser};
use crate::{Error, Result};

/// Registered name of the partitioning extension.
pub const NAME: &str = "partitioning";
/// Key carrying the partition key.
pub const PARTITION_KEY: &str = "partitionkey";

/// Partition key used by brokers to keep related events ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partitioning {
    key: String,
}

impl Partitioning {
    /// Partitioning extension for `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Partition key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl ExtensionFormat for Partitioning {
    fn name(&self) -> &str {
        NAME
    }

    fn to_binary(&self) -> IndexMap<String, String> {
        IndexMap::from([(PARTITION_KEY.to_owned(), self.key.clone())])
    }

    fn to_structured(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert(PARTITION_KEY.to_owned(), JsonValue::from(self.key.as_str()));
        JsonValue::Object(map)
    }
}

/// Parser for [`Partitioning`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitioningParser;

impl ExtensionParser for PartitioningParser {
    fn name(&self) -> &str {
        NAME
    }

    fn binary_keys(&self) -> &[&'static str] {
        &[PARTITION_KEY]
    }

    fn from_structured(&self, value: &JsonValue) -> Result<Arc<dyn ExtensionFormat>> {
        let key = value
            .get(PARTITION_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::format(format!("'{NAME}' requires a string '{PARTITION_KEY}'")))?;
        Ok(Arc::new(Partitioning::new(key)))
    }

    fn from_binary(&self, pairs: &IndexMap<String, String>) -> Result<Arc<dyn ExtensionFormat>> {
        let key = pairs
            .get(PARTITION_KEY)
            .ok_or_else(|| Error::format(format!("missing '{PARTITION_KEY}'")))?;
        Ok(Arc::new(Partitioning::new(key.as_str())))
    }
}
