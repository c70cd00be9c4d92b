//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
//! Extension formats.
//!
//! An extension renders itself in two shapes: flat string pairs for binary
//! mode and a single nested value for structured mode, keyed by its name.
//! Parsing goes the other way through an [`ExtensionParser`] looked up by
//! name in an [`ExtensionRegistry`], so new kinds never touch the marshallers.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::Result;

pub mod distributed_tracing;
pub mod partitioning;
pub mod raw;

pub use distributed_tracing::{DistributedTracing, DistributedTracingParser};
pub use partitioning::{Partitioning, PartitioningParser};
pub use raw::RawExtension;

/// Capability implemented by every extension attached to an event.
pub trait ExtensionFormat: fmt::Debug + Send + Sync {
    /// Registered extension name, used as the structured-mode key.
    fn name(&self) -> &str;
    /// Flat key/value pairs carried as binary-mode metadata.
    fn to_binary(&self) -> IndexMap<String, String>;
    /// Nested value carried under [`ExtensionFormat::name`] in structured mode.
    fn to_structured(&self) -> JsonValue;
}

/// Reconstructs one extension kind from either wire shape.
pub trait ExtensionParser: Send + Sync {
    /// Name of the extension kind this parser handles.
    fn name(&self) -> &str;
    /// Binary-mode keys owned by this extension kind.
    fn binary_keys(&self) -> &[&'static str];
    /// Parse the nested structured-mode value.
    fn from_structured(&self, value: &JsonValue) -> Result<Arc<dyn ExtensionFormat>>;
    /// Parse the binary-mode pairs; only keys from [`ExtensionParser::binary_keys`] are passed.
    fn from_binary(&self, pairs: &IndexMap<String, String>) -> Result<Arc<dyn ExtensionFormat>>;
}

/// Extensions attached to an event, unique by name.
///
/// Iteration follows insertion order; equality ignores it.
#[derive(Clone, Default)]
pub struct ExtensionSet {
    entries: IndexMap<String, Arc<dyn ExtensionFormat>>,
}

impl ExtensionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an extension, replacing any previous one with the same name.
    pub fn insert(&mut self, extension: Arc<dyn ExtensionFormat>) {
        self.entries.insert(extension.name().to_owned(), extension);
    }

    /// Look up an extension by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExtensionFormat>> {
        self.entries.get(name)
    }

    /// Returns true if an extension with `name` is attached.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over attached extensions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ExtensionFormat>> {
        self.entries.values()
    }

    /// Names of the attached extensions.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of attached extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no extension is attached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for ExtensionSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.entries.iter().all(|(name, ext)| {
                other
                    .get(name)
                    .is_some_and(|theirs| theirs.to_structured() == ext.to_structured())
            })
    }
}

impl fmt::Debug for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, ext)| (name, ext.to_structured())))
            .finish()
    }
}

impl FromIterator<Arc<dyn ExtensionFormat>> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn ExtensionFormat>>>(iter: I) -> Self {
        let mut set = ExtensionSet::new();
        for extension in iter {
            set.insert(extension);
        }
        set
    }
}

/// Name-indexed parsers handed to the marshallers.
#[derive(Clone)]
pub struct ExtensionRegistry {
    parsers: IndexMap<String, Arc<dyn ExtensionParser>>,
}

impl ExtensionRegistry {
    /// Registry without any parser; every extension is treated as unknown.
    pub fn empty() -> Self {
        Self {
            parsers: IndexMap::new(),
        }
    }

    /// Register a parser, replacing any parser with the same name.
    pub fn register<P>(mut self, parser: P) -> Self
    where
        P: ExtensionParser + 'static,
    {
        self.parsers
            .insert(parser.name().to_owned(), Arc::new(parser) as Arc<dyn ExtensionParser>);
        self
    }

    /// Look up a parser by extension name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExtensionParser>> {
        self.parsers.get(name)
    }

    /// Names of all registered extension kinds.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }

    /// Returns true when `key` belongs to a registered extension in binary mode.
    pub fn owns_binary_key(&self, key: &str) -> bool {
        self.parsers
            .values()
            .any(|parser| parser.binary_keys().contains(&key))
    }

    /// Pull every registered extension out of flat binary metadata.
    ///
    /// Consumed keys are removed from `remaining`; whatever is left belongs to
    /// no registered kind.
    pub fn parse_binary(
        &self,
        remaining: &mut IndexMap<String, String>,
    ) -> Result<Vec<Arc<dyn ExtensionFormat>>> {
        let mut parsed = Vec::new();
        for parser in self.parsers.values() {
            let pairs: IndexMap<String, String> = parser
                .binary_keys()
                .iter()
                .filter_map(|key| remaining.shift_remove_entry(*key))
                .collect();
            if pairs.is_empty() {
                continue;
            }
            parsed.push(parser.from_binary(&pairs)?);
        }
        Ok(parsed)
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::empty()
            .register(DistributedTracingParser)
            .register(PartitioningParser)
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.parsers.keys()).finish()
    }
}
