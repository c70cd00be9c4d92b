//! ---
//! ce_section: "02-envelope-marshalling"
//! ce_subsection: "module"
//! ce_type: "source"
//! ce_scope: "code"
//! ce_description: "CloudEvent envelope, extensions and wire marshallers."
//! ce_version: "v0.0.0-prealpha"
//! ce_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::marshal::binary::HeaderConvention;
use crate::{Error, Result};

fn default_strict_payload() -> bool {
    false
}

/// What to do with keys that are neither core attributes nor registered extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeyPolicy {
    /// Keep them as raw extensions so re-serialization reproduces them.
    #[default]
    Preserve,
    /// Drop them.
    Ignore,
    /// Fail with a format error.
    Reject,
}

/// Tunables shared by the structured and binary marshallers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarshallerConfig {
    /// Handling of keys no parser claims.
    #[serde(default)]
    pub unknown_keys: UnknownKeyPolicy,
    /// Fail instead of falling back to raw bytes when a payload cannot be decoded.
    #[serde(default = "default_strict_payload")]
    pub strict_payload: bool,
    /// Binary-mode header naming.
    #[serde(default)]
    pub headers: HeaderConvention,
}

/// Configuration together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedMarshallerConfig {
    /// Parsed configuration.
    pub config: MarshallerConfig,
    /// File the configuration was read from.
    pub source: PathBuf,
}

impl MarshallerConfig {
    /// Environment variable overriding the configuration path.
    pub const ENV_CONFIG_PATH: &'static str = "CE_MARSHAL_CONFIG";

    /// Load from the first existing candidate, respecting `CE_MARSHAL_CONFIG`.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedMarshallerConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedMarshallerConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedMarshallerConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(Error::Config(format!(
            "no marshaller configuration found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Read and validate a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading marshaller configuration");
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<()> {
        if let HeaderConvention::Custom { prefix } = &self.headers {
            if prefix.trim().is_empty() {
                return Err(Error::Config("custom header prefix must not be empty".into()));
            }
            if prefix.chars().any(char::is_whitespace) {
                return Err(Error::Config(format!(
                    "custom header prefix '{prefix}' must not contain whitespace"
                )));
            }
        }
        Ok(())
    }
}

impl Default for MarshallerConfig {
    fn default() -> Self {
        Self {
            unknown_keys: UnknownKeyPolicy::default(),
            strict_payload: default_strict_payload(),
            headers: HeaderConvention::default(),
        }
    }
}

impl std::str::FromStr for MarshallerConfig {
    type Err = Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: MarshallerConfig = toml::from_str(content)
            .map_err(|err| Error::Config(format!("failed to parse configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }
}
