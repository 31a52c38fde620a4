//! Configure import map loading.

use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Base URL used when none is configured.
const DEFAULT_BASE_URL: &str = "file:///";

/// Script type of import map declarations recognized by default.
const DEFAULT_MAP_TYPE: &str = "systemjs-importmap";

/// List of configuration errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Relative URLs cannot be resolved against the base URL.
    #[error("`base_url` must be a hierarchical URL, received `{base_url}`")]
    BaseUrl {
        /// Configured base URL.
        base_url: Url,
    },
    /// No script type is configured.
    #[error("`map_types` must not be empty")]
    NoMapTypes,
    /// A script type cannot be matched in HTML documents.
    #[error("invalid script type {map_type:?} in `map_types`")]
    MapType {
        /// Configured script type.
        map_type: String,
    },
}

/// Configuration for import map loading.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the host document.
    ///
    /// Inline import maps, relative external declarations, and imports
    /// without referrer are resolved against it.
    pub base_url: Url,

    /// Script types of import map declarations.
    pub map_types: Vec<String>,

    /// Start retrieving external import maps as soon as they are declared.
    ///
    /// If set to `false`, retrieval starts on the first import.
    pub prefetch: bool,

    /// Emit cache-warming hints for the `depcache` table.
    pub preload: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL must be valid"),
            map_types: vec![DEFAULT_MAP_TYPE.to_owned()],
            prefetch: true,
            preload: true,
        }
    }
}

impl Config {
    /// Create a configuration with given base URL.
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            ..Default::default()
        }
    }

    /// Load a configuration from JSON code.
    ///
    /// Missing fields take their default value.
    pub fn from_json(input: impl AsRef<str>) -> Result<Self> {
        let config: Self = serde_json::from_str(input.as_ref())?;

        config.check()?;

        Ok(config)
    }

    /// Check if configuration is valid.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.base_url.cannot_be_a_base() {
            return Err(ConfigError::BaseUrl {
                base_url: self.base_url.clone(),
            });
        }

        if self.map_types.is_empty() {
            return Err(ConfigError::NoMapTypes);
        }

        if let Some(map_type) = self
            .map_types
            .iter()
            .find(|map_type| map_type.is_empty() || map_type.contains(['"', '\\']))
        {
            return Err(ConfigError::MapType {
                map_type: map_type.to_owned(),
            });
        }

        Ok(())
    }
}
