//! Module: config
//! Responsibility: policy knobs for indexing, search paging, deletion, and
//! reification, loadable from TOML.
//! Boundary: connection bootstrapping is the caller's concern; this only
//! describes behavior.

use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config value for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: &'static str,
    },
}

///
/// Config
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Identifier namespace for models that do not declare one.
    pub namespace: String,
    pub indexing: IndexingConfig,
    pub search: SearchConfig,
    pub delete: DeleteConfig,
    pub reify: ReifyConfig,
    pub uri: UriConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "changeme".to_string(),
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
            delete: DeleteConfig::default(),
            reify: ReifyConfig::default(),
            uri: UriConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() || self.namespace.contains(':') {
            return Err(ConfigError::Invalid {
                field: "namespace",
                message: "must be non-empty and contain no ':'",
            });
        }
        if self.search.max_rows == 0 {
            return Err(ConfigError::Invalid {
                field: "search.max_rows",
                message: "must be greater than zero",
            });
        }
        if self.search.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "search.page_size",
                message: "must be greater than zero",
            });
        }
        if self.uri.base.is_empty() {
            return Err(ConfigError::Invalid {
                field: "uri.base",
                message: "must not be empty",
            });
        }

        Ok(())
    }
}

///
/// IndexingConfig
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IndexingConfig {
    /// Index synchronously after a create.
    pub on_create: bool,
    /// Index synchronously after an update.
    pub on_update: bool,
    pub commit: CommitPolicy,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            on_create: true,
            on_update: true,
            commit: CommitPolicy::Immediate,
        }
    }
}

///
/// CommitPolicy
///
/// Consistency window between a successful write and the index reflecting it.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Every index write commits; queries see it immediately.
    #[default]
    Immediate,
    /// Index writes stay pending until `Db::commit_index` runs.
    Deferred,
}

///
/// SearchConfig
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Row cap for relationship queries.
    pub max_rows: usize,
    /// Default batch size for id-list lookups.
    pub page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_rows: 1000,
            page_size: 200,
        }
    }
}

///
/// DeleteConfig
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DeleteConfig {
    /// Abort deletion on the first relationship-removal failure instead of
    /// collecting failures and continuing.
    pub halt_on_relationship_failure: bool,
}

///
/// ReifyConfig
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReifyConfig {
    pub strategy: ReifyStrategy,
}

///
/// ReifyStrategy
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReifyStrategy {
    /// Fetch every hit from storage.
    #[default]
    Fetch,
    /// Build from the profile blob in the document when present.
    Document,
}

///
/// UriConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UriConfig {
    pub base: String,
}

impl Default for UriConfig {
    fn default() -> Self {
        Self {
            base: "info:fedora".to_string(),
        }
    }
}

///
/// TESTS
///
