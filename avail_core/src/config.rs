//! Configuration for the finder, the git provider and the command line tool.
//!
//! Everything has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! platform = "extensions"
//! catalog = "channels.toml"
//!
//! [finder]
//! api_dir = "chrome/common/extensions/api"
//! always_available = ["declarativeWebRequest"]
//!
//! [finder.epochs]
//! api_features = 28
//!
//! [repository]
//! trunk_ref = "refs/heads/main"
//! branch_ref_pattern = "refs/heads/branch-heads/{branch}"
//! ```

use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::{Error, Platform, Result};

const INLINE_SOURCE: &str = "<inline>";
const BRANCH_PLACEHOLDER: &str = "{branch}";

/// First milestone at which each metadata source exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataEpochs {
    /// `_api_features.json`.
    pub api_features: u32,
    /// `_permission_features.json` and `_manifest_features.json`.
    pub permission_features: u32,
    /// One schema file per API.
    pub per_api_schema: u32,
    /// The combined `extension_api.json`.
    pub combined_schema: u32,
}

impl Default for MetadataEpochs {
    fn default() -> Self {
        Self {
            api_features: 28,
            permission_features: 20,
            per_api_schema: 18,
            combined_schema: 5,
        }
    }
}

impl MetadataEpochs {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.api_features < self.permission_features
            || self.permission_features < self.per_api_schema
            || self.per_api_schema < self.combined_schema
        {
            return Err(format!(
                "epochs must not decrease toward newer sources: \
                 combined {}, per-api {}, permission {}, api {}",
                self.combined_schema,
                self.per_api_schema,
                self.permission_features,
                self.api_features
            ));
        }
        Ok(())
    }
}

/// Where the finder looks for metadata and which APIs bypass history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinderConfig {
    /// Directory holding schema and features files.
    pub api_dir: Utf8PathBuf,
    /// Predetermined availability document, read from the trunk snapshot.
    pub availability_overrides: Utf8PathBuf,
    /// APIs reported as trunk without consulting history.
    pub always_available: BTreeSet<String>,
    /// Metadata source epochs.
    pub epochs: MetadataEpochs,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            api_dir: Utf8PathBuf::from("chrome/common/extensions/api"),
            availability_overrides: Utf8PathBuf::from(
                "chrome/common/extensions/docs/templates/json/api_availabilities.json",
            ),
            always_available: BTreeSet::new(),
            epochs: MetadataEpochs::default(),
        }
    }
}

impl FinderConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.api_dir.as_str().is_empty() {
            return Err("finder.api_dir must not be empty".into());
        }
        self.epochs.validate()
    }
}

/// How branches map to git references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Reference holding trunk.
    pub trunk_ref: String,
    /// Reference for a numbered branch; `{branch}` is replaced by its number.
    pub branch_ref_pattern: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            trunk_ref: "refs/heads/main".into(),
            branch_ref_pattern: format!("refs/heads/branch-heads/{BRANCH_PLACEHOLDER}"),
        }
    }
}

impl RepositoryConfig {
    /// Reference name for a numbered branch.
    #[must_use]
    pub fn branch_ref(&self, branch: u32) -> String {
        self.branch_ref_pattern
            .replace(BRANCH_PLACEHOLDER, &branch.to_string())
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.branch_ref_pattern.contains(BRANCH_PLACEHOLDER) {
            return Err(format!(
                "repository.branch_ref_pattern must contain {BRANCH_PLACEHOLDER}"
            ));
        }
        if self.trunk_ref.is_empty() {
            return Err("repository.trunk_ref must not be empty".into());
        }
        Ok(())
    }
}

/// Top-level configuration file of the command line tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Platform whose feature entries apply.
    pub platform: Platform,
    /// Channel catalog file, relative to the configuration file.
    pub catalog: Option<Utf8PathBuf>,
    /// Finder settings.
    pub finder: FinderConfig,
    /// Git provider settings.
    pub repository: RepositoryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Extensions,
            catalog: None,
            finder: FinderConfig::default(),
            repository: RepositoryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unparsable documents, unknown keys, or
    /// invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::parse(text, INLINE_SOURCE)
    }

    /// Load a configuration file. A relative `catalog` path is resolved
    /// against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it is invalid.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;
        let mut config = Self::parse(&text, path.as_str())?;
        if let (Some(catalog), Some(parent)) = (config.catalog.as_mut(), path.parent()) {
            if catalog.is_relative() {
                *catalog = parent.join(&*catalog);
            }
        }
        Ok(config)
    }

    fn parse(text: &str, source: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| Error::Config {
            path: source.to_owned(),
            message: err.to_string(),
        })?;
        config
            .finder
            .validate()
            .and_then(|()| config.repository.validate())
            .map_err(|message| Error::Config {
                path: source.to_owned(),
                message,
            })?;
        Ok(config)
    }
}
