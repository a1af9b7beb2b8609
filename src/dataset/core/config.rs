//! Configuration for the dataset builder.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::core::errors::{DatasetError, DatasetResult};

/// System message used when a submission omits the field entirely.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// Default backing document.
pub const DEFAULT_DATA_FILE: &str = "conversations.jsonl";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Form handling settings.
    pub form: FormConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl DatasetConfig {
    /// Build the default configuration and apply `DATASET_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_env() -> DatasetResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> DatasetResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("DATASET_FILE") {
            config.storage.data_file = PathBuf::from(path);
        }
        if let Some(policy) = lookup("DATASET_LOAD_POLICY") {
            config.storage.load_policy = policy.parse()?;
        }
        if let Some(policy) = lookup("DATASET_WEIGHT_POLICY") {
            config.form.weight_policy = policy.parse()?;
        }
        if let Some(message) = lookup("DATASET_DEFAULT_SYSTEM_MESSAGE") {
            config.form.default_system_message = message;
        }
        if let Some(port) = lookup("DATASET_PORT") {
            config.server.port = port.trim().parse().map_err(|_| {
                DatasetError::InvalidConfig(format!("DATASET_PORT is not a port: {port}"))
            })?;
        }
        if let Some(dir) = lookup("DATASET_STATIC_DIR") {
            config.server.static_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> DatasetResult<()> {
        if self.storage.data_file.as_os_str().is_empty() {
            return Err(DatasetError::InvalidConfig(
                "storage.data_file must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(DatasetError::InvalidConfig(
                "server.port must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// What to do with lines of the backing document that fail to parse.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Any bad line discards the whole document and the store starts empty.
    #[default]
    Strict,
    /// Bad lines are logged and skipped; good lines are kept.
    SkipInvalid,
}

impl LoadPolicy {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::SkipInvalid => "skip_invalid",
        }
    }
}

impl fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LoadPolicy {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "strict" => Ok(Self::Strict),
            "skip_invalid" => Ok(Self::SkipInvalid),
            other => Err(DatasetError::InvalidConfig(format!(
                "unknown load policy: {other}"
            ))),
        }
    }
}

/// How the weight field of a submitted pair is turned into a number.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Decimal digits parse as the weight; anything else becomes 1.
    #[default]
    Integer,
    /// A checked box (`on`, `true`, `1`) is 1; anything else is 0.
    Checkbox,
}

impl WeightPolicy {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Checkbox => "checkbox",
        }
    }
}

impl fmt::Display for WeightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WeightPolicy {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "integer" => Ok(Self::Integer),
            "checkbox" => Ok(Self::Checkbox),
            other => Err(DatasetError::InvalidConfig(format!(
                "unknown weight policy: {other}"
            ))),
        }
    }
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Line-delimited JSON backing document.
    pub data_file: PathBuf,
    /// Policy applied to unparseable lines on load.
    pub load_policy: LoadPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            load_policy: LoadPolicy::default(),
        }
    }
}

/// Form handling configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormConfig {
    /// System message used when a submission leaves the field out.
    pub default_system_message: String,
    /// Weight coercion policy.
    pub weight_policy: WeightPolicy,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            default_system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            weight_policy: WeightPolicy::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Directory served for the front-end.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = DatasetConfig::default();
        assert_eq!(config.storage.data_file, PathBuf::from("conversations.jsonl"));
        assert_eq!(config.storage.load_policy, LoadPolicy::Strict);
        assert_eq!(config.form.weight_policy, WeightPolicy::Integer);
        assert_eq!(config.form.default_system_message, "You are a helpful assistant.");
        assert_eq!(config.server.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = DatasetConfig::from_lookup(lookup_from(&[
            ("DATASET_FILE", "/tmp/data.jsonl"),
            ("DATASET_LOAD_POLICY", "skip_invalid"),
            ("DATASET_WEIGHT_POLICY", "checkbox"),
            ("DATASET_PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.storage.data_file, PathBuf::from("/tmp/data.jsonl"));
        assert_eq!(config.storage.load_policy, LoadPolicy::SkipInvalid);
        assert_eq!(config.form.weight_policy, WeightPolicy::Checkbox);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_overrides() {
        assert!(DatasetConfig::from_lookup(lookup_from(&[("DATASET_PORT", "http")])).is_err());
        assert!(DatasetConfig::from_lookup(lookup_from(&[("DATASET_PORT", "0")])).is_err());
        assert!(DatasetConfig::from_lookup(lookup_from(&[("DATASET_FILE", "")])).is_err());
        assert!(
            DatasetConfig::from_lookup(lookup_from(&[("DATASET_LOAD_POLICY", "lenient")]))
                .is_err()
        );
    }
}
