//! Runtime settings: where the model artifacts and the reference dataset live,
//! and the input values a fresh session starts from.

use crate::input::{InputError, validate_amount, validate_hour};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "cardguard.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid default input in settings: {0}")]
    InvalidDefault(#[from] InputError),
}

/// Starting values for the hour and amount inputs, also used by "clear".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputDefaults {
    pub hour: u32,
    pub amount: f64,
}

impl Default for InputDefaults {
    fn default() -> Self {
        Self {
            hour: 12,
            amount: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Model scoring reconstructed (hour, amount) vectors.
    pub model_path: PathBuf,
    /// Model scoring raw 29-value vectors.
    pub raw_model_path: PathBuf,
    /// Reference dataset the feature medians come from.
    pub dataset_path: PathBuf,
    pub defaults: InputDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("credit_card_fraud_model.toml"),
            raw_model_path: PathBuf::from("raw_fraud_model.toml"),
            dataset_path: PathBuf::from("creditcard.csv"),
            defaults: InputDefaults::default(),
        }
    }
}

impl Settings {
    /// Reads settings from `explicit` if given, otherwise from
    /// [`DEFAULT_CONFIG_FILE`] when it exists, otherwise the built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    log::debug!("No {} found; using built-in settings", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading settings from '{}'", path.display());
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_hour(self.defaults.hour)?;
        validate_amount(self.defaults.amount)?;
        Ok(())
    }
}
