//! Settings of a StudyScribe installation. They are read from a [ron] file,
//! and every field that is left out keeps its default:
//!
//! ```text
//! (
//!     main_folder: "DataFiles",
//!     backup_period: 30.0,
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why settings could not be read or written.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// The settings file.
        path: PathBuf,
        /// What the filesystem said.
        source: std::io::Error,
    },

    /// The settings file is not valid RON for [Settings].
    #[error("bad settings in {path}: {source}")]
    Ron {
        /// The settings file.
        path: PathBuf,
        /// Where parsing stopped.
        source: ron::de::SpannedError,
    },

    /// Settings could not be written as RON.
    #[error("ron error: {0}")]
    Encode(#[from] ron::Error),

    /// A value is out of range.
    #[error("{0}")]
    Invalid(&'static str),
}

/// Names and timings of a session. Missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder under the store root that holds everything.
    pub main_folder: String,
    /// File name of the application index, inside `main_folder`.
    pub index_name: String,
    /// Folder inside `main_folder` that holds one folder per user. Only used
    /// when a new index is created; an existing index brings its own.
    pub user_data_folder: String,
    /// Base name of the object layout saved with every new user.
    pub start_data_name: String,
    /// Seconds between samples for users whose own interval is unusable.
    pub default_sampling_interval: f64,
    /// Seconds between two backups of a running log.
    pub backup_period: f64,
    /// Seconds the user button stays inactive after a click.
    pub button_cooldown: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            main_folder: "DataFiles".to_owned(),
            index_name: "generalSettings".to_owned(),
            user_data_folder: "data".to_owned(),
            start_data_name: "StartLocationPrices".to_owned(),
            default_sampling_interval: 1.0,
            backup_period: 60.0,
            button_cooldown: 10.0,
        }
    }
}

impl Settings {
    /// Read settings from a RON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = ron::de::from_str(&text).map_err(|source| ConfigError::Ron {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// The settings as pretty RON.
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Check that names are set and every duration is a usable number of
    /// seconds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.main_folder.is_empty() || self.index_name.is_empty() {
            return Err(ConfigError::Invalid("main folder and index name must be set"));
        }
        if self.user_data_folder.is_empty() || self.start_data_name.is_empty() {
            return Err(ConfigError::Invalid(
                "user data folder and start data name must be set",
            ));
        }
        if !(self.default_sampling_interval.is_finite() && self.default_sampling_interval > 0.0) {
            return Err(ConfigError::Invalid(
                "default sampling interval must be a positive number of seconds",
            ));
        }
        if !(self.backup_period.is_finite() && self.backup_period > 0.0) {
            return Err(ConfigError::Invalid(
                "backup period must be a positive number of seconds",
            ));
        }
        if !(self.button_cooldown.is_finite() && self.button_cooldown >= 0.0) {
            return Err(ConfigError::Invalid(
                "button cooldown must be a non-negative number of seconds",
            ));
        }
        Ok(())
    }

    /// Logical path of the application index, without file ending.
    pub fn index_path(&self) -> PathBuf {
        Path::new(&self.main_folder).join(&self.index_name)
    }
}
