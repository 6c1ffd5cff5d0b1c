//! User settings: service credentials stored as one JSON document.
//!
//! [`Settings`] is a plain value passed to whoever needs it; [`SettingsStore`]
//! owns the file location and performs the explicit load/save side effects.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Secret;

/// File name of the settings document inside the config directory.
pub const SETTINGS_FILE: &str = "config.json";

/// Errors that can occur while loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The settings document is not valid JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Credentials for the external services.
///
/// Missing fields deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Unsplash API access key.
    pub unsplash_access_key: Secret,
    /// Replicate API token.
    pub replicate_api_token: Secret,
    /// Noun Project OAuth consumer key.
    pub noun_project_key: Secret,
    /// Noun Project OAuth consumer secret.
    pub noun_project_secret: Secret,
}

impl Settings {
    /// Merge settings submitted by the UI into the stored ones.
    ///
    /// Plain keys are replaced as given. The Replicate token and the Noun
    /// Project secret are only replaced when the incoming value is non-blank,
    /// since the UI never receives those values back.
    #[must_use]
    pub fn apply_update(mut self, incoming: Settings) -> Self {
        self.unsplash_access_key = incoming.unsplash_access_key;
        self.noun_project_key = incoming.noun_project_key;
        if !incoming.replicate_api_token.is_blank() {
            self.replicate_api_token = incoming.replicate_api_token;
        }
        if !incoming.noun_project_secret.is_blank() {
            self.noun_project_secret = incoming.noun_project_secret;
        }
        self
    }
}

/// Loads and saves [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store backed by the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform default location, e.g. `~/.config/easel/config.json`.
    ///
    /// Returns `None` if no home directory can be determined.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "easel")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Path of the settings document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read settings from disk. A missing file yields empty settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] if the file exists but cannot be read,
    /// or [`SettingsError::Serialization`] if it is not a settings document.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {}, using defaults", self.path.display());
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write settings to disk, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
