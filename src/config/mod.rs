use crate::error::ConfigError;
use crate::global;
use crate::media::AudioProfile;
use crate::sources::SourceSelection;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variables that override credentials from the config file.
pub mod env_keys {
    pub const CONFLUENCE_URL: &str = "CONFLUENCE_URL";
    pub const CONFLUENCE_EMAIL: &str = "CONFLUENCE_EMAIL";
    pub const CONFLUENCE_API_TOKEN: &str = "CONFLUENCE_API_TOKEN";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const ZOOM_ACCOUNT_ID: &str = "ZOOM_ACCOUNT_ID";
    pub const ZOOM_CLIENT_ID: &str = "ZOOM_CLIENT_ID";
    pub const ZOOM_CLIENT_SECRET: &str = "ZOOM_CLIENT_SECRET";
    pub const DATA_DIR: &str = "MEETING_RECAP_DATA_DIR";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub wiki: WikiConfig,
    pub recordings: RecordingsConfig,
    pub openai: OpenAIConfig,
    pub media: MediaConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the per-work-item directory tree. Defaults to the user data dir.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    pub url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingsConfig {
    pub account_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub oauth_url: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub transcription_model: String,
    pub summary_model: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg_path: Option<String>,
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate: String,
    /// Container passed to ffmpeg `-f`; also used as the file extension.
    pub audio_format: String,
    /// Payload ceiling of the speech-to-text service, in bytes.
    pub max_upload_bytes: u64,
    pub segment_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub title_suffix: String,
    pub on_override: PublishMode,
}

/// What the publisher does with an already published page when override is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Create another child page with the same title.
    ///
    /// Confluence refuses a second page with an existing title in the same
    /// space, so overrides against a real wiki need `update`.
    #[default]
    Create,
    /// Replace the body of the existing page.
    Update,
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            client_id: None,
            client_secret: None,
            oauth_url: "https://zoom.us/oauth/token".to_string(),
            api_url: "https://api.zoom.us/v2".to_string(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            summary_model: "gpt-5.2".to_string(),
            language: None,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            channels: 1,
            sample_rate: 16_000,
            bitrate: "64k".to_string(),
            audio_format: "mp3".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
            segment_seconds: 3000,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            title_suffix: "AI Transcription Summary".to_string(),
            on_override: PublishMode::Create,
        }
    }
}

impl MediaConfig {
    pub fn audio_profile(&self) -> AudioProfile {
        AudioProfile {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bitrate: self.bitrate.clone(),
            container: self.audio_format.clone(),
        }
    }
}

impl Config {
    /// Load the config file, then layer `.env` and process environment on top.
    ///
    /// An explicit `path` must exist. The default location is created with
    /// default values on first use.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()).into());
                }
                Self::read(path)?
            }
            None => {
                let config_path = global::config_file()?;
                if config_path.exists() {
                    Self::read(&config_path)?
                } else {
                    info!(
                        "Config file not found, creating default at {:?}",
                        config_path
                    );
                    let config = Self::default();
                    config.save(&config_path)?;
                    config
                }
            }
        };

        if let Ok(dotenv) = dotenvy::dotenv() {
            info!("Loaded environment from {:?}", dotenv);
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Overwrite credentials with any non-empty value returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env_keys::CONFLUENCE_URL) {
            self.wiki.url = Some(v);
        }
        if let Some(v) = get(env_keys::CONFLUENCE_EMAIL) {
            self.wiki.email = Some(v);
        }
        if let Some(v) = get(env_keys::CONFLUENCE_API_TOKEN) {
            self.wiki.api_token = Some(v);
        }
        if let Some(v) = get(env_keys::OPENAI_API_KEY) {
            self.openai.api_key = Some(v);
        }
        if let Some(v) = get(env_keys::ZOOM_ACCOUNT_ID) {
            self.recordings.account_id = Some(v);
        }
        if let Some(v) = get(env_keys::ZOOM_CLIENT_ID) {
            self.recordings.client_id = Some(v);
        }
        if let Some(v) = get(env_keys::ZOOM_CLIENT_SECRET) {
            self.recordings.client_secret = Some(v);
        }
        if let Some(v) = get(env_keys::DATA_DIR) {
            self.storage.data_dir = Some(PathBuf::from(v));
        }
    }

    /// Check that everything the selected sources need is present.
    pub fn validate(&self, selection: SourceSelection) -> Result<(), ConfigError> {
        let mut missing = Vec::new();

        if self.openai.api_key.is_none() {
            missing.push(env_keys::OPENAI_API_KEY);
        }
        if selection.uses_wiki() {
            if self.wiki.url.is_none() {
                missing.push(env_keys::CONFLUENCE_URL);
            }
            if self.wiki.email.is_none() {
                missing.push(env_keys::CONFLUENCE_EMAIL);
            }
            if self.wiki.api_token.is_none() {
                missing.push(env_keys::CONFLUENCE_API_TOKEN);
            }
        }
        if selection.uses_recordings() {
            if self.recordings.account_id.is_none() {
                missing.push(env_keys::ZOOM_ACCOUNT_ID);
            }
            if self.recordings.client_id.is_none() {
                missing.push(env_keys::ZOOM_CLIENT_ID);
            }
            if self.recordings.client_secret.is_none() {
                missing.push(env_keys::ZOOM_CLIENT_SECRET);
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if self.media.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "media.max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.media.segment_seconds == 0 {
            return Err(ConfigError::Invalid(
                "media.segment_seconds must be greater than zero".to_string(),
            ));
        }
        if self.media.audio_format.is_empty() || self.media.audio_format.contains('.') {
            return Err(ConfigError::Invalid(format!(
                "media.audio_format '{}' is not a container name",
                self.media.audio_format
            )));
        }

        Ok(())
    }

    pub fn storage_root(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => global::data_dir(),
        }
    }
}
