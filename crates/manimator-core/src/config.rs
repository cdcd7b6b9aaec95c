use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable holding the reasoning API key
pub const CREDENTIAL_ENV: &str = "GROQ_API_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// POST target that starts an animation job
    pub submission_endpoint: String,
    /// Socket.IO server delivering job progress
    pub realtime_endpoint: String,
    /// OpenAI-compatible chat completions URL
    pub reasoning_endpoint: String,
    pub reasoning_model: String,
    pub credential: Option<String>,
    #[serde(skip)]
    credential_from_env: bool,
    /// What the file held before the environment replaced it
    #[serde(skip)]
    file_credential: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            submission_endpoint: "http://localhost:5000/visualize".to_string(),
            realtime_endpoint: "http://localhost:5000".to_string(),
            reasoning_endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            reasoning_model: "deepseek-r1-distill-llama-70b".to_string(),
            credential: None,
            credential_from_env: false,
            file_credential: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the user config file (if any) and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        let config = Self::load_from(&config_path)?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Read a config file, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Write the config; a credential taken from the environment is never persisted
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut stored = self.clone();
        if stored.credential_from_env {
            stored.credential = stored.file_credential.take();
        }
        let config_content = serde_json::to_string_pretty(&stored)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Environment wins over the file for the credential
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(CREDENTIAL_ENV).filter(|k| !k.trim().is_empty()) {
            if !self.credential_from_env {
                self.file_credential = self.credential.take();
            }
            self.credential = Some(key);
            self.credential_from_env = true;
        }
        self
    }

    /// Returns where the credential came from: "env", "config", or None
    pub fn credential_source(&self) -> Option<&'static str> {
        match (&self.credential, self.credential_from_env) {
            (Some(_), true) => Some("env"),
            (Some(_), false) => Some("config"),
            (None, _) => None,
        }
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir.join("manimator").join("config.json"))
    }
}
