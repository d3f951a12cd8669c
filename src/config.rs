use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_FOLDER_ID: &str = "16mTSQZMvDXwLqh2Kw85uWohmSs6lL5DH";
pub const DEFAULT_CLIENT_SECRET_FILE: &str = "client_secret.json";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_ASSISTANT_NAME: &str = "Class 3C Assistant";
pub const DEFAULT_CLASS_TITLE: &str = "AI Assistant - Class 3C of 2006";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is set but empty")]
    Empty(&'static str),
}

/// Runtime settings. Secrets are not part of this; see `EnvSecretStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub folder_id: String,
    pub client_secret_file: PathBuf,
    pub token_file: PathBuf,
    pub model: String,
    pub assistant_name: String,
    pub class_title: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset keys take their default;
    /// keys that are set to blank are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str, default: &str| -> Result<String, ConfigError> {
            match lookup(key) {
                None => Ok(default.to_string()),
                Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(key)),
                Some(value) => Ok(value.trim().to_string()),
            }
        };

        Ok(Self {
            folder_id: read("DRIVE_FOLDER_ID", DEFAULT_FOLDER_ID)?,
            client_secret_file: read("GOOGLE_CLIENT_SECRET_FILE", DEFAULT_CLIENT_SECRET_FILE)?
                .into(),
            token_file: read("GOOGLE_TOKEN_FILE", DEFAULT_TOKEN_FILE)?.into(),
            model: read("GEMINI_MODEL", DEFAULT_MODEL)?,
            assistant_name: read("ASSISTANT_NAME", DEFAULT_ASSISTANT_NAME)?,
            class_title: read("CLASS_TITLE", DEFAULT_CLASS_TITLE)?,
        })
    }
}
