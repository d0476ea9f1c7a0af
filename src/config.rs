use std::env;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable holding the provider API key.
pub const API_KEY_VAR: &str = "GENERATIVE_AI_KEY";

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini rejects inline image data above 20 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is required")]
    Missing(&'static str),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Process-wide settings, built once at startup and never mutated.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    /// Directory that receives the per-request image downloads.
    pub temp_dir: PathBuf,
    pub max_image_bytes: u64,
}

impl AppConfig {
    /// Config with every optional setting at its default.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temp_dir: env::temp_dir(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let mut config = Self::new(api_key);

        if let Some(model) = non_empty("GENAI_MODEL") {
            config.model = model;
        }
        if let Some(base) = non_empty("GENAI_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(dir) = non_empty("GENAI_TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Some(raw) = non_empty("GENAI_MAX_IMAGE_BYTES") {
            config.max_image_bytes = match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        key: "GENAI_MAX_IMAGE_BYTES",
                        reason: "must be greater than zero".to_string(),
                    })
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        key: "GENAI_MAX_IMAGE_BYTES",
                        reason: e.to_string(),
                    })
                }
            };
        }

        Ok(config)
    }
}

// Keeps the API key out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("temp_dir", &self.temp_dir)
            .field("max_image_bytes", &self.max_image_bytes)
            .finish()
    }
}
