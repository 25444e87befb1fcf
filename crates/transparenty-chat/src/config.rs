use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::ApiProvider;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub session: SessionConfig,
    pub llm: LlmSettings,
    pub backend: BackendConfig,
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub redis_url: String,
    pub ttl_secs: u64,
    pub connect_timeout_secs: u64,
    /// Upper bound on each get, save or delete once connected.
    pub op_timeout_secs: u64,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ApiProvider,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub primary: Option<ProviderConfig>,
    pub secondary: Option<ProviderConfig>,
    pub intent_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub stream_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Handlers only fire when confidence is strictly above this value.
    pub confidence_threshold: f32,
    /// Messages of history shown to the intent classifier.
    pub intent_history: usize,
    /// Messages of history shown to the response generator.
    pub response_history: usize,
    pub classification_deadline_secs: u64,
}

impl ServiceConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.redis_url.trim().is_empty() {
            return Err(ConfigError::Invalid("session.redis_url must not be empty".into()));
        }
        if self.session.ttl_secs == 0 {
            return Err(ConfigError::Invalid("session.ttl_secs must be > 0".into()));
        }
        if self.session.op_timeout_secs == 0 {
            return Err(ConfigError::Invalid("session.op_timeout_secs must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.routing.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "routing.confidence_threshold must be in [0.0, 1.0]".into(),
            ));
        }
        if self.routing.intent_history == 0 || self.routing.response_history == 0 {
            return Err(ConfigError::Invalid("routing history windows must be > 0".into()));
        }
        for (name, provider) in [("primary", &self.llm.primary), ("secondary", &self.llm.secondary)] {
            if let Some(p) = provider {
                if p.api_key.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("llm.{}.api_key must not be empty", name)));
                }
            }
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Use the user config file when present, otherwise environment defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("transparenty").join("config.json"))
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            llm: LlmSettings::default(),
            backend: BackendConfig::default(),
            routing: RoutingConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            redis_url: env_nonempty("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".into()),
            ttl_secs: env_nonempty("SESSION_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            connect_timeout_secs: 5,
            op_timeout_secs: 5,
            key_prefix: "conv:".into(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        let primary = env_nonempty("ANTHROPIC_API_KEY").map(|api_key| ProviderConfig {
            provider: ApiProvider::Anthropic,
            api_key,
            model: env_nonempty("ANTHROPIC_MODEL")
                .unwrap_or_else(|| "claude-3-haiku-20240307".into()),
        });
        let secondary = env_nonempty("OPENAI_API_KEY").map(|api_key| ProviderConfig {
            provider: ApiProvider::OpenAI,
            api_key,
            model: env_nonempty("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".into()),
        });

        Self {
            primary,
            secondary,
            intent_timeout_secs: 30,
            generation_timeout_secs: 30,
            stream_timeout_secs: 60,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: env_nonempty("BACKEND_API_URL")
                .unwrap_or_else(|| "http://localhost:3001".into()),
            api_key: env_nonempty("AI_SERVICE_API_KEY").unwrap_or_default(),
            timeout_secs: 10,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            intent_history: 6,
            response_history: 8,
            classification_deadline_secs: 45,
        }
    }
}
