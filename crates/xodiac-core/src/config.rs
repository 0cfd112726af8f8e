use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, XodiacError};

/// Environment variables consulted for the search backend key, in order.
pub const SEARCH_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Environment variable consulted for the reasoning backend key.
pub const REASONING_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

/// Top-level configuration for the Xodiac client.
///
/// Loaded from `~/.xodiac/config.toml` by default. Each section corresponds
/// to one backend or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XodiacConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub image: ImageConfig,
}

impl XodiacConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: XodiacConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| XodiacError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Fill missing API keys from the process environment.
    ///
    /// Keys already present in the file win over the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.search.api_key.is_empty() {
            if let Some(key) = SEARCH_KEY_ENV_VARS
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty())
            {
                self.search.api_key = key;
            }
        }
        if self.reasoning.api_key.is_empty() {
            if let Some(key) = lookup(REASONING_KEY_ENV_VAR).filter(|v| !v.trim().is_empty()) {
                self.reasoning.api_key = key;
            }
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Conversation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the conversation engine accepts queries.
    pub enabled: bool,
    /// Maximum query length in characters.
    pub max_query_length: usize,
    /// Capacity of the adapter-to-aggregator event channel.
    pub event_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_query_length: 4000,
            event_buffer: 64,
        }
    }
}

/// Streaming search backend (fast and deep-think modes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// API key for the generative language endpoint.
    pub api_key: String,
    /// Base URL of the models collection.
    pub base_url: String,
    /// Model used for both fast and deep-think turns.
    pub model: String,
    /// Seconds to wait for the next stream chunk before failing the turn.
    pub idle_timeout_secs: u64,
    /// Enable web search grounding.
    pub web_search: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.0-flash".to_string(),
            idle_timeout_secs: 60,
            web_search: true,
        }
    }
}

/// Single-shot reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Bearer token for the completion endpoint.
    pub api_key: String,
    /// Chat completions endpoint.
    pub endpoint: String,
    /// Model identifier sent in the request body.
    pub model: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "deepseek/deepseek-r1:free".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Synthetic image generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Prompt endpoint; the encoded prompt is appended as a path segment.
    pub base_url: String,
    /// Artificial delay before the image is announced, in milliseconds.
    pub delay_ms: u64,
    /// Exclusive upper bound for the cache-busting seed.
    pub max_seed: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://image.pollinations.ai/prompt".to_string(),
            delay_ms: 800,
            max_seed: 1_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = XodiacConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.chat.enabled);
        assert_eq!(config.search.model, "gemini-2.0-flash");
        assert!(config.search.web_search);
        assert_eq!(
            config.reasoning.endpoint,
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(config.image.delay_ms, 800);
        assert_eq!(config.image.max_seed, 1_000_000);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[search]
api_key = "gm-key"
model = "gemini-2.5-flash"
idle_timeout_secs = 10

[image]
delay_ms = 0
"#;
        let file = create_temp_config(content);
        let config = XodiacConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.search.api_key, "gm-key");
        assert_eq!(config.search.model, "gemini-2.5-flash");
        assert_eq!(config.search.idle_timeout_secs, 10);
        assert_eq!(config.image.delay_ms, 0);
        assert_eq!(config.image.max_seed, 1_000_000);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[reasoning]\ntimeout_secs = 5\n");
        let config = XodiacConfig::load(file.path()).unwrap();
        assert_eq!(config.reasoning.timeout_secs, 5);
        assert_eq!(config.reasoning.model, "deepseek/deepseek-r1:free");
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[general\nlog_level = ");
        let err = XodiacConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, XodiacError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = XodiacConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = XodiacConfig::default();
        config.search.model = "custom-model".to_string();
        config.save(&path).unwrap();

        let reloaded = XodiacConfig::load(&path).unwrap();
        assert_eq!(reloaded.search.model, "custom-model");
        assert_eq!(reloaded.chat.event_buffer, config.chat.event_buffer);
    }

    #[test]
    fn test_env_overrides_fill_missing_keys() {
        let env: HashMap<&str, &str> = [("API_KEY", "fallback"), ("OPENROUTER_API_KEY", "or-key")]
            .into_iter()
            .collect();
        let mut config = XodiacConfig::default();
        config.apply_overrides_from(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.search.api_key, "fallback");
        assert_eq!(config.reasoning.api_key, "or-key");
    }

    #[test]
    fn test_env_overrides_prefer_first_search_variable() {
        let env: HashMap<&str, &str> = [("GEMINI_API_KEY", "primary"), ("API_KEY", "fallback")]
            .into_iter()
            .collect();
        let mut config = XodiacConfig::default();
        config.apply_overrides_from(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.search.api_key, "primary");
    }

    #[test]
    fn test_env_overrides_keep_file_keys() {
        let mut config = XodiacConfig::default();
        config.search.api_key = "from-file".to_string();
        config.apply_overrides_from(|_| Some("from-env".to_string()));
        assert_eq!(config.search.api_key, "from-file");
        assert_eq!(config.reasoning.api_key, "from-env");
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let mut config = XodiacConfig::default();
        config.apply_overrides_from(|_| Some("   ".to_string()));
        assert!(config.search.api_key.is_empty());
        assert!(config.reasoning.api_key.is_empty());
    }
}
