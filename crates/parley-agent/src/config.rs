use parley_session::ChatSettings;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Connection settings for the model API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Key sent as `x-api-key`.
    #[serde(default)]
    pub api_key: String,
    /// Overrides the public endpoint, e.g. for a proxy or a test server.
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl ClientConfig {
    /// Configured base URL, or the public API.
    pub fn base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Fills an empty `api_key` from `ANTHROPIC_API_KEY`.
    pub fn with_env_fallback(mut self) -> Self {
        if self.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                self.api_key = key;
            }
        }
        self
    }

    /// Whether a non-blank key is set.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Inference parameters for one request, and the `[inference]` table that
/// seeds the selections of every new session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Extended-thinking budget; `None` leaves thinking off.
    #[serde(default)]
    pub thinking_budget: Option<u32>,
}

fn default_max_tokens() -> u32 {
    ChatSettings::default().max_tokens
}

fn default_temperature() -> f32 {
    ChatSettings::default().temperature
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            thinking_budget: None,
        }
    }
}

impl InferenceConfig {
    /// Writes these values into a session's starting selections.
    ///
    /// A configured thinking budget also switches extended thinking on, but
    /// only for models that support it.
    pub fn seed(&self, settings: &mut ChatSettings) {
        settings.max_tokens = self.max_tokens;
        settings.temperature = self.temperature;
        if let Some(budget) = self.thinking_budget {
            settings.thinking_budget = budget;
            settings.extended_thinking = settings.model.supports_extended_thinking();
        }
    }
}

/// Parameters actually sent for a session's current selections.
///
/// Temperature is forced to 1.0 and the budget attached only when extended
/// thinking is enabled for a model that supports it.
impl From<&ChatSettings> for InferenceConfig {
    fn from(settings: &ChatSettings) -> Self {
        Self {
            max_tokens: settings.max_tokens,
            temperature: settings.effective_temperature(),
            thinking_budget: settings.thinking_budget_tokens(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parley_core::ModelChoice;

    #[test]
    fn test_base_url_default_and_override() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url(), "https://api.anthropic.com");

        let config = ClientConfig {
            api_key: "k".into(),
            api_base_url: Some("http://127.0.0.1:9999".into()),
        };
        assert_eq!(config.base_url(), "http://127.0.0.1:9999");
        assert!(config.has_api_key());
    }

    #[test]
    fn test_client_config_from_toml() {
        let config: ClientConfig = toml::from_str("api_key = \"sk-test\"").unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_inference_defaults_match_session_defaults() {
        let base = InferenceConfig::default();
        assert_eq!(base, InferenceConfig::from(&ChatSettings::default()));
        assert_eq!(base.max_tokens, 1000);
        assert_eq!(base.temperature, 0.5);
        assert!(base.thinking_budget.is_none());
    }

    #[test]
    fn test_request_params_take_session_values() {
        let settings = ChatSettings {
            max_tokens: 2000,
            temperature: 0.2,
            ..ChatSettings::default()
        };
        let merged = InferenceConfig::from(&settings);
        assert_eq!(merged.max_tokens, 2000);
        assert_eq!(merged.temperature, 0.2);
        assert!(merged.thinking_budget.is_none());
    }

    #[test]
    fn test_thinking_forces_temperature() {
        let settings = ChatSettings {
            model: ModelChoice::Claude37Sonnet,
            extended_thinking: true,
            thinking_budget: 8000,
            max_tokens: 9000,
            temperature: 0.3,
            ..ChatSettings::default()
        };
        let merged = InferenceConfig::from(&settings);
        assert_eq!(merged.temperature, 1.0);
        assert_eq!(merged.thinking_budget, Some(8000));
    }

    #[test]
    fn test_thinking_ignored_for_unsupported_model() {
        let settings = ChatSettings {
            model: ModelChoice::Claude35Haiku,
            extended_thinking: true,
            ..ChatSettings::default()
        };
        let merged = InferenceConfig::from(&settings);
        assert!(merged.thinking_budget.is_none());
        assert_eq!(merged.temperature, 0.5);
    }

    #[test]
    fn test_seed_overwrites_session_selections() {
        let config: InferenceConfig =
            toml::from_str("max_tokens = 2048\ntemperature = 0.2").unwrap();
        let mut settings = ChatSettings::default();
        config.seed(&mut settings);
        assert_eq!(settings.max_tokens, 2048);
        assert_eq!(settings.temperature, 0.2);
        assert!(!settings.extended_thinking);
        assert_eq!(InferenceConfig::from(&settings).max_tokens, 2048);
    }

    #[test]
    fn test_seed_thinking_budget_only_on_capable_model() {
        let config = InferenceConfig {
            max_tokens: 9000,
            temperature: 0.5,
            thinking_budget: Some(8000),
        };

        let mut sonnet = ChatSettings {
            model: ModelChoice::Claude37Sonnet,
            ..ChatSettings::default()
        };
        config.seed(&mut sonnet);
        assert!(sonnet.extended_thinking);
        assert_eq!(sonnet.thinking_budget_tokens(), Some(8000));

        let mut haiku = ChatSettings {
            model: ModelChoice::Claude35Haiku,
            ..ChatSettings::default()
        };
        config.seed(&mut haiku);
        assert!(!haiku.extended_thinking);
        assert_eq!(haiku.thinking_budget_tokens(), None);
    }
}
